use time::OffsetDateTime;

use crate::error::{Result, WombatError};

/// Derive the title path for a document created at `now`.
///
/// Format: `"{year}/{month:02}/{day:02}/{slug}/"`, where the slug is the title
/// with every space replaced by a hyphen. Case, punctuation and non-ASCII
/// characters pass through unchanged.
///
/// Example: `"Hello World"` on 2024-03-07 -> `"2024/03/07/Hello-World/"`
pub fn title_path(title: &str, now: OffsetDateTime) -> String {
    format!(
        "{}/{:02}/{:02}/{}/",
        now.year(),
        u8::from(now.month()),
        now.day(),
        slug(title)
    )
}

/// Replace every space with a hyphen
pub fn slug(title: &str) -> String {
    title.replace(' ', "-")
}

/// Check that a string has the shape of a title path: `dddd/dd/dd/<slug>/`.
///
/// The slug must be non-empty and may not contain `/`.
pub fn is_title_path(path: &str) -> bool {
    let Some(inner) = path.strip_suffix('/') else {
        return false;
    };

    let mut parts = inner.splitn(4, '/');
    let digits = |part: Option<&str>, len: usize| {
        part.is_some_and(|p| p.len() == len && p.bytes().all(|b| b.is_ascii_digit()))
    };

    if !digits(parts.next(), 4) || !digits(parts.next(), 2) || !digits(parts.next(), 2) {
        return false;
    }

    match parts.next() {
        Some(slug) => !slug.is_empty() && !slug.contains('/'),
        None => false,
    }
}

/// Require a usable document key: the shape checked by [`is_title_path`],
/// and a slug that is not a `.` or `..` path component.
pub fn check_title_path(path: &str) -> Result<()> {
    let slug = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    if !is_title_path(path) || slug == "." || slug == ".." {
        return Err(WombatError::BadRequest(format!("invalid title path: {path}")));
    }
    Ok(())
}
