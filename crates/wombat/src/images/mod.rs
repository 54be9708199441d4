//! Image assets attached to documents
//!
//! Files live under `{root}/{title_path}/`. Every upload is staged to a hidden
//! temp file and normalized to JPEG in a hidden part file (thumbnails are also
//! scaled to a fixed width). The part file is moved into place only after the
//! document metadata was persisted. Files are removed from disk only after the
//! metadata change that stops referencing them was persisted, and never while
//! the thumbnail or a gallery entry still names them. Failures to remove files
//! are logged and never fail the operation.
//!
//! Names starting with `thumb.` belong to thumbnails; gallery uploads may not
//! use them.
//!
//! Directory structure:
//! ```text
//! root/
//! └── 2024/03/07/Hello-World/
//!     ├── thumb.cover.jpg      (document.image)
//!     ├── cover.jpg            (document.images[0])
//!     └── diagram.jpg          (document.images[1])
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use uuid::Uuid;

use crate::document::{Document, Image};
use crate::error::{Result, WombatError};
use crate::title_path::{check_title_path, slug};

pub mod convert;

pub use convert::{Dimensions, ImageConverter, JpegConverter};

/// Thumbnail width in pixels
pub const DEFAULT_THUMB_WIDTH: u32 = 200;

/// File name prefix marking the thumbnail
pub const THUMB_PREFIX: &str = "thumb.";

/// Default age after which hidden upload files count as abandoned
pub const STALE_UPLOAD_AGE: Duration = Duration::from_secs(60 * 60);

/// Content types accepted for uploads
pub const IMAGE_TYPES: [&str; 3] = ["image/gif", "image/jpeg", "image/png"];

/// Where an upload ends up on the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Replaces `document.image`
    Thumbnail,
    /// Added to, or updated in, `document.images`
    Gallery,
}

impl UploadKind {
    /// Interpret the upload form's `type` field
    pub fn from_form_value(value: Option<&str>) -> Self {
        match value {
            Some("thumb") => UploadKind::Thumbnail,
            _ => UploadKind::Gallery,
        }
    }
}

/// A file received from an upload form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-side file name
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// The image upload form as handed over by the request layer
#[derive(Debug, Clone)]
pub struct UploadForm {
    /// Requested name; the uploaded file's name is used when absent
    pub name: Option<String>,
    pub kind: UploadKind,
    pub file: Option<UploadedFile>,
}

/// Manages the image files of documents
#[derive(Clone)]
pub struct ImageAssets {
    root: PathBuf,
    converter: Arc<dyn ImageConverter>,
    thumb_width: u32,
    stale_upload_age: Duration,
}

impl ImageAssets {
    pub fn new(root: impl Into<PathBuf>, converter: Arc<dyn ImageConverter>) -> Self {
        Self {
            root: root.into(),
            converter,
            thumb_width: DEFAULT_THUMB_WIDTH,
            stale_upload_age: STALE_UPLOAD_AGE,
        }
    }

    pub fn with_thumb_width(mut self, width: u32) -> Self {
        self.thumb_width = width;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn thumb_width(&self) -> u32 {
        self.thumb_width
    }

    /// Hidden files younger than this are left alone by
    /// [`ImageAssets::sweep_orphans`], since they may belong to an upload in
    /// progress
    pub fn with_stale_upload_age(mut self, age: Duration) -> Self {
        self.stale_upload_age = age;
        self
    }

    /// Image directory of the document at `title_path`
    pub fn dir_for(&self, title_path: &str) -> Result<PathBuf> {
        check_title_path(title_path)?;
        Ok(self.root.join(title_path))
    }

    /// Receive an upload and attach it to `document` as thumbnail or gallery
    /// image. Returns the recorded image.
    pub async fn upload(&self, document: &mut Document, form: UploadForm) -> Result<Image> {
        let file = form
            .file
            .ok_or_else(|| WombatError::bad_request("missing image file"))?;

        if let Some(content_type) = file.content_type.as_deref() {
            let essence = content_type.split(';').next().unwrap_or_default().trim();
            if !IMAGE_TYPES.contains(&essence) {
                return Err(WombatError::BadRequest(format!(
                    "unsupported image type: {content_type}"
                )));
            }
        }

        let requested = form
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(file.file_name);
        let base = upload_name(&requested);

        // Thumbnail names are reserved
        if form.kind == UploadKind::Gallery && base.starts_with(THUMB_PREFIX) {
            return Err(WombatError::BadRequest(format!(
                "gallery image names may not start with {THUMB_PREFIX}: {base}"
            )));
        }

        let dir = self.dir_for(document.title_path())?;
        fs::create_dir_all(&dir).await?;
        let staged = stage(&dir, &base, &file.data).await?;

        match form.kind {
            UploadKind::Thumbnail => self.attach_thumbnail(document, &dir, &base, staged).await,
            UploadKind::Gallery => self.attach_gallery_image(document, &dir, &base, staged).await,
        }
    }

    async fn attach_thumbnail(
        &self,
        document: &mut Document,
        dir: &Path,
        base: &str,
        staged: PathBuf,
    ) -> Result<Image> {
        let name = format!("{THUMB_PREFIX}{}.jpg", stem(base));
        let (part, dims) = self.normalize(staged, dir, &name, Some(self.thumb_width)).await?;

        let previous = document.image().clone();
        let image = Image::new(&name, &name, dims.width, dims.height);

        if let Err(e) = document.set_image(image.clone()).await {
            tracing::error!(
                title_path = document.title_path(),
                file = %name,
                error = %e,
                "failed to persist new thumbnail"
            );
            remove_quietly(&part).await;
            return Err(e);
        }

        install(&part, &dir.join(&name)).await?;

        if !previous.is_empty() && !references(document, &previous.src) {
            remove_quietly(&dir.join(&previous.src)).await;
        }

        tracing::info!(title_path = document.title_path(), file = %name, "thumbnail updated");
        Ok(image)
    }

    async fn attach_gallery_image(
        &self,
        document: &mut Document,
        dir: &Path,
        base: &str,
        staged: PathBuf,
    ) -> Result<Image> {
        let name = format!("{}.jpg", stem(base));
        let (part, dims) = self.normalize(staged, dir, &name, None).await?;

        if let Err(e) = document
            .upsert_image(Image::new(&name, "", dims.width, dims.height))
            .await
        {
            tracing::error!(
                title_path = document.title_path(),
                file = %name,
                error = %e,
                "failed to persist new image"
            );
            remove_quietly(&part).await;
            return Err(e);
        }

        install(&part, &dir.join(&name)).await?;
        tracing::info!(title_path = document.title_path(), file = %name, "image stored");

        document
            .images()
            .iter()
            .find(|image| image.src == name)
            .cloned()
            .ok_or_else(|| {
                WombatError::datastore_msg(format!("image {name} missing after update"))
            })
    }

    /// Convert the staged upload into a hidden part file next to `name`.
    ///
    /// The part file only replaces the real file once the metadata describing
    /// it was persisted, so a failed conversion or write never clobbers an
    /// existing image. The staged file is removed in every case.
    async fn normalize(
        &self,
        staged: PathBuf,
        dir: &Path,
        name: &str,
        width: Option<u32>,
    ) -> Result<(PathBuf, Dimensions)> {
        let part = part_path(&dir.join(name));
        let converter = Arc::clone(&self.converter);
        let (src, out) = (staged.clone(), part.clone());

        let converted = tokio::task::spawn_blocking(move || match width {
            Some(width) => converter.resize_width_to_jpeg(&src, &out, width),
            None => converter.convert_to_jpeg(&src, &out),
        })
        .await
        .map_err(|e| WombatError::Conversion(format!("conversion task failed: {e}")))
        .and_then(|result| result);

        remove_quietly(&staged).await;

        match converted {
            Ok(dims) => Ok((part, dims)),
            Err(e) => {
                remove_quietly(&part).await;
                Err(e)
            }
        }
    }

    /// Remove the gallery entry `src` and, once that is persisted, its file.
    /// Returns whether an entry was removed.
    pub async fn remove_image(&self, document: &mut Document, src: &str) -> Result<bool> {
        let dir = self.dir_for(document.title_path())?;
        if !document.remove_image_entry(src).await? {
            return Ok(false);
        }

        if !references(document, src) {
            remove_quietly(&dir.join(src)).await;
        }
        Ok(true)
    }

    /// Delete every file in the document's image directory that its metadata
    /// does not reference, including leftover staged uploads. Hidden files
    /// younger than the stale upload age are kept.
    /// Returns the removed paths.
    pub async fn sweep_orphans(&self, document: &Document) -> Result<Vec<PathBuf>> {
        let dir = self.dir_for(document.title_path())?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut removed = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if references(document, name) {
                continue;
            }
            if name.starts_with('.') && !self.is_stale(&metadata) {
                tracing::debug!(file = name, "skipping recent upload file");
                continue;
            }

            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => removed.push(path),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove orphaned image"
                ),
            }
        }

        if !removed.is_empty() {
            tracing::info!(
                title_path = document.title_path(),
                count = removed.len(),
                "removed orphaned images"
            );
        }
        Ok(removed)
    }

    fn is_stale(&self, metadata: &std::fs::Metadata) -> bool {
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .unwrap_or(Duration::ZERO);
        age >= self.stale_upload_age
    }

    /// Remove the whole image directory of `title_path`
    pub async fn purge(&self, title_path: &str) -> Result<()> {
        let dir = self.dir_for(title_path)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether the thumbnail or any gallery entry of `document` uses `name`
fn references(document: &Document, name: &str) -> bool {
    document.image().src == name || document.images().iter().any(|image| image.src == name)
}

/// Move a converted part file into place
async fn install(part: &Path, dest: &Path) -> Result<()> {
    if let Err(e) = fs::rename(part, dest).await {
        tracing::error!(path = %dest.display(), error = %e, "failed to install image file");
        remove_quietly(part).await;
        return Err(e.into());
    }
    Ok(())
}

/// Normalize a client-supplied name: keep only the final path component and
/// replace spaces with hyphens. Falls back to a random name.
fn upload_name(requested: &str) -> String {
    let name = Path::new(requested)
        .file_name()
        .and_then(|name| name.to_str())
        .map(slug)
        .unwrap_or_default();

    if name.is_empty() || name.starts_with('.') {
        random_name()
    } else {
        name
    }
}

fn random_name() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name)
}

fn part_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image");
    dest.with_file_name(format!(".{name}.{}.part", random_name()))
}

/// Write the upload to a hidden temp file in `dir`
async fn stage(dir: &Path, base: &str, data: &[u8]) -> Result<PathBuf> {
    let path = dir.join(format!(".{base}.{}", random_name()));
    fs::write(&path, data).await?;
    Ok(path)
}

/// Best-effort removal
async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove image file"),
    }
}
