//! Admin configuration management

use crate::error::{AdminError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use wombat::DEFAULT_NAMESPACE;
use wombat::images::DEFAULT_THUMB_WIDTH;

/// Admin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Registry namespace the backends are registered under
    pub namespace: String,

    /// SQLite connection URL
    pub database_url: String,

    /// Root directory of document image folders
    pub image_path: PathBuf,

    /// Public URL prefix the image root is served under
    pub media_url: String,

    /// Default page size for listings
    pub page_count: u32,

    /// Thumbnail width in pixels
    pub thumb_width: u32,
}

impl AdminConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            namespace: var("WOMBAT_NAMESPACE").unwrap_or(defaults.namespace),
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            image_path: var("WOMBAT_IMAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.image_path),
            media_url: var("WOMBAT_MEDIA_URL").unwrap_or(defaults.media_url),
            page_count: match var("WOMBAT_PAGE_COUNT") {
                Some(value) => value
                    .parse()
                    .map_err(|_| AdminError::config("Invalid WOMBAT_PAGE_COUNT value"))?,
                None => defaults.page_count,
            },
            thumb_width: match var("WOMBAT_THUMB_WIDTH") {
                Some(value) => value
                    .parse()
                    .map_err(|_| AdminError::config("Invalid WOMBAT_THUMB_WIDTH value"))?,
                None => defaults.thumb_width,
            },
        };

        if config.page_count == 0 {
            return Err(AdminError::config("WOMBAT_PAGE_COUNT must be positive"));
        }
        if config.thumb_width == 0 {
            return Err(AdminError::config("WOMBAT_THUMB_WIDTH must be positive"));
        }
        Ok(config)
    }

    /// Public URL of a file in the image folder of `title_path`
    pub fn media_link(&self, title_path: &str, file: &str) -> String {
        format!("{}/{}{}", self.media_url.trim_end_matches('/'), title_path, file)
    }

    /// Directory holding the SQLite database file, if the URL names one
    pub fn database_dir(&self) -> Option<PathBuf> {
        let path = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))?;
        let path = path.split('?').next().unwrap_or_default();
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        PathBuf::from(path)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(PathBuf::from)
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            database_url: "sqlite:./data/wombat.db".to_string(),
            image_path: PathBuf::from("./data/images"),
            media_url: "/media/".to_string(),
            page_count: 30,
            thumb_width: DEFAULT_THUMB_WIDTH,
        }
    }
}
