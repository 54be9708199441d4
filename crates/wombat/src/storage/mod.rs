//! Storage capabilities for documents
//!
//! A backend turns the abstract [`Reader`] and [`Printer`] operations into
//! storage queries and classifies failures into [`crate::Status`] values.
//! Backends are registered under string keys in a [`crate::BackendRegistry`]
//! and expose their capabilities through [`Backend`].

use async_trait::async_trait;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::document::{Document, DocumentRecord, Image};
use crate::error::Result;

pub mod memory;

pub use memory::MemoryBackend;

#[cfg(feature = "sqlite")]
pub mod sqlite_storage;

/// Read side of a document store
#[async_trait]
pub trait Reader: Send + Sync {
    /// Exact-match lookup.
    ///
    /// Unpublished documents are reported as not found unless
    /// `include_unpublished` is set.
    async fn by_title_path(&self, title_path: &str, include_unpublished: bool) -> Result<Document>;

    /// Up to `limit` documents, newest first, skipping `page * limit`.
    ///
    /// When unpublished documents are excluded the pagination is computed over
    /// the published subset only.
    async fn recent(
        &self,
        limit: u32,
        page: u32,
        include_unpublished: bool,
    ) -> Result<Vec<Document>>;
}

/// Write side of a document store
#[async_trait]
pub trait Printer: Send + Sync {
    /// Insert a new document. Duplicate title paths are rejected.
    async fn print(&self, document: &DocumentRecord) -> Result<()>;

    async fn update_synopsis(
        &self,
        title_path: &str,
        synopsis: &str,
        modified: OffsetDateTime,
    ) -> Result<()>;

    async fn update_content(
        &self,
        title_path: &str,
        content: &str,
        modified: OffsetDateTime,
    ) -> Result<()>;

    async fn delete(&self, title_path: &str) -> Result<()>;

    async fn publish(&self, title_path: &str, publish: bool) -> Result<()>;

    /// Replace the thumbnail record
    async fn write_image(&self, title_path: &str, image: &Image) -> Result<()>;

    /// Replace the gallery sequence
    async fn write_images(&self, title_path: &str, images: &[Image]) -> Result<()>;
}

/// An opaque backend instance as stored in the registry.
///
/// Capabilities are resolved at lookup time; a backend that only reads
/// returns `None` from [`Backend::printer`] and vice versa.
pub trait Backend: Send + Sync {
    fn reader(&self) -> Option<Arc<dyn Reader>> {
        None
    }

    fn printer(&self) -> Option<Arc<dyn Printer>> {
        None
    }
}
