//! # Wombat
//!
//! A content repository for publishable documents (articles and chapters):
//! - Create, read, update, delete and paginated listing of documents
//! - Swappable persistence backends resolved through a [`BackendRegistry`]
//! - Human-readable title paths (`2024/03/07/Hello-World/`) as primary keys
//! - Image assets per document: upload, JPEG normalization, thumbnails,
//!   removal and orphan cleanup
//!
//! ## Core Concepts
//!
//! - **Backends** implement the [`Reader`] and/or [`Printer`] capabilities and
//!   are registered under `"<namespace>:<kind>-reader"` / `"-printer"` keys
//! - **Documents** are bound to the printer that loaded them; every mutation
//!   is written through it before the in-memory value changes
//! - **Visibility**: unpublished documents are reported as not found to
//!   readers that may not see them
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wombat::*;
//!
//! # async fn example() -> wombat::Result<()> {
//! let mut builder = RegistryBuilder::default();
//! builder.register_kind(
//!     DocumentKind::Article,
//!     Arc::new(MemoryBackend::new(DocumentKind::Article)),
//! );
//! let registry = builder.build();
//!
//! let mut article = Document::from_registry(&registry, DocumentKind::Article, "Hello World")?;
//! article.create().await?;
//! article.set_content("First post").await?;
//! article.publish(true).await?;
//!
//! let articles = Repository::new(&registry, DocumentKind::Article)?;
//! let recent = articles.recent(30, 0, false).await?;
//! println!("{} published", recent.len());
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod document;
pub mod error;
pub mod images;
pub mod registry;
pub mod repository;
pub mod storage;
pub mod title_path;

pub use action::Action;
pub use document::{Document, DocumentKind, DocumentRecord, Image};
pub use error::{Result, Status, WombatError};
pub use images::{ImageAssets, ImageConverter, JpegConverter, UploadForm, UploadKind, UploadedFile};
pub use registry::{BackendRegistry, DEFAULT_NAMESPACE, RegistryBuilder};
pub use repository::Repository;
pub use storage::{Backend, MemoryBackend, Printer, Reader};
pub use title_path::title_path;

#[cfg(feature = "sqlite")]
pub use storage::sqlite_storage::SqliteBackend;
