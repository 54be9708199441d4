//! Core data structures for the content repository

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::error::{Result, WombatError};
use crate::registry::BackendRegistry;
use crate::storage::Printer;
use crate::title_path::{check_title_path, title_path};

/// Image metadata, wire shape `{src, alt, w, h}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// File name inside the document's image directory
    #[serde(default)]
    pub src: String,

    #[serde(default)]
    pub alt: String,

    #[serde(rename = "w", default)]
    pub width: u32,

    #[serde(rename = "h", default)]
    pub height: u32,
}

impl Image {
    pub fn new(src: impl Into<String>, alt: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            src: src.into(),
            alt: alt.into(),
            width,
            height,
        }
    }

    /// An image without a source stands for "no image"
    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }
}

/// Which collection a document belongs to.
///
/// Articles and chapters are structurally identical; the kind only selects
/// the registry keys and the storage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Article,
    Chapter,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Article => "article",
            DocumentKind::Chapter => "chapter",
        }
    }

    /// Human-readable label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Article => "Article",
            DocumentKind::Chapter => "Chapter",
        }
    }

    /// Registry key of the read capability, e.g. `"wombat:apps:article-reader"`
    pub fn reader_key(&self, namespace: &str) -> String {
        format!("{}:{}-reader", namespace, self.as_str())
    }

    /// Registry key of the write capability, e.g. `"wombat:apps:article-printer"`
    pub fn printer_key(&self, namespace: &str) -> String {
        format!("{}:{}-printer", namespace, self.as_str())
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted fields of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Primary key, `YYYY/MM/DD/slug/`
    pub title_path: String,

    pub title: String,

    #[serde(default)]
    pub synopsis: String,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub is_published: bool,

    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,

    /// Thumbnail
    #[serde(rename = "img", default)]
    pub image: Image,

    /// Gallery, in display order
    #[serde(rename = "imgs", default)]
    pub images: Vec<Image>,
}

impl DocumentRecord {
    /// A fresh, unpublished record created at `created`
    pub fn new(title: impl Into<String>, created: OffsetDateTime) -> Self {
        let title = title.into();
        Self {
            title_path: title_path(&title, created),
            title,
            synopsis: String::new(),
            content: String::new(),
            is_published: false,
            created,
            modified: created,
            image: Image::default(),
            images: Vec::new(),
        }
    }
}

/// A document bound to the printer that persisted or loaded it.
///
/// Every mutation goes through the bound printer first and only touches the
/// in-memory fields once the write succeeded.
#[derive(Clone)]
pub struct Document {
    record: DocumentRecord,
    printer: Option<Arc<dyn Printer>>,
}

impl Document {
    /// Create a new document titled `title`, stamped with the current time
    pub fn new(title: impl Into<String>, printer: Arc<dyn Printer>) -> Self {
        Self::new_at(title, OffsetDateTime::now_utc(), printer)
    }

    pub fn new_at(
        title: impl Into<String>,
        created: OffsetDateTime,
        printer: Arc<dyn Printer>,
    ) -> Self {
        Self {
            record: DocumentRecord::new(title, created),
            printer: Some(printer),
        }
    }

    /// Create a new document using the printer registered for `kind`
    pub fn from_registry(
        registry: &BackendRegistry,
        kind: DocumentKind,
        title: impl Into<String>,
    ) -> Result<Self> {
        let printer = registry.printer_for(kind)?;
        Ok(Self::new(title, printer))
    }

    /// Wrap a loaded record without a printer. It cannot be mutated until bound.
    pub fn from_record(record: DocumentRecord) -> Self {
        Self { record, printer: None }
    }

    /// Rebind the document to `printer`
    pub fn bind(mut self, printer: Arc<dyn Printer>) -> Self {
        self.printer = Some(printer);
        self
    }

    pub fn is_bound(&self) -> bool {
        self.printer.is_some()
    }

    pub fn record(&self) -> &DocumentRecord {
        &self.record
    }

    pub fn into_record(self) -> DocumentRecord {
        self.record
    }

    pub fn title_path(&self) -> &str {
        &self.record.title_path
    }

    pub fn title(&self) -> &str {
        &self.record.title
    }

    pub fn synopsis(&self) -> &str {
        &self.record.synopsis
    }

    pub fn content(&self) -> &str {
        &self.record.content
    }

    pub fn is_published(&self) -> bool {
        self.record.is_published
    }

    pub fn created(&self) -> OffsetDateTime {
        self.record.created
    }

    pub fn modified(&self) -> OffsetDateTime {
        self.record.modified
    }

    /// Thumbnail; empty when none was uploaded
    pub fn image(&self) -> &Image {
        &self.record.image
    }

    pub fn images(&self) -> &[Image] {
        &self.record.images
    }

    fn printer(&self) -> Result<&Arc<dyn Printer>> {
        self.printer
            .as_ref()
            .ok_or_else(|| WombatError::Unbound(self.record.title_path.clone()))
    }

    /// Insert the document into storage.
    ///
    /// Titles whose title path cannot address the document later, such as
    /// one containing `/`, are rejected with `BadRequest`.
    pub async fn create(&self) -> Result<()> {
        let printer = self.printer()?;
        check_title_path(&self.record.title_path)?;
        printer.print(&self.record).await
    }

    pub async fn set_synopsis(&mut self, synopsis: impl Into<String>) -> Result<()> {
        let synopsis = synopsis.into();
        let modified = OffsetDateTime::now_utc();
        self.printer()?
            .update_synopsis(&self.record.title_path, &synopsis, modified)
            .await?;

        self.record.synopsis = synopsis;
        self.record.modified = modified;
        Ok(())
    }

    pub async fn set_content(&mut self, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        let modified = OffsetDateTime::now_utc();
        self.printer()?
            .update_content(&self.record.title_path, &content, modified)
            .await?;

        self.record.content = content;
        self.record.modified = modified;
        Ok(())
    }

    /// Remove the storage record. Image files are left alone.
    pub async fn delete(&self) -> Result<()> {
        self.printer()?.delete(&self.record.title_path).await
    }

    /// Set the published flag. `modified` is not touched.
    pub async fn publish(&mut self, publish: bool) -> Result<()> {
        self.printer()?.publish(&self.record.title_path, publish).await?;
        self.record.is_published = publish;
        Ok(())
    }

    /// Replace the thumbnail record
    pub async fn set_image(&mut self, image: Image) -> Result<()> {
        self.printer()?
            .write_image(&self.record.title_path, &image)
            .await?;
        self.record.image = image;
        Ok(())
    }

    /// Replace the whole gallery sequence
    pub async fn set_images(&mut self, images: Vec<Image>) -> Result<()> {
        self.printer()?
            .write_images(&self.record.title_path, &images)
            .await?;
        self.record.images = images;
        Ok(())
    }

    /// Add `image` to the gallery, or update the dimensions of the entry
    /// sharing its `src`.
    pub async fn upsert_image(&mut self, image: Image) -> Result<()> {
        let images = upserted(&self.record.images, image);
        self.set_images(images).await
    }

    /// Drop the gallery entry for `src`. Storage is only written when an
    /// entry was actually removed; the return value says whether it was.
    pub async fn remove_image_entry(&mut self, src: &str) -> Result<bool> {
        let images: Vec<Image> = self
            .record
            .images
            .iter()
            .filter(|image| image.src != src)
            .cloned()
            .collect();

        if images.len() == self.record.images.len() {
            return Ok(false);
        }

        self.set_images(images).await?;
        Ok(true)
    }
}

fn upserted(images: &[Image], image: Image) -> Vec<Image> {
    let mut next = images.to_vec();
    match next.iter_mut().find(|existing| existing.src == image.src) {
        Some(existing) => {
            existing.width = image.width;
            existing.height = image.height;
        }
        None => next.push(image),
    }
    next
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("record", &self.record)
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.record.serialize(serializer)
    }
}
