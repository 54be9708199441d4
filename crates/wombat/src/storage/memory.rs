//! In-memory document store for testing and development

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use time::OffsetDateTime;

use super::{Backend, Printer, Reader};
use crate::document::{Document, DocumentKind, DocumentRecord, Image};
use crate::error::{Result, WombatError};

/// In-memory backend.
///
/// Clones share the same underlying map, so documents loaded from one clone
/// are bound to a printer that writes to the same data.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    kind: DocumentKind,
    data: Arc<Mutex<HashMap<String, DocumentRecord>>>,
}

impl MemoryBackend {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Get all stored title paths (useful for testing)
    pub fn title_paths(&self) -> Vec<String> {
        match self.data.lock() {
            Ok(data) => data.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut data) = self.data.lock() {
            data.clear();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, DocumentRecord>>> {
        self.data
            .lock()
            .map_err(|_| WombatError::datastore_msg("Lock poisoned"))
    }

    fn bound(&self, record: DocumentRecord) -> Document {
        Document::from_record(record).bind(Arc::new(self.clone()))
    }

    /// Apply `change` to the record at `title_path`
    fn update<F>(&self, title_path: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut DocumentRecord),
    {
        let mut data = self.lock()?;
        let record = data
            .get_mut(title_path)
            .ok_or_else(|| WombatError::NotFound(self.kind.label().to_string()))?;
        change(record);
        Ok(())
    }
}

#[async_trait]
impl Reader for MemoryBackend {
    async fn by_title_path(&self, title_path: &str, include_unpublished: bool) -> Result<Document> {
        let data = self.lock()?;
        data.get(title_path)
            .filter(|record| include_unpublished || record.is_published)
            .cloned()
            .map(|record| self.bound(record))
            .ok_or_else(|| WombatError::NotFound(self.kind.label().to_string()))
    }

    async fn recent(
        &self,
        limit: u32,
        page: u32,
        include_unpublished: bool,
    ) -> Result<Vec<Document>> {
        let mut records: Vec<DocumentRecord> = {
            let data = self.lock()?;
            data.values()
                .filter(|record| include_unpublished || record.is_published)
                .cloned()
                .collect()
        };

        records.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| a.title_path.cmp(&b.title_path))
        });

        let skip = (page as usize).saturating_mul(limit as usize);
        Ok(records
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .map(|record| self.bound(record))
            .collect())
    }
}

#[async_trait]
impl Printer for MemoryBackend {
    async fn print(&self, document: &DocumentRecord) -> Result<()> {
        let mut data = self.lock()?;
        if data.contains_key(&document.title_path) {
            return Err(WombatError::datastore_msg(format!(
                "Failed to create {}: duplicate title path {}",
                self.kind, document.title_path
            )));
        }
        data.insert(document.title_path.clone(), document.clone());
        Ok(())
    }

    async fn update_synopsis(
        &self,
        title_path: &str,
        synopsis: &str,
        modified: OffsetDateTime,
    ) -> Result<()> {
        self.update(title_path, |record| {
            record.synopsis = synopsis.to_string();
            record.modified = modified;
        })
    }

    async fn update_content(
        &self,
        title_path: &str,
        content: &str,
        modified: OffsetDateTime,
    ) -> Result<()> {
        self.update(title_path, |record| {
            record.content = content.to_string();
            record.modified = modified;
        })
    }

    async fn delete(&self, title_path: &str) -> Result<()> {
        let mut data = self.lock()?;
        data.remove(title_path)
            .map(|_| ())
            .ok_or_else(|| WombatError::NotFound(self.kind.label().to_string()))
    }

    async fn publish(&self, title_path: &str, publish: bool) -> Result<()> {
        self.update(title_path, |record| record.is_published = publish)
    }

    async fn write_image(&self, title_path: &str, image: &Image) -> Result<()> {
        self.update(title_path, |record| record.image = image.clone())
    }

    async fn write_images(&self, title_path: &str, images: &[Image]) -> Result<()> {
        self.update(title_path, |record| record.images = images.to_vec())
    }
}

impl Backend for MemoryBackend {
    fn reader(&self) -> Option<Arc<dyn Reader>> {
        Some(Arc::new(self.clone()))
    }

    fn printer(&self) -> Option<Arc<dyn Printer>> {
        Some(Arc::new(self.clone()))
    }
}
