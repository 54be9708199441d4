//! Read-side entry point for documents

use std::sync::Arc;

use crate::document::{Document, DocumentKind};
use crate::error::{Result, WombatError};
use crate::registry::BackendRegistry;
use crate::storage::Reader;

/// Resolves the reader for one document kind and exposes lookups.
///
/// Callers do not need to know the registry key convention; construction
/// fails when the reader is missing, which should stop the process from
/// serving reads at all.
#[derive(Clone)]
pub struct Repository {
    kind: DocumentKind,
    reader: Arc<dyn Reader>,
}

impl Repository {
    /// Resolve the reader registered for `kind`
    pub fn new(registry: &BackendRegistry, kind: DocumentKind) -> Result<Self> {
        let reader = registry.reader_for(kind)?;
        tracing::debug!(kind = %kind, namespace = registry.namespace(), "resolved document reader");
        Ok(Self { kind, reader })
    }

    pub fn with_reader(kind: DocumentKind, reader: Arc<dyn Reader>) -> Self {
        Self { kind, reader }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Exact-match lookup. A hidden document is reported as not found.
    pub async fn by_title_path(
        &self,
        title_path: &str,
        include_unpublished: bool,
    ) -> Result<Document> {
        let document = self.reader.by_title_path(title_path, include_unpublished).await?;
        if !include_unpublished && !document.is_published() {
            return Err(WombatError::NotFound(self.kind.label().to_string()));
        }
        Ok(document)
    }

    /// Page `page` of the most recently created documents, `limit` per page
    pub async fn recent(
        &self,
        limit: u32,
        page: u32,
        include_unpublished: bool,
    ) -> Result<Vec<Document>> {
        if limit == 0 {
            return Err(WombatError::bad_request("page size must be positive"));
        }
        self.reader.recent(limit, page, include_unpublished).await
    }
}
