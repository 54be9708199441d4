//! Shared test doubles

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use wombat::images::{Dimensions, ImageConverter};
use wombat::{
    Backend, DocumentKind, DocumentRecord, Image, MemoryBackend, Printer, Reader, Result,
    WombatError,
};

/// Memory backend whose writes can be switched to fail
#[derive(Clone)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    failing: Arc<AtomicBool>,
}

impl FlakyBackend {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            inner: MemoryBackend::new(kind),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WombatError::datastore_msg("write rejected"));
        }
        Ok(())
    }
}

#[async_trait]
impl Printer for FlakyBackend {
    async fn print(&self, document: &DocumentRecord) -> Result<()> {
        self.check()?;
        self.inner.print(document).await
    }

    async fn update_synopsis(
        &self,
        title_path: &str,
        synopsis: &str,
        modified: OffsetDateTime,
    ) -> Result<()> {
        self.check()?;
        self.inner.update_synopsis(title_path, synopsis, modified).await
    }

    async fn update_content(
        &self,
        title_path: &str,
        content: &str,
        modified: OffsetDateTime,
    ) -> Result<()> {
        self.check()?;
        self.inner.update_content(title_path, content, modified).await
    }

    async fn delete(&self, title_path: &str) -> Result<()> {
        self.check()?;
        Printer::delete(&self.inner, title_path).await
    }

    async fn publish(&self, title_path: &str, publish: bool) -> Result<()> {
        self.check()?;
        self.inner.publish(title_path, publish).await
    }

    async fn write_image(&self, title_path: &str, image: &Image) -> Result<()> {
        self.check()?;
        self.inner.write_image(title_path, image).await
    }

    async fn write_images(&self, title_path: &str, images: &[Image]) -> Result<()> {
        self.check()?;
        self.inner.write_images(title_path, images).await
    }
}

impl Backend for FlakyBackend {
    fn reader(&self) -> Option<Arc<dyn Reader>> {
        Some(Arc::new(self.inner.clone()))
    }

    fn printer(&self) -> Option<Arc<dyn Printer>> {
        Some(Arc::new(self.clone()))
    }
}

/// Converter that copies bytes through and reports fixed dimensions
pub struct StubConverter {
    pub dims: Dimensions,
    pub fail: bool,
}

impl StubConverter {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            dims: Dimensions { width, height },
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            dims: Dimensions { width: 0, height: 0 },
            fail: true,
        }
    }
}

impl ImageConverter for StubConverter {
    fn convert_to_jpeg(&self, src: &Path, dest: &Path) -> Result<Dimensions> {
        if self.fail {
            return Err(WombatError::Conversion("stub refused".to_string()));
        }
        std::fs::copy(src, dest)?;
        Ok(self.dims)
    }

    fn resize_width_to_jpeg(&self, src: &Path, dest: &Path, width: u32) -> Result<Dimensions> {
        let dims = self.convert_to_jpeg(src, dest)?;
        Ok(Dimensions {
            width,
            height: dims.height,
        })
    }
}

/// Sorted file names in `dir`, including hidden files
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
