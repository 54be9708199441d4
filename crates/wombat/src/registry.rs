//! Backend registry
//!
//! Maps string keys to backend instances. Registration happens on a
//! [`RegistryBuilder`] during startup; [`RegistryBuilder::build`] consumes it
//! and yields an immutable [`BackendRegistry`] that can be cloned and shared
//! between concurrent callers without locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::document::DocumentKind;
use crate::error::{Result, WombatError};
use crate::storage::{Backend, Printer, Reader};

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "wombat:apps";

/// Write side of the registry, only used during initialization
pub struct RegistryBuilder {
    namespace: String,
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl RegistryBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            backends: HashMap::new(),
        }
    }

    /// Register `backend` under `key`. A previous registration for the same
    /// key is replaced.
    pub fn register(&mut self, key: impl Into<String>, backend: Arc<dyn Backend>) -> &mut Self {
        let key = key.into();
        if self.backends.insert(key.clone(), backend).is_some() {
            tracing::debug!(key = %key, "replaced registered backend");
        } else {
            tracing::debug!(key = %key, "registered backend");
        }
        self
    }

    /// Register `backend` as both reader and printer for `kind` under the
    /// builder's namespace
    pub fn register_kind(&mut self, kind: DocumentKind, backend: Arc<dyn Backend>) -> &mut Self {
        let reader_key = kind.reader_key(&self.namespace);
        let printer_key = kind.printer_key(&self.namespace);
        self.register(reader_key, Arc::clone(&backend));
        self.register(printer_key, backend)
    }

    pub fn build(self) -> BackendRegistry {
        BackendRegistry {
            namespace: Arc::from(self.namespace),
            backends: Arc::new(self.backends),
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

/// Read-only view of the registered backends
#[derive(Clone)]
pub struct BackendRegistry {
    namespace: Arc<str>,
    backends: Arc<HashMap<String, Arc<dyn Backend>>>,
}

impl BackendRegistry {
    pub fn builder(namespace: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder::new(namespace)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Look up the backend registered under `key`
    pub fn open(&self, key: &str) -> Result<Arc<dyn Backend>> {
        self.backends
            .get(key)
            .cloned()
            .ok_or_else(|| WombatError::NotRegistered(key.to_string()))
    }

    /// Look up `key` and resolve its read capability
    pub fn open_reader(&self, key: &str) -> Result<Arc<dyn Reader>> {
        self.open(key)?
            .reader()
            .ok_or_else(|| WombatError::InvalidBackend {
                key: key.to_string(),
                capability: "reader",
            })
    }

    /// Look up `key` and resolve its write capability
    pub fn open_printer(&self, key: &str) -> Result<Arc<dyn Printer>> {
        self.open(key)?
            .printer()
            .ok_or_else(|| WombatError::InvalidBackend {
                key: key.to_string(),
                capability: "printer",
            })
    }

    pub fn reader_for(&self, kind: DocumentKind) -> Result<Arc<dyn Reader>> {
        self.open_reader(&kind.reader_key(&self.namespace))
    }

    pub fn printer_for(&self, kind: DocumentKind) -> Result<Arc<dyn Printer>> {
        self.open_printer(&kind.printer_key(&self.namespace))
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
