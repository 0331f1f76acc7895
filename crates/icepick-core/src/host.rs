//! Module host abstraction.
//!
//! The loader never evaluates code itself. It hands each slice to a
//! [`ModuleHost`] together with the modules the slice may import, keyed by
//! import specifier (package name for provided modules, `./`-path for
//! internal chunks).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::types::{Blake3Hash, OrderedMap, SliceKind, Version};

/// One slice to be turned into a module.
#[derive(Debug, Clone)]
pub struct ModuleUnit {
    pub kind: SliceKind,
    /// Package name, internal chunk path, or the exposed entry path.
    pub name: String,
    /// Concrete version, for provided slices.
    pub version: Option<Version>,
    pub source: Bytes,
}

#[derive(Error, Debug)]
#[error("failed to instantiate {kind} `{name}`: {reason}")]
pub struct HostError {
    pub kind: SliceKind,
    pub name: String,
    pub reason: String,
}

impl HostError {
    pub fn new(unit: &ModuleUnit, reason: impl Into<String>) -> Self {
        Self {
            kind: unit.kind,
            name: unit.name.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait ModuleHost: Send + Sync {
    /// Handle to an instantiated module. Cloning must share the instance.
    type Module: Clone + Send + Sync + 'static;

    async fn instantiate(
        &self,
        unit: ModuleUnit,
        imports: &OrderedMap<String, Self::Module>,
    ) -> Result<Self::Module, HostError>;
}

/// What [`RecordingHost`] instantiated.
#[derive(Debug)]
pub struct RecordedModule {
    /// Instantiation sequence number, unique per host.
    pub id: usize,
    pub kind: SliceKind,
    pub name: String,
    pub version: Option<Version>,
    pub length: u64,
    pub digest: Blake3Hash,
    /// `(specifier, id)` of every binding the module was linked against.
    pub imports: Vec<(String, usize)>,
}

/// A host that evaluates nothing and records every instantiation.
///
/// Useful for dry runs and for asserting deduplication: two modules are the
/// same instance iff they share an `id`.
#[derive(Debug, Default)]
pub struct RecordingHost {
    next_id: AtomicUsize,
    log: Mutex<Vec<Arc<RecordedModule>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every module instantiated so far, in order.
    pub fn instantiated(&self) -> Vec<Arc<RecordedModule>> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times a module named `name` was instantiated.
    pub fn count(&self, name: &str) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| m.name == name)
            .count()
    }

    pub fn total(&self) -> usize {
        self.next_id.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModuleHost for RecordingHost {
    type Module = Arc<RecordedModule>;

    async fn instantiate(
        &self,
        unit: ModuleUnit,
        imports: &OrderedMap<String, Self::Module>,
    ) -> Result<Self::Module, HostError> {
        // Let concurrent loads interleave as they would with a real host.
        tokio::task::yield_now().await;

        let module = Arc::new(RecordedModule {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            kind: unit.kind,
            length: unit.source.len() as u64,
            digest: Blake3Hash::compute(&unit.source),
            imports: imports
                .iter()
                .map(|(spec, m)| (spec.clone(), m.id))
                .collect(),
            name: unit.name,
            version: unit.version,
        });
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&module));
        Ok(module)
    }
}
