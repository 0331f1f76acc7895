//! Reporter trait for dependency injection
//!
//! This trait allows build and load logic to report progress without
//! being coupled to a specific terminal implementation.

use crate::types::{PackageName, SliceKind, Version};

pub trait Reporter: Send + Sync {
    /// Indicates a new section or phase has started (e.g. "Resolving", "Loading").
    fn section(&self, title: &str);

    /// A chunk was appended to the payload being assembled.
    fn chunk_written(&self, kind: SliceKind, name: &str, length: u64);

    /// A slice was instantiated into a fresh module.
    fn instantiated(&self, kind: SliceKind, name: &str, length: u64);

    /// A provided slice was skipped in favour of a resident instance.
    fn reused(&self, name: &PackageName, version: &Version);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Display a final summary line.
    fn summary(&self, msg: &str, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn chunk_written(&self, kind: SliceKind, name: &str, length: u64) {
        (**self).chunk_written(kind, name, length);
    }
    fn instantiated(&self, kind: SliceKind, name: &str, length: u64) {
        (**self).instantiated(kind, name, length);
    }
    fn reused(&self, name: &PackageName, version: &Version) {
        (**self).reused(name, version);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn summary(&self, msg: &str, elapsed_secs: f64) {
        (**self).summary(msg, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (e.g., library use, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn chunk_written(&self, _: SliceKind, _: &str, _: u64) {}
    fn instantiated(&self, _: SliceKind, _: &str, _: u64) {}
    fn reused(&self, _: &PackageName, _: &Version) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn summary(&self, _: &str, _: f64) {}
}
