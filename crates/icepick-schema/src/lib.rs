//! Wire format shared by the icepick bundle producer and the federated loader.
//!
//! An artifact is a single file made of a fixed-width prefix, a JSON
//! [`Manifest`] header and a binary payload of concatenated module slices.
//! See [`frame`] for the exact byte layout.

pub mod frame;
pub mod hash;
pub mod manifest;
pub mod ordered;
pub mod types;
pub mod version;

// Re-exports
pub use frame::{Artifact, FrameError};
pub use hash::Blake3Hash;
pub use manifest::{ENTRY_PATH, Manifest, ManifestError, ProvidedSlice, Slice, SliceKind};
pub use ordered::OrderedMap;
pub use types::*;
pub use version::{RangeError, VersionRange};

/// Magic bytes opening every artifact (`ICPK`).
pub const MAGIC: [u8; 4] = *b"ICPK";

/// Current artifact format version written by the encoder.
pub const FORMAT_VERSION: u32 = 1;
