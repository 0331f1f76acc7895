//! The manifest header describing an artifact's payload.
//!
//! The manifest records, for every slice of the payload, how many bytes it
//! occupies. Slice offsets are never stored: they are recomputed as a running
//! sum in a fixed order (entry, then `internal`, then `provides`), so the
//! header cannot disagree with itself about where a slice starts.

use crate::ordered::OrderedMap;
use crate::types::{PackageName, Version};
use crate::version::{RangeError, VersionRange};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

/// Logical path under which the application entry is exposed.
pub const ENTRY_PATH: &str = "./index.js";

/// Errors raised when a manifest is structurally invalid.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// `exposes` is empty.
    #[error("manifest does not expose an entry module")]
    MissingExposes,

    /// A package name cannot be used as an import specifier.
    #[error("invalid package name `{0}`")]
    InvalidName(PackageName),

    /// An internal chunk has an empty path.
    #[error("internal chunk with empty path")]
    EmptyChunkPath,

    /// A provided package has no matching `requires` range.
    #[error("package `{0}` is provided but has no `requires` range")]
    MissingRequirement(PackageName),

    /// A `requires` entry names a package the artifact does not provide.
    #[error("package `{0}` is required but not provided")]
    UnprovidedRequirement(PackageName),

    /// A `requires` range cannot be parsed.
    #[error("package `{name}` has an invalid range")]
    InvalidRange {
        /// The package whose range is invalid.
        name: PackageName,
        /// The parse failure.
        #[source]
        source: RangeError,
    },

    /// Recorded slice lengths overflow a 64-bit offset.
    #[error("slice lengths overflow the payload size")]
    Overflow,
}

/// A provided package's slice: the concrete version bundled and its byte length.
///
/// Serialized as a `[version, length]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Version, u64)", into = "(Version, u64)")]
pub struct ProvidedSlice {
    /// Concrete version read from the package's own descriptor.
    pub version: Version,
    /// Byte length of the slice in the payload.
    pub length: u64,
}

impl From<(Version, u64)> for ProvidedSlice {
    fn from((version, length): (Version, u64)) -> Self {
        Self { version, length }
    }
}

impl From<ProvidedSlice> for (Version, u64) {
    fn from(slice: ProvidedSlice) -> Self {
        (slice.version, slice.length)
    }
}

/// Header record of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Module path the application entry is importable as.
    pub exposes: String,
    /// Byte length of the entry chunk, always the first slice.
    pub entry: u64,
    /// Named, versioned third-party packages in declaration order.
    pub provides: OrderedMap<PackageName, ProvidedSlice>,
    /// Unnamed shared chunks, keyed by path.
    pub internal: OrderedMap<String, u64>,
    /// Version ranges the application declared for each provided package.
    pub requires: OrderedMap<PackageName, String>,
}

/// Which section of the manifest a slice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceKind {
    /// The compiled application entry.
    Entry,
    /// A shared chunk without version identity.
    Internal,
    /// A named, versioned package.
    Provided,
}

impl std::fmt::Display for SliceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Entry => "entry",
            Self::Internal => "internal",
            Self::Provided => "provided",
        };
        f.pad(label)
    }
}

/// The position of one slice inside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice<'a> {
    /// Section the slice belongs to.
    pub kind: SliceKind,
    /// Entry path, internal chunk path, or package name.
    pub name: &'a str,
    /// Concrete version, for provided packages.
    pub version: Option<&'a Version>,
    /// Byte offset from the start of the payload.
    pub offset: u64,
    /// Byte length.
    pub length: u64,
}

impl Slice<'_> {
    /// Byte range of the slice within the payload.
    ///
    /// Returns `None` if the range does not fit in `usize`.
    pub fn range(&self) -> Option<Range<usize>> {
        let start = usize::try_from(self.offset).ok()?;
        let len = usize::try_from(self.length).ok()?;
        Some(start..start.checked_add(len)?)
    }
}

impl Manifest {
    /// Create an empty manifest exposing the entry at [`ENTRY_PATH`].
    pub fn new() -> Self {
        Self {
            exposes: ENTRY_PATH.to_string(),
            entry: 0,
            provides: OrderedMap::new(),
            internal: OrderedMap::new(),
            requires: OrderedMap::new(),
        }
    }

    /// Check the structural invariants a loader relies on.
    ///
    /// # Errors
    ///
    /// Returns the first [`ManifestError`] found.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.exposes.trim().is_empty() {
            return Err(ManifestError::MissingExposes);
        }
        if self.internal.keys().any(|path| path.trim().is_empty()) {
            return Err(ManifestError::EmptyChunkPath);
        }
        for name in self.provides.keys().chain(self.requires.keys()) {
            if !name.is_valid() {
                return Err(ManifestError::InvalidName(name.clone()));
            }
        }
        for name in self.requires.keys() {
            if !self.provides.contains_key(name.as_str()) {
                return Err(ManifestError::UnprovidedRequirement(name.clone()));
            }
        }
        self.ranges()?;
        self.payload_len()?;
        Ok(())
    }

    /// Parse the `requires` range of every provided package, in `provides` order.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MissingRequirement`] if a provided package has
    /// no range and [`ManifestError::InvalidRange`] if a range does not parse.
    pub fn ranges(
        &self,
    ) -> Result<Vec<(&PackageName, &ProvidedSlice, VersionRange)>, ManifestError> {
        self.provides
            .iter()
            .map(|(name, slice)| {
                let raw = self
                    .requires
                    .get(name.as_str())
                    .ok_or_else(|| ManifestError::MissingRequirement(name.clone()))?;
                let range = VersionRange::parse(raw).map_err(|source| {
                    ManifestError::InvalidRange {
                        name: name.clone(),
                        source,
                    }
                })?;
                Ok((name, slice, range))
            })
            .collect()
    }

    /// Total payload size implied by the recorded lengths.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Overflow`] if the lengths do not fit in `u64`.
    pub fn payload_len(&self) -> Result<u64, ManifestError> {
        self.internal
            .values()
            .copied()
            .chain(self.provides.values().map(|p| p.length))
            .try_fold(self.entry, u64::checked_add)
            .ok_or(ManifestError::Overflow)
    }

    /// Compute every slice's offset with a left-to-right running sum.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Overflow`] if an offset does not fit in `u64`.
    pub fn layout(&self) -> Result<Vec<Slice<'_>>, ManifestError> {
        let entries = std::iter::once((SliceKind::Entry, self.exposes.as_str(), None, self.entry))
            .chain(
                self.internal
                    .iter()
                    .map(|(path, length)| (SliceKind::Internal, path.as_str(), None, *length)),
            )
            .chain(self.provides.iter().map(|(name, slice)| {
                (
                    SliceKind::Provided,
                    name.as_str(),
                    Some(&slice.version),
                    slice.length,
                )
            }));

        let mut slices = Vec::with_capacity(1 + self.internal.len() + self.provides.len());
        let mut offset = 0u64;
        for (kind, name, version, length) in entries {
            slices.push(Slice {
                kind,
                name,
                version,
                offset,
                length,
            });
            offset = offset.checked_add(length).ok_or(ManifestError::Overflow)?;
        }
        Ok(slices)
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        let mut m = Manifest::new();
        m.entry = 10;
        m.internal.insert("./common/helpers.js".to_string(), 5);
        m.provides.insert(
            PackageName::new("react"),
            ProvidedSlice {
                version: Version::new("18.2.0"),
                length: 20,
            },
        );
        m.provides.insert(
            PackageName::new("lodash"),
            ProvidedSlice {
                version: Version::new("4.17.21"),
                length: 7,
            },
        );
        m.requires.insert(PackageName::new("react"), "^18.0.0".into());
        m.requires.insert(PackageName::new("lodash"), "^4.0.0".into());
        m
    }

    #[test]
    fn layout_is_a_running_sum() {
        let m = sample();
        let layout = m.layout().unwrap();
        let offsets: Vec<(SliceKind, &str, u64, u64)> = layout
            .iter()
            .map(|s| (s.kind, s.name, s.offset, s.length))
            .collect();
        assert_eq!(
            offsets,
            vec![
                (SliceKind::Entry, "./index.js", 0, 10),
                (SliceKind::Internal, "./common/helpers.js", 10, 5),
                (SliceKind::Provided, "react", 15, 20),
                (SliceKind::Provided, "lodash", 35, 7),
            ]
        );
        assert_eq!(m.payload_len().unwrap(), 42);
    }

    #[test]
    fn wire_shape_matches_the_header_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["exposes"], "./index.js");
        assert_eq!(json["provides"]["react"], serde_json::json!(["18.2.0", 20]));
        assert_eq!(json["internal"]["./common/helpers.js"], 5);
        assert_eq!(json["requires"]["lodash"], "^4.0.0");
    }

    #[test]
    fn validate_requires_ranges_for_provided_packages() {
        let mut m = sample();
        m.requires = OrderedMap::new();
        m.requires.insert(PackageName::new("react"), "^18.0.0".into());
        assert!(matches!(
            m.validate(),
            Err(ManifestError::MissingRequirement(name)) if name == "lodash"
        ));
    }

    #[test]
    fn validate_rejects_unparseable_ranges() {
        let mut m = sample();
        m.requires.insert(PackageName::new("react"), "not a range".into());
        assert!(matches!(
            m.validate(),
            Err(ManifestError::InvalidRange { .. })
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = r#"{
            "exposes": "./index.js",
            "entry": 0,
            "provides": {},
            "internal": {},
            "requires": {},
            "extra": 1
        }"#;
        assert!(serde_json::from_str::<Manifest>(json).is_err());
    }

    #[test]
    fn missing_fields_are_rejected() {
        let json = r#"{"exposes":"./index.js","provides":{},"internal":{},"requires":{}}"#;
        assert!(serde_json::from_str::<Manifest>(json).is_err());
    }
}
