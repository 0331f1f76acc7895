//! Artifact framing.
//!
//! ```text
//! +-------+----------------+------------------+-------------+-----------+
//! | magic | format version | header length    | header      | payload   |
//! | ICPK  | u32 LE         | u64 LE           | JSON bytes  | slices... |
//! +-------+----------------+------------------+-------------+-----------+
//!   4 B     4 B              8 B                header len    rest
//! ```
//!
//! The header length prefix lets a reader recover the exact extent of the
//! JSON header without parsing it incrementally. Nothing follows the payload.

use bytes::Bytes;
use thiserror::Error;

use crate::manifest::{Manifest, ManifestError, Slice};
use crate::{FORMAT_VERSION, MAGIC};

/// Size of the fixed-width prefix before the JSON header.
pub const PREFIX_LEN: usize = 16;

/// Errors raised while framing or unframing an artifact.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The artifact does not start with [`MAGIC`].
    #[error("not an icepick artifact (bad magic)")]
    BadMagic,

    /// The artifact was written with a format this reader does not understand.
    #[error("unsupported artifact format version {0}")]
    UnsupportedVersion(u32),

    /// The artifact ends before the prefix or the declared header.
    #[error("truncated artifact: need {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: u64,
        /// Bytes available.
        actual: u64,
    },

    /// The header is not valid manifest JSON.
    #[error("invalid manifest header: {0}")]
    Header(#[from] serde_json::Error),

    /// The header parsed but violates a manifest invariant.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The payload size disagrees with the recorded slice lengths.
    #[error("payload is {actual} bytes but the manifest accounts for {declared}")]
    PayloadLength {
        /// Sum of the lengths recorded in the manifest.
        declared: u64,
        /// Actual payload size.
        actual: u64,
    },

    /// A slice lies outside the payload.
    #[error("slice `{name}` at {offset}+{length} is outside the {payload}-byte payload")]
    SliceOutOfBounds {
        /// Slice name.
        name: String,
        /// Slice offset.
        offset: u64,
        /// Slice length.
        length: u64,
        /// Payload size.
        payload: u64,
    },
}

/// A decoded artifact: validated manifest plus its payload.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// The header record.
    pub manifest: Manifest,
    /// The concatenated slices.
    pub payload: Bytes,
}

impl Artifact {
    /// Return the bytes of one slice without copying.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::SliceOutOfBounds`] if the slice does not fit in
    /// the payload.
    pub fn slice(&self, slice: &Slice<'_>) -> Result<Bytes, FrameError> {
        let out_of_bounds = || FrameError::SliceOutOfBounds {
            name: slice.name.to_string(),
            offset: slice.offset,
            length: slice.length,
            payload: self.payload.len() as u64,
        };
        let range = slice.range().ok_or_else(out_of_bounds)?;
        if range.end > self.payload.len() {
            return Err(out_of_bounds());
        }
        Ok(self.payload.slice(range))
    }
}

/// Serialize the prefix and JSON header for a manifest.
///
/// # Errors
///
/// Returns [`FrameError::Header`] if the manifest cannot be serialized.
pub fn encode_header(manifest: &Manifest) -> Result<Vec<u8>, FrameError> {
    let header = serde_json::to_vec(manifest)?;
    let mut out = Vec::with_capacity(PREFIX_LEN + header.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(header.len() as u64).to_le_bytes());
    out.extend_from_slice(&header);
    Ok(out)
}

/// Frame a manifest and its payload into a complete artifact.
///
/// # Errors
///
/// Returns [`FrameError::Manifest`] if the manifest is invalid and
/// [`FrameError::PayloadLength`] if the payload does not match it.
pub fn encode(manifest: &Manifest, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    manifest.validate()?;
    let declared = manifest.payload_len()?;
    if declared != payload.len() as u64 {
        return Err(FrameError::PayloadLength {
            declared,
            actual: payload.len() as u64,
        });
    }
    let mut out = encode_header(manifest)?;
    out.reserve(payload.len());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Split an artifact into its validated manifest and payload.
///
/// # Errors
///
/// Returns a [`FrameError`] describing the first framing, header or
/// consistency problem found.
pub fn decode(bytes: Bytes) -> Result<Artifact, FrameError> {
    let total = bytes.len() as u64;
    if bytes.len() < PREFIX_LEN {
        return Err(FrameError::Truncated {
            expected: PREFIX_LEN as u64,
            actual: total,
        });
    }
    if bytes[..4] != MAGIC {
        return Err(FrameError::BadMagic);
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }

    let mut header_len = [0u8; 8];
    header_len.copy_from_slice(&bytes[8..PREFIX_LEN]);
    let header_len = u64::from_le_bytes(header_len);
    let header_end = (PREFIX_LEN as u64)
        .checked_add(header_len)
        .filter(|end| *end <= total)
        .ok_or(FrameError::Truncated {
            expected: (PREFIX_LEN as u64).saturating_add(header_len),
            actual: total,
        })?;
    let header_end = header_end as usize;

    let manifest: Manifest = serde_json::from_slice(&bytes[PREFIX_LEN..header_end])?;
    manifest.validate()?;

    let payload = bytes.slice(header_end..);
    let declared = manifest.payload_len()?;
    if declared != payload.len() as u64 {
        return Err(FrameError::PayloadLength {
            declared,
            actual: payload.len() as u64,
        });
    }

    Ok(Artifact { manifest, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ProvidedSlice;
    use crate::types::{PackageName, Version};

    fn sample() -> (Manifest, Vec<u8>) {
        let mut m = Manifest::new();
        m.entry = 4;
        m.internal.insert("./common/a.js".to_string(), 3);
        m.provides.insert(
            PackageName::new("react"),
            ProvidedSlice {
                version: Version::new("18.2.0"),
                length: 5,
            },
        );
        m.requires.insert(PackageName::new("react"), "^18.0.0".into());
        (m, b"ENTRcomREACT".to_vec())
    }

    #[test]
    fn decode_recovers_header_and_slices() {
        let (m, payload) = sample();
        let artifact = decode(Bytes::from(encode(&m, &payload).unwrap())).unwrap();
        assert_eq!(artifact.manifest, m);

        let layout = artifact.manifest.layout().unwrap();
        let slices: Vec<Bytes> = layout.iter().map(|s| artifact.slice(s).unwrap()).collect();
        assert_eq!(slices[0], &b"ENTR"[..]);
        assert_eq!(slices[1], &b"com"[..]);
        assert_eq!(slices[2], &b"REACT"[..]);
    }

    #[test]
    fn prefix_records_header_length() {
        let (m, payload) = sample();
        let bytes = encode(&m, &payload).unwrap();
        assert_eq!(&bytes[..4], b"ICPK");
        let header_len = u64::from_le_bytes(bytes[8..16].try_into().unwrap()) as usize;
        assert_eq!(bytes.len(), PREFIX_LEN + header_len + payload.len());
        assert_eq!(bytes[PREFIX_LEN + header_len - 1], b'}');
    }

    #[test]
    fn encode_rejects_mismatched_payload() {
        let (m, _) = sample();
        assert!(matches!(
            encode(&m, b"short"),
            Err(FrameError::PayloadLength {
                declared: 12,
                actual: 5
            })
        ));
    }

    #[test]
    fn truncated_artifacts_are_rejected() {
        let (m, payload) = sample();
        let bytes = encode(&m, &payload).unwrap();

        let err = decode(Bytes::copy_from_slice(&bytes[..10])).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { .. }));

        let err = decode(Bytes::copy_from_slice(&bytes[..PREFIX_LEN + 3])).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { .. }));

        let err = decode(Bytes::copy_from_slice(&bytes[..bytes.len() - 1])).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadLength {
                declared: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn foreign_or_future_artifacts_are_rejected() {
        let (m, payload) = sample();
        let mut bytes = encode(&m, &payload).unwrap();

        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            decode(Bytes::from(bytes.clone())),
            Err(FrameError::UnsupportedVersion(2))
        ));

        bytes[0] = b'X';
        assert!(matches!(
            decode(Bytes::from(bytes)),
            Err(FrameError::BadMagic)
        ));
    }

    #[test]
    fn slices_outside_the_payload_are_corruption() {
        let (m, payload) = sample();
        let artifact = decode(Bytes::from(encode(&m, &payload).unwrap())).unwrap();
        let bogus = Slice {
            kind: crate::manifest::SliceKind::Provided,
            name: "react",
            version: None,
            offset: 10,
            length: 5,
        };
        assert!(matches!(
            artifact.slice(&bogus),
            Err(FrameError::SliceOutOfBounds { .. })
        ));
    }
}
