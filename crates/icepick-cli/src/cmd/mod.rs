//! Command implementations, one module per subcommand.

pub mod build;
pub mod inspect;
pub mod load;
pub mod plan;

use anyhow::{Context, Result};
use bytes::Bytes;
use icepick_schema::{Artifact, frame};
use std::path::Path;

/// Read and decode a bundle file.
pub(crate) fn read_artifact(path: &Path) -> Result<(Artifact, Bytes)> {
    let bytes = Bytes::from(
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?,
    );
    let artifact = frame::decode(bytes.clone())
        .with_context(|| format!("{} is not a valid bundle", path.display()))?;
    Ok((artifact, bytes))
}
