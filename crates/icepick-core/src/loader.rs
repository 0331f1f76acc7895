//! Federated loading.
//!
//! A load fetches an artifact, decides per provided package whether the
//! session already holds a satisfying instance, and instantiates only what is
//! missing: internal chunks first (in manifest order, each linked against the
//! ones before it), then the absent provided slices, then the entry linked
//! against everything.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::host::{HostError, ModuleHost, ModuleUnit};
use crate::io::{FetchError, Fetcher};
use crate::registry::{Claim, Resident, Session};
use crate::reporter::Reporter;
use crate::types::{
    Artifact, Manifest, OrderedMap, PackageName, Slice, SliceKind, Version, VersionRange,
};
use icepick_schema::{FrameError, ManifestError, frame};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("corrupt artifact: {0}")]
    Frame(#[from] FrameError),

    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("`{name}@{resident}` is already loaded and does not satisfy `{range}`")]
    Incompatible {
        name: PackageName,
        resident: Version,
        range: String,
    },

    #[error(transparent)]
    Instantiate(#[from] HostError),
}

/// The outcome of a successful load.
#[derive(Debug, Clone)]
pub struct LoadedBundle<M> {
    /// Logical path of the entry module.
    pub exposes: String,
    pub entry: M,
    /// Every module this load instantiated, in instantiation order.
    pub instantiated: Vec<(SliceKind, String)>,
    /// Provided packages satisfied by resident instances.
    pub reused: Vec<(PackageName, Version)>,
}

/// What a load would do with one provided slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    /// A resident instance satisfies the range.
    Reuse(Version),
    /// Nothing resident; the bundled slice would be instantiated.
    Instantiate,
    /// A resident instance exists but is outside the range.
    Incompatible(Version),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub name: PackageName,
    /// Version bundled in the artifact.
    pub bundled: Version,
    pub range: String,
    pub length: u64,
    pub action: PlanAction,
}

/// Dry-run result of [`plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadPlan {
    pub provided: Vec<PlanStep>,
    pub internal: Vec<String>,
}

impl LoadPlan {
    pub fn is_loadable(&self) -> bool {
        !self
            .provided
            .iter()
            .any(|s| matches!(s.action, PlanAction::Incompatible(_)))
    }

    /// Bytes of the payload a load would skip.
    pub fn reused_bytes(&self) -> u64 {
        self.provided
            .iter()
            .filter(|s| matches!(s.action, PlanAction::Reuse(_)))
            .map(|s| s.length)
            .sum()
    }
}

/// Decide, without instantiating anything, how each provided slice of
/// `manifest` would be handled in `session`.
///
/// # Errors
///
/// Returns [`LoadError::Manifest`] if a range is missing or does not parse.
pub fn plan<M: Clone>(session: &Session<M>, manifest: &Manifest) -> Result<LoadPlan, LoadError> {
    let provided = manifest
        .ranges()?
        .into_iter()
        .map(|(name, slice, range)| {
            let action = match session.resident(name.as_str()) {
                Some(r) if range.matches(&r.version) => PlanAction::Reuse(r.version),
                Some(r) => PlanAction::Incompatible(r.version),
                None => PlanAction::Instantiate,
            };
            PlanStep {
                name: name.clone(),
                bundled: slice.version.clone(),
                range: range.as_str().to_string(),
                length: slice.length,
                action,
            }
        })
        .collect();
    Ok(LoadPlan {
        provided,
        internal: manifest.internal.keys().cloned().collect(),
    })
}

/// Loads artifacts into a [`Session`] through a [`ModuleHost`].
pub struct Loader<H> {
    fetcher: Arc<dyn Fetcher>,
    host: Arc<H>,
    reporter: Arc<dyn Reporter>,
}

impl<H> Clone for Loader<H> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            host: Arc::clone(&self.host),
            reporter: Arc::clone(&self.reporter),
        }
    }
}

impl<H> fmt::Debug for Loader<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader").finish_non_exhaustive()
    }
}

/// A provided slice paired with its parsed range and registry claim.
struct Pending<'s, 'm, M: Clone> {
    slice: Slice<'m>,
    version: Version,
    range: VersionRange,
    claim: Claim<'s, M>,
}

impl<H: ModuleHost> Loader<H> {
    pub fn new(fetcher: Arc<dyn Fetcher>, host: Arc<H>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            fetcher,
            host,
            reporter,
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Fetch, decode and load the artifact at `url`.
    ///
    /// # Errors
    ///
    /// Fails on fetch or framing errors and on every error of
    /// [`Loader::load_artifact`].
    pub async fn load(
        &self,
        session: &Session<H::Module>,
        url: &Url,
    ) -> Result<LoadedBundle<H::Module>, LoadError> {
        self.reporter.section("Loading");
        let bytes = self.fetcher.fetch(url).await?;
        tracing::debug!(%url, size = bytes.len(), "fetched artifact");
        let artifact = frame::decode(bytes)?;
        self.load_artifact(session, &artifact).await
    }

    /// Load an already decoded artifact.
    ///
    /// If this future fails or is dropped, every registry slot it claimed
    /// that no other load holds is removed again.
    ///
    /// # Errors
    ///
    /// Fails if a range does not parse, a resident version is outside its
    /// range, a slice lies outside the payload, or the host rejects a module.
    pub async fn load_artifact(
        &self,
        session: &Session<H::Module>,
        artifact: &Artifact,
    ) -> Result<LoadedBundle<H::Module>, LoadError> {
        let manifest = &artifact.manifest;
        manifest.validate()?;
        let declared = manifest.payload_len()?;
        if declared != artifact.payload.len() as u64 {
            return Err(FrameError::PayloadLength {
                declared,
                actual: artifact.payload.len() as u64,
            }
            .into());
        }
        let layout = manifest.layout()?;
        let ranges = manifest.ranges()?;

        let mut instantiated = Vec::new();
        let mut reused = Vec::new();

        // Claim and check every provided package before instantiating anything.
        let mut pending = Vec::with_capacity(ranges.len());
        let provided_slices = layout.iter().filter(|s| s.kind == SliceKind::Provided);
        for (slice, (name, provided, range)) in provided_slices.zip(ranges) {
            let claim = session.claim(name);
            if let Some(resident) = claim.cell().get() {
                check_range(name, &range, resident)?;
            }
            pending.push(Pending {
                slice: *slice,
                version: provided.version.clone(),
                range,
                claim,
            });
        }

        let mut imports: OrderedMap<String, H::Module> = OrderedMap::new();
        for slice in layout.iter().filter(|s| s.kind == SliceKind::Internal) {
            let module = self.instantiate(artifact, slice, &imports).await?;
            instantiated.push((SliceKind::Internal, slice.name.to_string()));
            imports.insert(slice.name.to_string(), module);
        }

        for p in &pending {
            let name = p.claim.name();
            let mut ran = false;
            let resident = p
                .claim
                .cell()
                .get_or_try_init(|| {
                    ran = true;
                    let bindings = &imports;
                    async move {
                        let module = self.instantiate(artifact, &p.slice, bindings).await?;
                        Ok::<_, LoadError>(Resident {
                            version: p.version.clone(),
                            module,
                        })
                    }
                })
                .await?;

            if ran {
                instantiated.push((SliceKind::Provided, name.to_string()));
            } else {
                // Instantiated earlier, or concurrently by another load.
                check_range(name, &p.range, resident)?;
                self.reporter.reused(name, &resident.version);
                reused.push((name.clone(), resident.version.clone()));
            }
            let module = resident.module.clone();
            imports.insert(name.to_string(), module);
        }

        let entry_slice = layout
            .iter()
            .find(|s| s.kind == SliceKind::Entry)
            .ok_or(ManifestError::MissingExposes)?;
        let entry = self.instantiate(artifact, entry_slice, &imports).await?;
        instantiated.push((SliceKind::Entry, entry_slice.name.to_string()));

        for p in pending {
            p.claim.commit();
        }

        tracing::info!(
            exposes = %manifest.exposes,
            instantiated = instantiated.len(),
            reused = reused.len(),
            "loaded bundle"
        );
        Ok(LoadedBundle {
            exposes: manifest.exposes.clone(),
            entry,
            instantiated,
            reused,
        })
    }

    async fn instantiate(
        &self,
        artifact: &Artifact,
        slice: &Slice<'_>,
        imports: &OrderedMap<String, H::Module>,
    ) -> Result<H::Module, LoadError> {
        let source: Bytes = artifact.slice(slice)?;
        let unit = ModuleUnit {
            kind: slice.kind,
            name: slice.name.to_string(),
            version: slice.version.cloned(),
            source,
        };
        let module = self.host.instantiate(unit, imports).await?;
        self.reporter
            .instantiated(slice.kind, slice.name, slice.length);
        Ok(module)
    }
}

fn check_range<M>(
    name: &PackageName,
    range: &VersionRange,
    resident: &Resident<M>,
) -> Result<(), LoadError> {
    if range.matches(&resident.version) {
        Ok(())
    } else {
        Err(LoadError::Incompatible {
            name: name.clone(),
            resident: resident.version.clone(),
            range: range.as_str().to_string(),
        })
    }
}
