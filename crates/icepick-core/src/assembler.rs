//! Bundle assembly.
//!
//! The entry is compiled with every declared dependency left external, then
//! the payload is written in slice order (entry, internal chunks, provided
//! modules) through an [`OffsetTracker`]. Each chunk's measured length goes
//! straight into the manifest, so the header can never describe bytes that
//! were not written.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::fs;

use crate::classify::{self, ClassifyError};
use crate::compiler::{CompileError, Compiler, EsbuildCompiler};
use crate::config::{BuildConfig, DEFAULT_ENTRY};
use crate::io::OffsetTracker;
use crate::project::{Project, ProjectError};
use crate::reporter::Reporter;
use crate::resolver::{ImportMapResolver, ResolveError, Resolver};
use crate::types::{
    Blake3Hash, Manifest, OrderedMap, PackageName, ProvidedSlice, SliceKind, Version,
};
use icepick_schema::frame::{self, FrameError};
use icepick_schema::ManifestError;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("entry point {0} does not exist")]
    MissingEntry(PathBuf),

    #[error("failed to read module {path}: {source}")]
    ModuleFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("installed `{name}@{version}` does not satisfy its declared range `{range}`")]
    SelfInconsistent {
        name: PackageName,
        version: Version,
        range: String,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Manifest and payload of an assembled, not yet framed, bundle.
#[derive(Debug, Clone)]
pub struct AssembledBundle {
    pub manifest: Manifest,
    pub payload: Vec<u8>,
}

impl AssembledBundle {
    /// Frame into artifact bytes.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        frame::encode(&self.manifest, &self.payload)
    }
}

/// Result of [`Assembler::build`].
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub path: PathBuf,
    pub manifest: Manifest,
    pub size: u64,
    pub digest: Blake3Hash,
}

/// Produces bundles from a resolver and a compiler.
#[derive(Clone)]
pub struct Assembler {
    resolver: Arc<dyn Resolver>,
    compiler: Arc<dyn Compiler>,
    packages_dir: PathBuf,
    reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for Assembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembler")
            .field("modules_dir", &self.resolver.modules_dir())
            .field("packages_dir", &self.packages_dir)
            .finish_non_exhaustive()
    }
}

impl Assembler {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        compiler: Arc<dyn Compiler>,
        packages_dir: impl Into<PathBuf>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            resolver,
            compiler,
            packages_dir: packages_dir.into(),
            reporter,
        }
    }

    /// Stock collaborators for a project: the installer's import map and
    /// `esbuild` (explicit path, or located on `PATH`).
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::NotFound`] if no esbuild binary is configured
    /// and none is on `PATH`.
    pub fn from_config(
        config: &BuildConfig,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, BuildError> {
        let compiler = match &config.esbuild {
            Some(path) => EsbuildCompiler::new(config.resolve(path)),
            None => EsbuildCompiler::from_path()?,
        };
        Ok(Self::new(
            Arc::new(ImportMapResolver::new(config.modules_path())),
            Arc::new(compiler),
            config.packages_path(),
            reporter,
        ))
    }

    /// Assemble a bundle for `entry` shipping every declared dependency.
    ///
    /// # Errors
    ///
    /// Fails if any dependency is unresolved or undeclared, a descriptor or
    /// module file cannot be read, the compiler fails, or an installed
    /// version does not satisfy its own declared range.
    pub async fn assemble(
        &self,
        entry: &Path,
        declared: &OrderedMap<PackageName, String>,
    ) -> Result<AssembledBundle, BuildError> {
        let names: Vec<PackageName> = declared.keys().cloned().collect();

        self.reporter.section("Resolving");
        let resolution = self.resolver.resolve(&names).await?;
        let classification =
            classify::classify(declared, &resolution, &self.packages_dir).await?;

        self.reporter.section("Compiling");
        let compiled = self.compiler.compile(entry, &names).await?;

        self.reporter.section("Assembling");
        let modules_dir = self.resolver.modules_dir();
        let mut manifest = Manifest::new();
        let mut tracker = OffsetTracker::new(Vec::new());

        manifest.entry = tracker.append(&compiled)?;
        self.reporter
            .chunk_written(SliceKind::Entry, &manifest.exposes, manifest.entry);

        for chunk in &classification.internal {
            let content = read_module(modules_dir, &chunk.file).await?;
            let length = tracker.append(&content)?;
            self.reporter
                .chunk_written(SliceKind::Internal, &chunk.key, length);
            manifest.internal.insert(chunk.key.clone(), length);
        }

        for package in &classification.provided {
            let content = read_module(modules_dir, &package.file).await?;
            let length = tracker.append(&content)?;
            self.reporter
                .chunk_written(SliceKind::Provided, &package.name, length);
            manifest.provides.insert(
                package.name.clone(),
                ProvidedSlice {
                    version: package.version.clone(),
                    length,
                },
            );
            if let Some(range) = declared.get(package.name.as_str()) {
                manifest.requires.insert(package.name.clone(), range.clone());
            }
        }

        manifest.validate()?;
        for (name, slice, range) in manifest.ranges()? {
            if range.is_any() {
                self.reporter.warning(&format!(
                    "`{name}` accepts any version; any resident instance will be reused"
                ));
            }
            if !range.matches(&slice.version) {
                return Err(BuildError::SelfInconsistent {
                    name: name.clone(),
                    version: slice.version.clone(),
                    range: range.as_str().to_string(),
                });
            }
        }

        tracing::debug!(
            entry = manifest.entry,
            internal = manifest.internal.len(),
            provides = manifest.provides.len(),
            payload = tracker.mark(),
            "assembled bundle"
        );
        Ok(AssembledBundle {
            manifest,
            payload: tracker.into_inner(),
        })
    }

    /// Assemble the project at `config.root` and atomically write the
    /// artifact to its output path.
    ///
    /// Nothing is written unless every step succeeds. A failed rebuild
    /// leaves any artifact from an earlier successful build in place.
    ///
    /// # Errors
    ///
    /// See [`Assembler::assemble`]; additionally fails if `package.json`
    /// cannot be loaded, the entry is missing, or the artifact cannot be
    /// written.
    pub async fn build(&self, config: &BuildConfig) -> Result<BuildOutput, BuildError> {
        let start = Instant::now();
        let project = Project::load(&config.package_json()).await?;

        let entry = config.resolve(
            &config
                .entry
                .clone()
                .or_else(|| project.source.as_deref().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ENTRY)),
        );
        if !fs::try_exists(&entry).await.unwrap_or(false) {
            return Err(BuildError::MissingEntry(entry));
        }

        let bundle = self.assemble(&entry, &project.dependencies).await?;
        let bytes = bundle.encode()?;
        let path = config.output_path();
        write_atomic(&path, &bytes).await?;

        let digest = Blake3Hash::compute(&bytes);
        tracing::info!(path = %path.display(), size = bytes.len(), %digest, "wrote bundle");
        self.reporter.summary(
            &format!(
                "Built {} ({} bytes, {} provided, {} internal)",
                path.display(),
                bytes.len(),
                bundle.manifest.provides.len(),
                bundle.manifest.internal.len()
            ),
            start.elapsed().as_secs_f64(),
        );

        Ok(BuildOutput {
            path,
            manifest: bundle.manifest,
            size: bytes.len() as u64,
            digest,
        })
    }
}

/// Build with the stock collaborators.
///
/// # Errors
///
/// See [`Assembler::from_config`] and [`Assembler::build`].
pub async fn build(
    config: &BuildConfig,
    reporter: Arc<dyn Reporter>,
) -> Result<BuildOutput, BuildError> {
    Assembler::from_config(config, reporter)?.build(config).await
}

async fn read_module(modules_dir: &Path, file: &str) -> Result<Vec<u8>, BuildError> {
    let path = classify::module_path(modules_dir, file)?;
    fs::read(&path)
        .await
        .map_err(|source| BuildError::ModuleFile { path, source })
}

/// Write to a sibling temp file, then rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    let write_err = |source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let result = async {
        fs::write(&temp_path, bytes).await?;
        fs::rename(&temp_path, path).await
    }
    .await;
    if let Err(source) = result {
        let _ = fs::remove_file(&temp_path).await;
        return Err(write_err(source));
    }
    Ok(())
}
