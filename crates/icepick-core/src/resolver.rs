//! Dependency resolution against an installer's output directory.
//!
//! A resolver maps declared dependency names to the single-file ES modules
//! the installer produced for them, and lists the shared chunks those modules
//! import from each other.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{OrderedMap, PackageName};

/// Installer output: which module file each package resolves to, plus the
/// common chunks split out of them.
///
/// Module paths are relative to the modules directory and use `/`
/// separators, optionally prefixed with `./`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub import_map: OrderedMap<PackageName, String>,
    pub common: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("failed to read import map {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse import map {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid common module pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to list common modules: {0}")]
    Glob(#[from] glob::GlobError),
}

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve the given names, in the order given.
    async fn resolve(&self, names: &[PackageName]) -> Result<Resolution, ResolveError>;

    /// Directory that resolved module paths are relative to.
    fn modules_dir(&self) -> &Path;
}

#[derive(Debug, Deserialize)]
struct ImportMapFile {
    #[serde(default)]
    imports: OrderedMap<PackageName, String>,
}

/// Reads a pre-populated installer directory:
/// `<dir>/import-map.json` and `<dir>/common/**/*.js`.
#[derive(Debug, Clone)]
pub struct ImportMapResolver {
    dir: PathBuf,
}

impl ImportMapResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn list_common(&self) -> Result<Vec<String>, ResolveError> {
        let pattern = self.dir.join("common").join("**").join("*.js");
        let mut common = Vec::new();
        for entry in glob::glob(&pattern.to_string_lossy())? {
            let path = entry?;
            if let Ok(rel) = path.strip_prefix(&self.dir) {
                let parts: Vec<_> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect();
                common.push(parts.join("/"));
            }
        }
        common.sort();
        Ok(common)
    }
}

#[async_trait]
impl Resolver for ImportMapResolver {
    async fn resolve(&self, names: &[PackageName]) -> Result<Resolution, ResolveError> {
        let path = self.dir.join("import-map.json");
        let content = tokio::fs::read(&path)
            .await
            .map_err(|source| ResolveError::Io {
                path: path.clone(),
                source,
            })?;
        let map: ImportMapFile = serde_json::from_slice(&content)
            .map_err(|source| ResolveError::Parse { path, source })?;

        // Installer output may cover more packages than this build asked for.
        let import_map = names
            .iter()
            .filter_map(|name| {
                map.imports
                    .get(name.as_str())
                    .map(|file| (name.clone(), file.clone()))
            })
            .collect();

        let common = self.list_common()?;
        tracing::debug!(
            dir = %self.dir.display(),
            common = common.len(),
            "resolved installer output"
        );
        Ok(Resolution { import_map, common })
    }

    fn modules_dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn installer_output() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("import-map.json"),
            r#"{"imports": {
                "react-dom": "./react-dom.js",
                "react": "./react.js",
                "scheduler": "./scheduler.js"
            }}"#,
        )
        .unwrap();
        let common = dir.path().join("common");
        std::fs::create_dir_all(common.join("nested")).unwrap();
        std::fs::write(common.join("index-8a1f.js"), "export{}").unwrap();
        std::fs::write(common.join("nested").join("jsx-2c3d.js"), "export{}").unwrap();
        std::fs::write(common.join("notes.txt"), "ignored").unwrap();
        dir
    }

    #[tokio::test]
    async fn resolves_requested_names_in_request_order() {
        let dir = installer_output();
        let resolver = ImportMapResolver::new(dir.path());
        let names = [PackageName::new("react"), PackageName::new("react-dom")];

        let resolution = resolver.resolve(&names).await.unwrap();
        let resolved: Vec<(&str, &str)> = resolution
            .import_map
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            resolved,
            vec![("react", "./react.js"), ("react-dom", "./react-dom.js")]
        );
        assert_eq!(
            resolution.common,
            vec!["common/index-8a1f.js", "common/nested/jsx-2c3d.js"]
        );
    }

    #[tokio::test]
    async fn unknown_names_are_left_out() {
        let dir = installer_output();
        let resolver = ImportMapResolver::new(dir.path());
        let names = [PackageName::new("react"), PackageName::new("lodash")];

        let resolution = resolver.resolve(&names).await.unwrap();
        assert!(resolution.import_map.contains_key("react"));
        assert!(!resolution.import_map.contains_key("lodash"));
    }

    #[tokio::test]
    async fn missing_import_map_is_an_error() {
        let dir = TempDir::new().unwrap();
        let resolver = ImportMapResolver::new(dir.path());
        let err = resolver.resolve(&[]).await.unwrap_err();
        assert!(matches!(err, ResolveError::Io { .. }));
    }
}
