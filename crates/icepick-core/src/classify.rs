//! Dependency classification.
//!
//! Every declared dependency must resolve to a module file through the import
//! map; those become *provided* slices that a loader may skip. Common chunks
//! that no import-map entry points at become *internal* slices, always
//! instantiated. The application entry is never classified.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::project::{self, ProjectError};
use crate::resolver::Resolution;
use crate::types::{OrderedMap, PackageName, Version};

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("dependency `{0}` has no entry in the import map")]
    Unresolved(PackageName),

    #[error("import map entry `{0}` is not a declared dependency")]
    Undeclared(PackageName),

    #[error("module path `{0}` leaves the modules directory")]
    OutsideModules(String),

    #[error("cannot read the installed version of `{name}`: {source}")]
    Descriptor {
        name: PackageName,
        #[source]
        source: ProjectError,
    },
}

/// A common chunk that ships unconditionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalChunk {
    /// Manifest key, `./`-prefixed.
    pub key: String,
    /// Path relative to the modules directory.
    pub file: String,
}

/// A declared dependency's module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidedModule {
    pub name: PackageName,
    pub file: String,
}

/// [`ProvidedModule`] plus the concrete installed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidedPackage {
    pub name: PackageName,
    pub file: String,
    pub version: Version,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub internal: Vec<InternalChunk>,
    pub provided: Vec<ProvidedModule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub internal: Vec<InternalChunk>,
    pub provided: Vec<ProvidedPackage>,
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches("./")
}

/// Split resolver output into provided modules (declaration order) and
/// internal chunks (common-set order).
pub fn partition(
    declared: &OrderedMap<PackageName, String>,
    resolution: &Resolution,
) -> Result<Partition, ClassifyError> {
    if let Some(extra) = resolution
        .import_map
        .keys()
        .find(|name| !declared.contains_key(name.as_str()))
    {
        return Err(ClassifyError::Undeclared(extra.clone()));
    }

    if let Some(path) = resolution
        .import_map
        .values()
        .chain(&resolution.common)
        .find(|path| !is_contained(path))
    {
        return Err(ClassifyError::OutsideModules(path.to_string()));
    }

    let provided = declared
        .keys()
        .map(|name| {
            resolution
                .import_map
                .get(name.as_str())
                .map(|file| ProvidedModule {
                    name: name.clone(),
                    file: normalize(file).to_string(),
                })
                .ok_or_else(|| ClassifyError::Unresolved(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let internal = resolution
        .common
        .iter()
        .map(String::as_str)
        .map(normalize)
        .filter(|path| !provided.iter().any(|p| p.file == *path))
        .map(|path| InternalChunk {
            key: format!("./{path}"),
            file: path.to_string(),
        })
        .collect();

    Ok(Partition { internal, provided })
}

/// [`partition`], then read each provided package's version from
/// `<packages_dir>/<name>/package.json`.
pub async fn classify(
    declared: &OrderedMap<PackageName, String>,
    resolution: &Resolution,
    packages_dir: &Path,
) -> Result<Classification, ClassifyError> {
    let Partition { internal, provided } = partition(declared, resolution)?;

    let mut packages = Vec::with_capacity(provided.len());
    for module in provided {
        let version = project::installed_version(packages_dir, &module.name)
            .await
            .map_err(|source| ClassifyError::Descriptor {
                name: module.name.clone(),
                source,
            })?;
        tracing::debug!(name = %module.name, %version, file = %module.file, "provided");
        packages.push(ProvidedPackage {
            name: module.name,
            file: module.file,
            version,
        });
    }

    Ok(Classification {
        internal,
        provided: packages,
    })
}

fn is_contained(file: &str) -> bool {
    !file.starts_with('/')
        && !file.contains('\\')
        && file.split('/').all(|part| part != "..")
}

/// Absolute path of a module file inside the modules directory.
///
/// # Errors
///
/// Returns [`ClassifyError::OutsideModules`] for absolute paths and paths
/// with `..` segments.
pub fn module_path(modules_dir: &Path, file: &str) -> Result<PathBuf, ClassifyError> {
    if !is_contained(file) {
        return Err(ClassifyError::OutsideModules(file.to_string()));
    }
    Ok(file
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .fold(modules_dir.to_path_buf(), |acc, part| acc.join(part)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn declared(pairs: &[(&str, &str)]) -> OrderedMap<PackageName, String> {
        pairs
            .iter()
            .map(|(n, r)| (PackageName::new(n), r.to_string()))
            .collect()
    }

    fn resolution(map: &[(&str, &str)], common: &[&str]) -> Resolution {
        Resolution {
            import_map: map
                .iter()
                .map(|(n, f)| (PackageName::new(n), f.to_string()))
                .collect(),
            common: common.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn import_map_names_are_provided_and_common_chunks_internal() {
        let deps = declared(&[("react", "^18.0.0"), ("react-dom", "^18.0.0")]);
        let res = resolution(
            &[("react-dom", "./react-dom.js"), ("react", "./react.js")],
            &["common/index-8a1f.js", "./common/jsx-2c3d.js"],
        );

        let part = partition(&deps, &res).unwrap();
        let names: Vec<&str> = part.provided.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["react", "react-dom"], "declaration order wins");
        assert_eq!(part.provided[0].file, "react.js");

        let keys: Vec<&str> = part.internal.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["./common/index-8a1f.js", "./common/jsx-2c3d.js"]);
    }

    #[test]
    fn common_paths_targeted_by_the_import_map_are_not_internal() {
        let deps = declared(&[("lodash", "^4.0.0")]);
        let res = resolution(
            &[("lodash", "./common/lodash-77aa.js")],
            &["common/lodash-77aa.js", "common/shared.js"],
        );

        let part = partition(&deps, &res).unwrap();
        assert_eq!(part.internal.len(), 1);
        assert_eq!(part.internal[0].file, "common/shared.js");
    }

    #[test]
    fn declared_name_missing_from_import_map_is_unresolved() {
        let deps = declared(&[("react", "^18.0.0"), ("left-pad", "^1.3.0")]);
        let res = resolution(&[("react", "./react.js")], &[]);

        let err = partition(&deps, &res).unwrap_err();
        assert!(matches!(err, ClassifyError::Unresolved(n) if n == "left-pad"));
    }

    #[test]
    fn import_map_name_not_declared_is_rejected() {
        let deps = declared(&[("react", "^18.0.0")]);
        let res = resolution(
            &[("react", "./react.js"), ("scheduler", "./scheduler.js")],
            &[],
        );

        let err = partition(&deps, &res).unwrap_err();
        assert!(matches!(err, ClassifyError::Undeclared(n) if n == "scheduler"));
    }

    #[tokio::test]
    async fn versions_come_from_installed_descriptors() {
        let packages = TempDir::new().unwrap();
        let react = packages.path().join("react");
        std::fs::create_dir_all(&react).unwrap();
        std::fs::write(react.join("package.json"), r#"{"version":"18.2.0"}"#).unwrap();

        let deps = declared(&[("react", "^18.0.0")]);
        let res = resolution(&[("react", "./react.js")], &[]);
        let classified = classify(&deps, &res, packages.path()).await.unwrap();

        assert_eq!(classified.provided[0].version, "18.2.0");
    }

    #[tokio::test]
    async fn missing_descriptor_is_fatal() {
        let packages = TempDir::new().unwrap();
        let deps = declared(&[("react", "^18.0.0")]);
        let res = resolution(&[("react", "./react.js")], &[]);

        let err = classify(&deps, &res, packages.path()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Descriptor { name, .. } if name == "react"));
    }

    #[test]
    fn module_paths_stay_inside_the_modules_dir() {
        let dir = Path::new("/app/web_modules");
        assert_eq!(
            module_path(dir, "./common//index.js").unwrap(),
            PathBuf::from("/app/web_modules/common/index.js")
        );
        for escape in ["../../etc/passwd", "common/../../secret.js", "/etc/passwd"] {
            assert!(matches!(
                module_path(dir, escape),
                Err(ClassifyError::OutsideModules(p)) if p == escape
            ));
        }
    }

    #[test]
    fn import_map_targets_outside_the_modules_dir_are_rejected() {
        let deps = declared(&[("react", "^18.0.0")]);
        let res = resolution(&[("react", "../../etc/passwd")], &[]);
        let err = partition(&deps, &res).unwrap_err();
        assert!(matches!(err, ClassifyError::OutsideModules(p) if p == "../../etc/passwd"));

        let res = resolution(&[("react", "./react.js")], &["common/../../x.js"]);
        let err = partition(&deps, &res).unwrap_err();
        assert!(matches!(err, ClassifyError::OutsideModules(_)));
    }
}
