//! Application manifest (`package.json`) and installed package descriptors.
//!
//! Only the fields the bundler needs are read: the declared dependencies
//! (name -> version range, in declaration order) and an optional `source`
//! entry. Installed packages contribute nothing but their `version`.

use crate::types::{OrderedMap, PackageName, Version};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors that can occur when loading a `package.json`.
#[derive(Error, Debug)]
pub enum ProjectError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JSON content could not be deserialized.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A package descriptor has no `version` field.
    #[error("{path} has no `version` field")]
    MissingVersion { path: PathBuf },

    /// The name cannot address a directory inside the packages directory.
    #[error("`{0}` is not a valid package name")]
    InvalidName(PackageName),
}

/// The subset of an application's `package.json` used for bundling.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    /// Optional entry point, relative to the project root.
    #[serde(default)]
    pub source: Option<String>,
    /// Dependency name -> requested version range, in declaration order.
    #[serde(default)]
    pub dependencies: OrderedMap<PackageName, String>,
}

impl Project {
    /// Asynchronously load and parse a `package.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub async fn load(path: &Path) -> Result<Self, ProjectError> {
        read_json(path).await
    }
}

#[derive(Debug, Deserialize)]
struct PackageDescriptor {
    #[serde(default)]
    version: Option<String>,
}

/// Read the concrete version of an installed package from
/// `<packages_dir>/<name>/package.json`.
///
/// # Errors
///
/// Returns an error if the name is not a valid package name, or the
/// descriptor is missing, unparseable, or has no non-empty `version`.
pub async fn installed_version(
    packages_dir: &Path,
    name: &PackageName,
) -> Result<Version, ProjectError> {
    if !name.is_valid() {
        return Err(ProjectError::InvalidName(name.clone()));
    }
    let path = packages_dir.join(name).join("package.json");
    let descriptor: PackageDescriptor = read_json(&path).await?;
    descriptor
        .version
        .filter(|v| !v.trim().is_empty())
        .map(Version::from)
        .ok_or(ProjectError::MissingVersion { path })
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ProjectError> {
    let content = fs::read(path).await.map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&content).map_err(|source| ProjectError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn dependencies_keep_declaration_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("package.json");
        std::fs::write(
            &path,
            r#"{
                "name": "shell",
                "dependencies": {
                    "react-dom": "^18.2.0",
                    "react": "^18.0.0",
                    "@emotion/css": "11.x"
                },
                "devDependencies": { "typescript": "^5" }
            }"#,
        )
        .unwrap();

        let project = Project::load(&path).await.unwrap();
        let names: Vec<&str> = project.dependencies.keys().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["react-dom", "react", "@emotion/css"]);
        assert_eq!(project.dependencies.get("react").unwrap(), "^18.0.0");
        assert!(project.source.is_none());
    }

    #[tokio::test]
    async fn scoped_package_versions_are_read_from_descriptors() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("@emotion").join("css");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(
            pkg.join("package.json"),
            r#"{"name":"@emotion/css","version":"11.11.2"}"#,
        )
        .unwrap();

        let version = installed_version(dir.path(), &PackageName::new("@emotion/css"))
            .await
            .unwrap();
        assert_eq!(version, "11.11.2");
    }

    #[tokio::test]
    async fn descriptor_without_version_is_an_error() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("left-pad");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("package.json"), r#"{"name":"left-pad"}"#).unwrap();

        let err = installed_version(dir.path(), &PackageName::new("left-pad"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::MissingVersion { .. }));
    }

    #[tokio::test]
    async fn names_cannot_leave_the_packages_dir() {
        let dir = TempDir::new().unwrap();
        let packages = dir.path().join("node_modules");
        std::fs::create_dir_all(&packages).unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"version":"6.6.6"}"#).unwrap();

        let err = installed_version(&packages, &PackageName::new("@x/.."))
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::InvalidName(n) if n == "@x/.."));
    }
}
