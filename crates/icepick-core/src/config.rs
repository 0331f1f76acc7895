//! Build configuration.
//!
//! All paths are relative to the project root unless given as absolute paths.
//! Defaults follow the layout an esinstall-style installer leaves behind:
//!
//! ```text
//! <root>/
//! ├── package.json     # declared dependencies and version ranges
//! ├── src/index.ts     # application entry
//! ├── node_modules/    # installed packages (version descriptors)
//! ├── web_modules/     # installer output: import-map.json, common/, <pkg>.js
//! └── bundle.js        # the artifact
//! ```

use std::path::{Path, PathBuf};

/// Default application entry point.
pub const DEFAULT_ENTRY: &str = "src/index.ts";
/// Default installer output directory.
pub const DEFAULT_MODULES_DIR: &str = "web_modules";
/// Default installed-packages directory.
pub const DEFAULT_PACKAGES_DIR: &str = "node_modules";
/// Default artifact path.
pub const DEFAULT_OUTPUT: &str = "bundle.js";

/// Settings for a single bundle build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root containing `package.json`.
    pub root: PathBuf,
    /// Entry override; falls back to `package.json`'s `source`, then [`DEFAULT_ENTRY`].
    pub entry: Option<PathBuf>,
    /// Installer output directory.
    pub modules_dir: PathBuf,
    /// Installed packages directory.
    pub packages_dir: PathBuf,
    /// Artifact path.
    pub output: PathBuf,
    /// Explicit esbuild binary; located on `PATH` when unset.
    pub esbuild: Option<PathBuf>,
}

impl BuildConfig {
    /// Configuration with default paths for the given project root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entry: None,
            modules_dir: PathBuf::from(DEFAULT_MODULES_DIR),
            packages_dir: PathBuf::from(DEFAULT_PACKAGES_DIR),
            output: PathBuf::from(DEFAULT_OUTPUT),
            esbuild: None,
        }
    }

    /// `<root>/package.json`
    pub fn package_json(&self) -> PathBuf {
        self.root.join("package.json")
    }

    /// Absolute installer output directory.
    pub fn modules_path(&self) -> PathBuf {
        self.resolve(&self.modules_dir)
    }

    /// Absolute installed packages directory.
    pub fn packages_path(&self) -> PathBuf {
        self.resolve(&self.packages_dir)
    }

    /// Absolute artifact path.
    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output)
    }

    /// Resolve a possibly-relative path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
