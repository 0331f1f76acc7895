//! Application entry compilation.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

use crate::types::PackageName;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("'esbuild' not found on PATH. Install it with: npm install -g esbuild")]
    NotFound,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compiling {entry} failed: {stderr}")]
    Failed { entry: PathBuf, stderr: String },
}

/// Turns an entry point into a single ES module, leaving `externals` as bare
/// imports.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, entry: &Path, externals: &[PackageName])
    -> Result<Bytes, CompileError>;
}

/// Runs the `esbuild` binary and captures the bundle from stdout.
#[derive(Debug, Clone)]
pub struct EsbuildCompiler {
    program: PathBuf,
}

impl EsbuildCompiler {
    /// Use an explicit binary.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate `esbuild` on `PATH`.
    pub fn from_path() -> Result<Self, CompileError> {
        which::which("esbuild")
            .map(Self::new)
            .map_err(|_| CompileError::NotFound)
    }
}

/// Command-line arguments for bundling `entry` as minified ESM.
pub fn esbuild_args(entry: &Path, externals: &[PackageName]) -> Vec<String> {
    let mut args = vec![
        entry.to_string_lossy().into_owned(),
        "--bundle".to_string(),
        "--format=esm".to_string(),
        "--minify".to_string(),
        "--log-level=error".to_string(),
    ];
    args.extend(externals.iter().map(|name| format!("--external:{name}")));
    args
}

#[async_trait]
impl Compiler for EsbuildCompiler {
    async fn compile(
        &self,
        entry: &Path,
        externals: &[PackageName],
    ) -> Result<Bytes, CompileError> {
        tracing::debug!(
            program = %self.program.display(),
            entry = %entry.display(),
            externals = externals.len(),
            "compiling entry"
        );
        let output = Command::new(&self.program)
            .args(esbuild_args(entry, externals))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CompileError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CompileError::Failed {
                entry: entry.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(Bytes::from(output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_declared_dependency_is_external() {
        let externals = [PackageName::new("react"), PackageName::new("@emotion/css")];
        let args = esbuild_args(Path::new("/app/src/index.ts"), &externals);

        assert_eq!(args[0], "/app/src/index.ts");
        assert!(args.contains(&"--bundle".to_string()));
        assert!(args.contains(&"--format=esm".to_string()));
        assert!(args.contains(&"--minify".to_string()));
        assert!(args.contains(&"--external:react".to_string()));
        assert!(args.contains(&"--external:@emotion/css".to_string()));
    }

    #[tokio::test]
    async fn missing_binary_fails_to_spawn() {
        let compiler = EsbuildCompiler::new("/nonexistent/esbuild");
        let err = compiler
            .compile(Path::new("src/index.ts"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }
}
