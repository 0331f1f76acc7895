//! icepick - federated single-file module bundles
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Builds a self-describing bundle of an application and its third-party
//! modules, and loads such bundles into a session that shares dependencies
//! across independently built applications.
//!
//! # Artifact Layout
//!
//! ```text
//! ICPK | format version | header length | manifest (JSON) | payload
//!                                                            ├── entry (./index.js)
//!                                                            ├── internal chunks
//!                                                            └── provided packages
//! ```

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand};
use icepick_core::config::{DEFAULT_MODULES_DIR, DEFAULT_OUTPUT, DEFAULT_PACKAGES_DIR};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "icepick")]
#[command(author, version, about = "icepick - federated single-file module bundles")]
pub struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build a bundle from package.json and installer output
    Build {
        /// Project root containing package.json
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Application entry point (defaults to package.json `source`, then src/index.ts)
        #[arg(long, env = "ICEPICK_ENTRY")]
        entry: Option<PathBuf>,
        /// Installer output directory with import-map.json and common/
        #[arg(long, env = "ICEPICK_MODULES_DIR", default_value = DEFAULT_MODULES_DIR)]
        modules_dir: PathBuf,
        /// Installed packages directory holding version descriptors
        #[arg(long, env = "ICEPICK_PACKAGES_DIR", default_value = DEFAULT_PACKAGES_DIR)]
        packages_dir: PathBuf,
        /// Artifact path, relative to the project root
        #[arg(short, long, env = "ICEPICK_OUTPUT", default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        /// esbuild binary (located on PATH when omitted)
        #[arg(long, env = "ICEPICK_ESBUILD")]
        esbuild: Option<PathBuf>,
    },
    /// Show the manifest and slice layout of a bundle
    Inspect {
        /// Bundle file
        artifact: PathBuf,
    },
    /// Show which provided packages a load would reuse or instantiate
    Plan {
        /// Bundle file
        artifact: PathBuf,
        /// Already-loaded package: name@version (repeatable)
        #[arg(long = "resident", value_name = "NAME@VERSION")]
        residents: Vec<String>,
    },
    /// Load one or more bundles into a single session (dry run, nothing is evaluated)
    Load {
        /// Bundle URLs, absolute or relative to --base
        #[arg(required = true)]
        urls: Vec<String>,
        /// Base URL (defaults to the current directory)
        #[arg(long)]
        base: Option<String>,
    },
}
