pub mod assembler;
pub mod bootstrap;
pub mod classify;
pub mod compiler;
pub mod config;
pub mod host;
pub mod io;
pub mod loader;
pub mod project;
pub mod registry;
pub mod resolver;
pub mod types;

pub mod reporter;

pub use assembler::{AssembledBundle, Assembler, BuildError, BuildOutput};
pub use bootstrap::{BootstrapError, MAIN_ATTRIBUTE, Page, StaticPage, bootstrap};
pub use config::BuildConfig;
pub use host::{HostError, ModuleHost, ModuleUnit, RecordingHost};
pub use loader::{LoadError, LoadPlan, LoadedBundle, Loader, PlanAction, plan};
pub use registry::Session;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("icepick-core/", env!("CARGO_PKG_VERSION"));
