//! Build command

use anyhow::{Context, Result};
use icepick_core::assembler;
use icepick_core::{BuildConfig, Reporter};
use std::sync::Arc;

use crate::ui::ConsoleReporter;
use crate::ui::theme::format_size;

/// Build the project described by `config` into a bundle.
pub async fn build(config: &BuildConfig, quiet: bool) -> Result<()> {
    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new(quiet));
    let out = assembler::build(config, reporter)
        .await
        .with_context(|| format!("Failed to build {}", config.root.display()))?;

    println!(
        "{}  {}  {}",
        out.path.display(),
        format_size(out.size),
        out.digest.short()
    );
    Ok(())
}
