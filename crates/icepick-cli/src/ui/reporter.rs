//! Console implementation of the core [`Reporter`].
//!
//! Progress goes to stderr so command results on stdout stay pipeable.

use crossterm::style::Stylize;
use icepick_core::Reporter;
use icepick_schema::{PackageName, SliceKind, Version};

use super::theme::{format_size, kind_label};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        if !self.quiet {
            eprintln!("{}", title.bold());
        }
    }

    fn chunk_written(&self, kind: SliceKind, name: &str, length: u64) {
        if !self.quiet {
            eprintln!("  {} {name:<40} {}", kind_label(kind), format_size(length).dark_grey());
        }
    }

    fn instantiated(&self, kind: SliceKind, name: &str, length: u64) {
        if !self.quiet {
            eprintln!(
                "  {} {} {name:<40} {}",
                "+".green(),
                kind_label(kind),
                format_size(length).dark_grey()
            );
        }
    }

    fn reused(&self, name: &PackageName, version: &Version) {
        if !self.quiet {
            eprintln!("  {} {} {name}@{version}", "=".cyan(), "resident  ".cyan());
        }
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{msg}");
        }
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {msg}", "warning:".yellow().bold());
    }

    fn summary(&self, msg: &str, elapsed_secs: f64) {
        if !self.quiet {
            eprintln!("{} {msg} in {elapsed_secs:.2}s", "✓".green());
        }
    }
}
