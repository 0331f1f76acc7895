//! Terminal output.

pub mod reporter;
pub mod theme;

pub use reporter::ConsoleReporter;
