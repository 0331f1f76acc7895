//! IO modules - side effects (network, filesystem)

pub mod fetch;
pub mod offset;

pub use fetch::{FetchError, Fetcher, UrlFetcher};
pub use offset::OffsetTracker;
