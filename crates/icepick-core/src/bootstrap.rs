//! Page bootstrap: load the bundle named by the page's `data-main` attribute.

use std::collections::HashMap;

use thiserror::Error;
use url::Url;

use crate::host::ModuleHost;
use crate::loader::{LoadError, LoadedBundle, Loader};
use crate::registry::Session;

/// Attribute naming the entry bundle URL.
pub const MAIN_ATTRIBUTE: &str = "data-main";

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("invalid data-main URL `{value}`: {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// The slice of a host page the bootstrap reads.
pub trait Page {
    /// Value of the first element attribute called `name`, if any.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Base URL relative attribute values resolve against.
    fn base_url(&self) -> &Url;
}

/// An in-memory page.
#[derive(Debug, Clone)]
pub struct StaticPage {
    base: Url,
    attributes: HashMap<String, String>,
}

impl StaticPage {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

impl Page for StaticPage {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn base_url(&self) -> &Url {
        &self.base
    }
}

/// Resolve the page's entry bundle URL. An absent or empty attribute yields
/// `Ok(None)`.
pub fn entry_url(page: &impl Page) -> Result<Option<Url>, BootstrapError> {
    let Some(value) = page
        .attribute(MAIN_ATTRIBUTE)
        .filter(|v| !v.trim().is_empty())
    else {
        return Ok(None);
    };
    page.base_url()
        .join(value.trim())
        .map(Some)
        .map_err(|source| BootstrapError::InvalidUrl { value, source })
}

/// Load the page's entry bundle, if it names one.
pub async fn bootstrap<H: ModuleHost>(
    page: &impl Page,
    loader: &Loader<H>,
    session: &Session<H::Module>,
) -> Result<Option<LoadedBundle<H::Module>>, BootstrapError> {
    let Some(url) = entry_url(page)? else {
        tracing::debug!("no data-main attribute, nothing to load");
        return Ok(None);
    };
    tracing::info!(%url, "bootstrapping");
    Ok(Some(loader.load(session, &url).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use crate::io::UrlFetcher;
    use crate::reporter::NullReporter;
    use crate::types::{Manifest, PackageName, ProvidedSlice, Version};
    use icepick_schema::frame;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn base() -> Url {
        Url::parse("https://apps.example.com/shell/index.html").unwrap()
    }

    #[test]
    fn resolves_relative_main_against_base() {
        let page = StaticPage::new(base()).with_attribute(MAIN_ATTRIBUTE, "../bundles/app.js");
        assert_eq!(
            entry_url(&page).unwrap().unwrap().as_str(),
            "https://apps.example.com/bundles/app.js"
        );
    }

    #[test]
    fn absent_or_empty_main_is_not_an_error() {
        assert!(entry_url(&StaticPage::new(base())).unwrap().is_none());
        let page = StaticPage::new(base()).with_attribute(MAIN_ATTRIBUTE, "");
        assert!(entry_url(&page).unwrap().is_none());
    }

    #[tokio::test]
    async fn page_without_main_loads_nothing() {
        let host = Arc::new(RecordingHost::new());
        let loader = Loader::new(
            Arc::new(UrlFetcher::new()),
            Arc::clone(&host),
            Arc::new(NullReporter),
        );
        let session = Session::new();

        let loaded = bootstrap(&StaticPage::new(base()), &loader, &session)
            .await
            .unwrap();
        assert!(loaded.is_none());
        assert_eq!(host.total(), 0);
    }

    #[tokio::test]
    async fn loads_the_named_bundle() {
        let dir = TempDir::new().unwrap();
        let entry = b"export default 42;";
        let lib = b"export const pad=s=>s;";
        let mut manifest = Manifest::new();
        manifest.entry = entry.len() as u64;
        manifest.provides.insert(
            PackageName::new("left-pad"),
            ProvidedSlice {
                version: Version::from("1.3.0"),
                length: lib.len() as u64,
            },
        );
        manifest
            .requires
            .insert(PackageName::new("left-pad"), "^1.3.0".to_string());
        let payload = [&entry[..], &lib[..]].concat();
        std::fs::write(
            dir.path().join("bundle.js"),
            frame::encode(&manifest, &payload).unwrap(),
        )
        .unwrap();

        let page = StaticPage::new(Url::from_directory_path(dir.path()).unwrap())
            .with_attribute(MAIN_ATTRIBUTE, "bundle.js");
        let host = Arc::new(RecordingHost::new());
        let loader = Loader::new(
            Arc::new(UrlFetcher::new()),
            Arc::clone(&host),
            Arc::new(NullReporter),
        );
        let session = Session::new();

        let loaded = bootstrap(&page, &loader, &session).await.unwrap().unwrap();
        assert_eq!(loaded.exposes, "./index.js");
        assert_eq!(host.total(), 2);
        assert_eq!(session.resident("left-pad").unwrap().version, "1.3.0");
    }
}
