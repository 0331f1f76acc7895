//! Artifact retrieval.
//!
//! `file://` URLs are read from disk; `http(s)://` URLs go through reqwest
//! when the `network` feature is enabled.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[cfg(feature = "network")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported URL scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("`{0}` does not name a local file")]
    InvalidPath(Url),
}

/// Source of artifact bytes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError>;
}

/// Stock fetcher for `file`, `http` and `https` URLs.
#[derive(Debug, Clone, Default)]
pub struct UrlFetcher {
    #[cfg(feature = "network")]
    client: reqwest::Client,
}

impl UrlFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "network")]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_file(&self, url: &Url) -> Result<Bytes, FetchError> {
        let path = url
            .to_file_path()
            .map_err(|()| FetchError::InvalidPath(url.clone()))?;
        tracing::debug!(path = %path.display(), "reading artifact");
        let data = tokio::fs::read(&path)
            .await
            .map_err(|source| FetchError::Io { path, source })?;
        Ok(Bytes::from(data))
    }

    #[cfg(feature = "network")]
    async fn fetch_http(&self, url: &Url) -> Result<Bytes, FetchError> {
        tracing::debug!(%url, "downloading artifact");
        let mut resp = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?
            .error_for_status()?;

        let mut body = bytes::BytesMut::with_capacity(
            resp.content_length().unwrap_or(0).min(64 * 1024 * 1024) as usize,
        );
        while let Some(chunk) = resp.chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

#[async_trait]
impl Fetcher for UrlFetcher {
    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError> {
        match url.scheme() {
            "file" => self.fetch_file(url).await,
            #[cfg(feature = "network")]
            "http" | "https" => self.fetch_http(url).await,
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_file_urls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bundle.js");
        std::fs::write(&path, b"ICPK...").unwrap();

        let url = Url::from_file_path(&path).unwrap();
        let bytes = UrlFetcher::new().fetch(&url).await.unwrap();
        assert_eq!(&bytes[..], b"ICPK...");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let url = Url::from_file_path(dir.path().join("absent.js")).unwrap();
        let err = UrlFetcher::new().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[tokio::test]
    async fn rejects_unknown_schemes() {
        let url = Url::parse("ftp://example.com/bundle.js").unwrap();
        let err = UrlFetcher::new().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[cfg(feature = "network")]
    #[tokio::test]
    async fn downloads_over_http_with_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/apps/shell/bundle.js")
            .match_header("user-agent", crate::USER_AGENT)
            .with_status(200)
            .with_body(b"payload bytes")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/apps/shell/bundle.js", server.url())).unwrap();
        let bytes = UrlFetcher::new().fetch(&url).await.unwrap();

        mock.assert_async().await;
        assert_eq!(&bytes[..], b"payload bytes");
    }

    #[cfg(feature = "network")]
    #[tokio::test]
    async fn http_errors_are_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.js")
            .with_status(404)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/missing.js", server.url())).unwrap();
        let err = UrlFetcher::new().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
    }
}
