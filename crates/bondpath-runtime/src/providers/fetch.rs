//! Binary retrieval for multimodal calls.
//!
//! Uploaded documents are referenced by location: a local path or, with the
//! `http-fetch` feature, an `http(s)` URL.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

const OCTET_STREAM: &str = "application/octet-stream";

/// Errors from binary retrieval.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download {location}: {message}")]
    Http { location: String, message: String },

    #[error("Unsupported location: {0}")]
    Unsupported(String),
}

/// Bytes plus the media type they were served or stored as.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchedBinary {
    pub data: Vec<u8>,
    pub media_type: String,
}

impl std::fmt::Debug for FetchedBinary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedBinary")
            .field("media_type", &self.media_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Retrieves binary content by location.
#[async_trait]
pub trait BinaryFetch: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<FetchedBinary, FetchError>;
}

/// Default fetcher for local files and, when enabled, HTTP URLs.
#[derive(Debug, Clone, Default)]
pub struct BinaryFetcher {
    #[cfg(feature = "http-fetch")]
    client: reqwest::Client,
}

impl BinaryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_local(&self, location: &str) -> Result<FetchedBinary, FetchError> {
        let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
        let data = tokio::fs::read(path).await.map_err(|source| FetchError::Io {
            location: location.to_string(),
            source,
        })?;
        Ok(FetchedBinary {
            data,
            media_type: guess_media_type(location),
        })
    }

    #[cfg(feature = "http-fetch")]
    async fn download(&self, location: &str) -> Result<FetchedBinary, FetchError> {
        let http_error = |message: String| FetchError::Http {
            location: location.to_string(),
            message,
        };

        let response = self
            .client
            .get(location)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error(e.to_string()))?;

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let data = response
            .bytes()
            .await
            .map_err(|e| http_error(e.to_string()))?
            .to_vec();

        Ok(FetchedBinary {
            data,
            media_type: header_type.unwrap_or_else(|| guess_media_type(location)),
        })
    }

    #[cfg(not(feature = "http-fetch"))]
    async fn download(&self, location: &str) -> Result<FetchedBinary, FetchError> {
        Err(FetchError::Unsupported(format!(
            "{} (HTTP fetching requires the 'http-fetch' feature)",
            location
        )))
    }
}

#[async_trait]
impl BinaryFetch for BinaryFetcher {
    async fn fetch(&self, location: &str) -> Result<FetchedBinary, FetchError> {
        if location.trim().is_empty() {
            return Err(FetchError::Unsupported("empty location".to_string()));
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            self.download(location).await
        } else {
            self.read_local(location).await
        }
    }
}

/// Media type from the path extension, ignoring any query string.
pub fn guess_media_type(location: &str) -> String {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_guess_media_type() {
        assert_eq!(guess_media_type("scan.png"), "image/png");
        assert_eq!(guess_media_type("/docs/id.JPG"), "image/jpeg");
        assert_eq!(guess_media_type("https://x/id.pdf?sig=abc"), "application/pdf");
        assert_eq!(guess_media_type("blob"), OCTET_STREAM);
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&[0x89, 0x50, 0x4e, 0x47]).unwrap();

        let fetched = BinaryFetcher::new()
            .fetch(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(fetched.data, vec![0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(fetched.media_type, "image/png");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.jpg");
        let err = BinaryFetcher::new()
            .fetch(missing.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[tokio::test]
    async fn test_empty_location_rejected() {
        let err = BinaryFetcher::new().fetch("  ").await.unwrap_err();
        assert!(matches!(err, FetchError::Unsupported(_)));
    }
}
