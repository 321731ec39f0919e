use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Image request failed with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("Client error: {0}")]
    ClientError(String),
}

/// Retrieves the raw bytes of a source image from the remote store.
///
/// `authorization` is the caller's `Authorization` header value, forwarded as-is.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &str, authorization: Option<&str>) -> Result<Vec<u8>, FetchError>;
}

/// Fetches sources over HTTP from `host_url` joined with the source identifier.
pub struct HttpSourceFetcher {
    client: Client,
    host_url: String,
}

impl HttpSourceFetcher {
    pub fn new(host_url: impl Into<String>, timeout: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| FetchError::ClientError(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            host_url: host_url.into(),
        })
    }

    pub fn source_url(&self, source: &str) -> String {
        format!("{}{}", self.host_url, source)
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, source: &str, authorization: Option<&str>) -> Result<Vec<u8>, FetchError> {
        let url = self.source_url(source);

        let mut request = self.client.get(&url).header("Accept", "image/*,*/*;q=0.8");
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("Source request for {} failed with status: {}", url, status);
            return Err(FetchError::UpstreamStatus(status));
        }

        let bytes = response.bytes().await?;
        log::debug!("Fetched {} bytes from {}", bytes.len(), url);

        Ok(bytes.to_vec())
    }
}
