//! Client for services that link to or clear thumbnails of their own images.
//!
//! ```no_run
//! # use thumbcache::client::{ClientConfig, ThumbnailClient};
//! # async fn demo() -> Result<(), thumbcache::client::ClientError> {
//! let client = ThumbnailClient::new(ClientConfig {
//!     thumbnail_service_host: "https://example.org/thumbnailservice".into(),
//!     thumbnail_url_pattern: "datastore/api/Media/{0}/File".into(),
//! })?;
//!
//! // https://example.org/thumbnailservice/api/thumbnails?url=datastore%2Fapi%2FMedia%2F42%2FFile
//! let url = client.thumbnail_url(&["42"])?;
//! client.try_clear_cache(&["42"], Some("Bearer token")).await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid thumbnail service URL: {0}")]
    InvalidUrl(String),

    #[error("Thumbnail service responded with status: {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClientConfig {
    /// Base URL of a running thumbnail service, without the `/api/...` suffix.
    pub thumbnail_service_host: String,
    /// Source identifier pattern with `{0}`, `{1}`... placeholders, e.g. `datastore/api/Media/{0}/File`.
    pub thumbnail_url_pattern: String,
}

pub struct ThumbnailClient {
    config: ClientConfig,
    http: Client,
}

impl ThumbnailClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { config, http })
    }

    /// The source identifier for `args`, i.e. the pattern with its placeholders filled in.
    pub fn url_argument(&self, args: &[&str]) -> String {
        args.iter()
            .enumerate()
            .fold(self.config.thumbnail_url_pattern.clone(), |url, (i, arg)| {
                url.replace(&format!("{{{}}}", i), arg)
            })
    }

    fn endpoint(&self) -> Result<Url, ClientError> {
        let host = self.config.thumbnail_service_host.trim_end_matches('/');
        Url::parse(&format!("{}/api/thumbnails", host))
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", host, e)))
    }

    /// Absolute URL that serves the original image for `args` through the thumbnail service.
    /// Append `size`, `mode` or `format` query parameters for derivatives.
    pub fn thumbnail_url(&self, args: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.endpoint()?;
        url.query_pairs_mut().append_pair("url", &self.url_argument(args));
        Ok(url)
    }

    /// Delete every cached thumbnail of the image for `args`.
    pub async fn clear_cache(&self, args: &[&str], authorization: Option<&str>) -> Result<(), ClientError> {
        let url = self.thumbnail_url(args)?;
        let mut request = self.http.delete(url);
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(())
    }

    /// Like [`clear_cache`](Self::clear_cache), but never fails: returns `false` when the
    /// client is not configured or the request failed. Failures are logged as warnings since
    /// the thumbnail service might keep serving outdated images.
    pub async fn try_clear_cache(&self, args: &[&str], authorization: Option<&str>) -> bool {
        if self.config.thumbnail_url_pattern.trim().is_empty()
            || self.config.thumbnail_service_host.trim().is_empty()
        {
            return false;
        }

        match self.clear_cache(args, authorization).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "Request to clear thumbnail cache failed for '{}'; thumbnail service might return outdated images: {}",
                    self.url_argument(args),
                    e
                );
                false
            }
        }
    }
}
