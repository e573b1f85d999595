use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::FetchError;

/// Downloads the bytes behind a generated image URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// `reqwest`-backed fetcher with a client-wide timeout.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url, "fetching generated image");
        let resp = self.client.get(url).send().await?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }
        debug!(url, bytes = bytes.len(), "image fetched");
        Ok(bytes.to_vec())
    }
}
