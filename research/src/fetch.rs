use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Plain HTTP GET with redirect following and a bounded timeout. A 2xx
/// status is required; anything else is a provider failure the caller can
/// report per URL.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("research-agent/0.1")
            .build()
            .map_err(|e| Error::Provider(format!("failed to build http client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Provider("timeout".to_string())
            } else {
                Error::Provider(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider(format!("HTTP {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Provider(format!("failed to read body: {e}")))?;

        Ok(bytes.to_vec())
    }
}
