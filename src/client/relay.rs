//! Control relay to an origin host

use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Forwards control sub-paths to a stream URL on its origin host
#[derive(Debug, Clone)]
pub struct RemoteRelay {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RemoteRelay {
    /// Relay for the stream at `url` (e.g. `http://10.0.0.7:9000/video0`)
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            timeout: Duration::from_secs(5),
        }
    }

    /// Origin stream URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET `{url}{sub_path}` on the origin and return its body verbatim
    pub async fn forward(&self, sub_path: &str) -> Result<Bytes> {
        let target = format!("{}{}", self.url, sub_path);
        tracing::debug!(url = %target, "Relaying control request");

        let response = self
            .client
            .get(&target)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::control(
                sub_path,
                format!("origin answered {}", response.status()),
            ));
        }
        Ok(response.bytes().await?)
    }
}
