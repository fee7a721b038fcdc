//! Federation client: reads a peer's published host state

use std::time::Duration;

use crate::error::{Error, Result};
use crate::host::state::HostState;
use crate::source::{RemoteCam, VideoConfig};

/// Prefix `http://` when `addr` carries no scheme, and drop a trailing slash
pub fn normalize_base(addr: &str) -> String {
    let addr = addr.trim().trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

/// Fetches `/host` documents from peer hosts
#[derive(Debug, Clone)]
pub struct FederationClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl FederationClient {
    /// Create a client; each fetch, and each proxy's wait for a peer's
    /// stream headers, is bounded by `timeout`
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Underlying HTTP client, shared with proxied sources
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch and fully parse the state of the peer at `remote`
    pub async fn fetch(&self, remote: &str) -> Result<HostState> {
        let url = format!("{}/host", normalize_base(remote));

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Malformed(format!(
                "{} answered {}",
                url,
                response.status()
            )));
        }

        let body = response.bytes().await?;
        let state: HostState = serde_json::from_slice(&body)?;
        Ok(state)
    }

    /// Unopened proxies for every stream the peer at `remote` publishes
    ///
    /// Each candidate carries the config the peer reported, to be used as
    /// the open request.
    pub async fn candidates(&self, remote: &str) -> Result<Vec<(RemoteCam, VideoConfig)>> {
        let state = self.fetch(remote).await?;
        let base = normalize_base(remote);

        Ok(state
            .streams
            .into_iter()
            .map(|stream| {
                let cam = RemoteCam::with_client(format!("{}{}", base, stream.url), self.client.clone())
                    .with_open_timeout(self.timeout);
                (cam, stream.config)
            })
            .collect())
    }
}

impl Default for FederationClient {
    fn default() -> Self {
        Self::new(crate::source::remote::default_client(), Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base() {
        assert_eq!(normalize_base("10.0.0.7:9000"), "http://10.0.0.7:9000");
        assert_eq!(normalize_base("http://10.0.0.7:9000/"), "http://10.0.0.7:9000");
        assert_eq!(normalize_base("https://cams.local"), "https://cams.local");
    }

    #[tokio::test]
    async fn test_fetch_unreachable() {
        let client = FederationClient::new(reqwest::Client::new(), Duration::from_millis(500));
        assert!(client.fetch("127.0.0.1:9").await.is_err());
    }
}
