//! Remote MJPEG source: a stream served by a peer host

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::header::CONTENT_TYPE;

use crate::client::RemoteRelay;
use crate::control::ControlHandle;
use crate::error::{Error, Result};
use crate::media::multipart::{self, MultipartReader};

use super::config::VideoConfig;
use super::VideoSource;

/// Driver identifier reported for proxied streams
pub const REMOTE_DRIVER: &str = "remote";

/// Default bound on waiting for a peer's response headers
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Proxy for one stream of a peer host
///
/// The path is the full stream URL on the peer, e.g.
/// `http://10.0.0.7:9000/video0`. Control requests are relayed to the
/// same URL.
pub struct RemoteCam {
    path: String,
    client: reqwest::Client,
    reader: Option<MultipartReader<ByteStream>>,
    config: VideoConfig,
    open_timeout: Duration,
}

impl RemoteCam {
    /// Create an unopened proxy for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, default_client())
    }

    /// Create a proxy sharing an existing HTTP client
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            path: url.into(),
            client,
            reader: None,
            config: VideoConfig::default(),
            open_timeout: OPEN_TIMEOUT,
        }
    }

    /// Bound the wait for the peer's response headers
    ///
    /// The frame body that follows is streamed without a deadline.
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Config granted by the last successful open
    pub fn config(&self) -> &VideoConfig {
        &self.config
    }
}

/// Client for long-lived frame streams: no overall timeout, only connect
pub(crate) fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl VideoSource for RemoteCam {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_opened(&self) -> bool {
        self.reader.is_some()
    }

    async fn open(&mut self, config: &VideoConfig) -> Result<VideoConfig> {
        self.reader = None;

        let request = self.client.get(&self.path).send();
        let response = match tokio::time::timeout(self.open_timeout, request).await {
            Ok(response) => response.map_err(|e| Error::open(&self.path, e))?,
            Err(_) => {
                return Err(Error::open(
                    &self.path,
                    format!("no response within {:?}", self.open_timeout),
                ))
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::open(&self.path, format!("HTTP {}", status)));
        }
        // An origin with a closed source answers 204 with no body
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(Error::open(&self.path, "origin stream not open"));
        }

        let boundary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(multipart::boundary_from_content_type)
            .unwrap_or_else(|| multipart::BOUNDARY.to_string());

        let body: ByteStream = Box::pin(response.bytes_stream());
        self.reader = Some(MultipartReader::new(body, &boundary, self.path.clone()));

        let mut granted = config.clone().with_path(&self.path);
        if granted.driver.is_empty() {
            granted.driver = REMOTE_DRIVER.to_string();
        }
        tracing::info!(path = %self.path, boundary = %boundary, "Opened remote stream");

        self.config = granted.clone();
        Ok(granted)
    }

    async fn read(&mut self) -> Result<Bytes> {
        match self.reader.as_mut() {
            Some(reader) => reader.next_frame().await,
            None => Err(Error::NotOpen(self.path.clone())),
        }
    }

    async fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::info!(path = %self.path, "Closed remote stream");
        }
    }

    fn control_handle(&self) -> Option<ControlHandle> {
        Some(ControlHandle::Remote(RemoteRelay::new(
            self.path.clone(),
            self.client.clone(),
        )))
    }
}
