//! Published host state (`GET /host`)
//!
//! ```json
//! {
//!   "url": "http://10.0.0.7:9000",
//!   "streams": [{"id": 0, "url": "/video0", "config": {...}}],
//!   "remotes": ["10.0.0.8:9000"],
//!   "interval": 60000
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::source::VideoConfig;

/// One stream as published to peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub id: usize,
    pub url: String,
    #[serde(default)]
    pub config: VideoConfig,
}

/// A host's published state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostState {
    /// Base URL of the host, e.g. "http://10.0.0.7:9000"
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
    #[serde(default)]
    pub remotes: Vec<String>,
    /// Scan interval in milliseconds
    #[serde(default)]
    pub interval: u64,
}

/// Registry view of one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub id: usize,
    pub url: String,
    pub config: VideoConfig,
    /// Whether an actor is serving the slot
    pub opened: bool,
    pub recording: bool,
}

impl From<&StreamSummary> for StreamInfo {
    fn from(summary: &StreamSummary) -> Self {
        Self {
            id: summary.id,
            url: summary.url.clone(),
            config: summary.config.clone(),
        }
    }
}
