//! Registry slot

use std::sync::Arc;

use crate::host::state::{StreamInfo, StreamSummary};
use crate::source::VideoConfig;
use crate::stream::{ActorHandle, StreamEndpoint};

/// One registry slot
///
/// The id and endpoint never change. Path, config and actor are replaced
/// whenever a source is bound to the slot.
#[derive(Debug)]
pub struct StreamEntry {
    /// Slot index
    pub(super) id: usize,

    /// Physical path of the bound source
    pub(super) path: String,

    /// Config granted by the bound source
    pub(super) config: VideoConfig,

    /// Hub, flags and control binding shared with HTTP handlers
    pub(super) endpoint: Arc<StreamEndpoint>,

    /// Actor serving the bound source
    pub(super) actor: Option<ActorHandle>,
}

impl StreamEntry {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn url(&self) -> &str {
        self.endpoint.url()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Arc<StreamEndpoint> {
        &self.endpoint
    }

    pub fn actor(&self) -> Option<&ActorHandle> {
        self.actor.as_ref()
    }

    /// Open while its actor is serving
    pub fn is_open(&self) -> bool {
        self.actor.as_ref().map_or(false, ActorHandle::is_busy)
    }

    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            id: self.id,
            url: self.url().to_string(),
            config: self.config.clone(),
            opened: self.is_open(),
            recording: self.endpoint.is_recording(),
        }
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            id: self.id,
            url: self.url().to_string(),
            config: self.config.clone(),
        }
    }
}
