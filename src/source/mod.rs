//! Video sources
//!
//! A source is anything that can be opened, read as a sequence of frames and
//! closed. Two kinds exist: capture devices on this host and streams proxied
//! from a peer host. The registry and stream actors only see [`Source`].

pub mod config;
pub mod driver;
pub mod local;
pub mod remote;
pub mod synthetic;
#[cfg(feature = "v4l2")]
pub mod v4l2;

use async_trait::async_trait;
use bytes::Bytes;

use crate::control::ControlHandle;
use crate::error::Result;

pub use config::VideoConfig;
pub use driver::{CaptureDevice, ControlInfo, DeviceControls, DeviceDriver, DeviceInfo};
pub use local::LocalCam;
pub use remote::RemoteCam;

/// Capability of a frame source
#[async_trait]
pub trait VideoSource: Send {
    /// Physical path; identifies the source during reconciliation
    fn path(&self) -> &str;

    /// Whether the source is currently open
    fn is_opened(&self) -> bool;

    /// Open with a requested config, returning the config actually granted
    async fn open(&mut self, config: &VideoConfig) -> Result<VideoConfig>;

    /// Read the next frame
    async fn read(&mut self) -> Result<Bytes>;

    /// Release the source. Closing an unopened source does nothing.
    async fn close(&mut self);

    /// Handle for serving control requests while the source streams
    fn control_handle(&self) -> Option<ControlHandle>;
}

/// A local or remote source
pub enum Source {
    Local(LocalCam),
    Remote(RemoteCam),
}

impl Source {
    /// Whether this source is proxied from a peer
    pub fn is_remote(&self) -> bool {
        matches!(self, Source::Remote(_))
    }
}

impl From<LocalCam> for Source {
    fn from(cam: LocalCam) -> Self {
        Source::Local(cam)
    }
}

impl From<RemoteCam> for Source {
    fn from(cam: RemoteCam) -> Self {
        Source::Remote(cam)
    }
}

#[async_trait]
impl VideoSource for Source {
    fn path(&self) -> &str {
        match self {
            Source::Local(cam) => cam.path(),
            Source::Remote(cam) => cam.path(),
        }
    }

    fn is_opened(&self) -> bool {
        match self {
            Source::Local(cam) => cam.is_opened(),
            Source::Remote(cam) => cam.is_opened(),
        }
    }

    async fn open(&mut self, config: &VideoConfig) -> Result<VideoConfig> {
        match self {
            Source::Local(cam) => cam.open(config).await,
            Source::Remote(cam) => cam.open(config).await,
        }
    }

    async fn read(&mut self) -> Result<Bytes> {
        match self {
            Source::Local(cam) => cam.read().await,
            Source::Remote(cam) => cam.read().await,
        }
    }

    async fn close(&mut self) {
        match self {
            Source::Local(cam) => cam.close().await,
            Source::Remote(cam) => cam.close().await,
        }
    }

    fn control_handle(&self) -> Option<ControlHandle> {
        match self {
            Source::Local(cam) => cam.control_handle(),
            Source::Remote(cam) => cam.control_handle(),
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_remote() { "Remote" } else { "Local" };
        f.debug_struct("Source")
            .field("kind", &kind)
            .field("path", &self.path())
            .field("opened", &self.is_opened())
            .finish()
    }
}
