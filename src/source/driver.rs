//! Capture driver boundary
//!
//! The platform binding for physical capture devices lives behind these
//! traits. The local source adapter only ever talks to a device through
//! them, which keeps scheduling and recovery independent of the driver.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::config::VideoConfig;

/// A capture device as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device node path (e.g. "/dev/video0")
    pub path: String,
    /// Human readable device name
    pub name: String,
    /// Kernel driver name (e.g. "uvcvideo")
    pub driver: String,
    /// Whether the node is a capture device (metadata nodes are not)
    pub camera: bool,
}

/// Descriptor of one named device control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlInfo {
    pub name: String,
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub default: i32,
}

/// Platform driver: enumerates and opens capture devices
pub trait DeviceDriver: Send + Sync + 'static {
    /// List the devices currently present
    fn enumerate(&self) -> Vec<DeviceInfo>;

    /// Open the device at `path`
    fn open(&self, path: &str) -> Result<Box<dyn CaptureDevice>>;
}

/// An opened capture device
///
/// `capture` blocks until the next frame is available, so callers run it on
/// the blocking pool.
pub trait CaptureDevice: Send + 'static {
    /// Formats the device can deliver
    fn formats(&self) -> Result<Vec<VideoConfig>>;

    /// Select the capture format
    fn set_format(&mut self, config: &VideoConfig) -> Result<()>;

    /// Start streaming
    fn start(&mut self) -> Result<()>;

    /// Capture one frame
    fn capture(&mut self) -> Result<Bytes>;

    /// Stop streaming and release buffers
    fn stop(&mut self);

    /// Control surface of this device
    ///
    /// The returned handle stays usable while frames are being captured.
    fn controls(&self) -> Arc<dyn DeviceControls>;
}

/// Named hardware controls (zoom, pan, brightness, ...)
///
/// Names are matched case-insensitively.
pub trait DeviceControls: Send + Sync + 'static {
    /// Controls reported by the device
    fn list(&self) -> Vec<ControlInfo>;

    /// Current value of control `name`
    fn get(&self, name: &str) -> Result<i32>;

    /// Write control `name`
    fn set(&self, name: &str, value: i32) -> Result<()>;

    /// Descriptor of control `name`
    fn info(&self, name: &str) -> Option<ControlInfo> {
        self.list()
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}
