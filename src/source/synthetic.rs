//! In-memory capture driver
//!
//! Synthetic cameras that produce small JPEG-framed payloads at their frame
//! rate and expose a settable control surface. Used for tests, demos and
//! hosts without capture hardware. Failures can be injected per camera.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;

use crate::error::{Error, Result};

use super::config::VideoConfig;
use super::driver::{CaptureDevice, ControlInfo, DeviceControls, DeviceDriver, DeviceInfo};

/// Driver name reported by synthetic cameras
pub const SYNTHETIC_DRIVER: &str = "uvcvideo";

/// Control values of one synthetic camera
#[derive(Debug, Default)]
pub struct SyntheticControls {
    controls: Mutex<Vec<(ControlInfo, i32)>>,
}

impl SyntheticControls {
    /// Add (or replace) a control with its current value
    pub fn insert(&self, info: ControlInfo, value: i32) {
        let mut controls = self.controls.lock();
        controls.retain(|(c, _)| !c.name.eq_ignore_ascii_case(&info.name));
        controls.push((info, value));
    }
}

impl DeviceControls for SyntheticControls {
    fn list(&self) -> Vec<ControlInfo> {
        self.controls.lock().iter().map(|(c, _)| c.clone()).collect()
    }

    fn get(&self, name: &str) -> Result<i32> {
        self.controls
            .lock()
            .iter()
            .find(|(c, _)| c.name.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
            .ok_or_else(|| Error::UnknownControl(name.to_string()))
    }

    fn set(&self, name: &str, value: i32) -> Result<()> {
        let mut controls = self.controls.lock();
        let (info, current) = controls
            .iter_mut()
            .find(|(c, _)| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownControl(name.to_string()))?;

        if value < info.min || value > info.max {
            return Err(Error::control(name, format!("{} out of range", value)));
        }
        *current = value;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CameraState {
    fail_reads: AtomicU32,
    fail_open: AtomicBool,
    gone: AtomicBool,
    frames: AtomicU64,
    opens: AtomicU32,
}

/// One synthetic camera
///
/// Cloning yields another handle to the same camera, so a test can keep a
/// handle and inject failures after the driver has opened it.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    info: DeviceInfo,
    formats: Vec<VideoConfig>,
    controls: Arc<SyntheticControls>,
    state: Arc<CameraState>,
}

impl SyntheticCamera {
    /// Create a camera at `path` with the usual UVC formats and controls
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let controls = Arc::new(SyntheticControls::default());
        for (name, min, max, step, default) in [
            ("Zoom, Absolute", 0, 100, 10, 50),
            ("Pan, Absolute", -36000, 36000, 3600, 0),
            ("Tilt, Absolute", -36000, 36000, 3600, 0),
            ("Brightness", 0, 255, 1, 128),
            ("Contrast", 0, 255, 1, 128),
            ("Saturation", 0, 255, 1, 128),
        ] {
            controls.insert(
                ControlInfo {
                    name: name.to_string(),
                    min,
                    max,
                    step,
                    default,
                },
                default,
            );
        }

        Self {
            info: DeviceInfo {
                name: format!("Synthetic Camera {}", path),
                path,
                driver: SYNTHETIC_DRIVER.to_string(),
                camera: true,
            },
            formats: vec![
                VideoConfig::new("MJPG", 1920, 1080, 30),
                VideoConfig::new("MJPG", 1280, 720, 30),
                VideoConfig::new("YUYV", 640, 480, 30),
            ],
            controls,
            state: Arc::new(CameraState::default()),
        }
    }

    /// Report a different kernel driver
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.info.driver = driver.into();
        self
    }

    /// Replace the offered formats
    pub fn with_formats(mut self, formats: Vec<VideoConfig>) -> Self {
        self.formats = formats;
        self
    }

    /// Device info as enumerated
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Shared control surface
    pub fn controls(&self) -> Arc<SyntheticControls> {
        Arc::clone(&self.controls)
    }

    /// Make the next `n` captures fail
    pub fn fail_next_reads(&self, n: u32) {
        self.state.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Make opens fail (or succeed again)
    pub fn fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Frames captured so far
    pub fn frames_captured(&self) -> u64 {
        self.state.frames.load(Ordering::SeqCst)
    }

    /// Number of successful opens
    pub fn open_count(&self) -> u32 {
        self.state.opens.load(Ordering::SeqCst)
    }

    fn frame(&self, seq: u64) -> Bytes {
        // SOI, sequence number, EOI
        let mut buf = BytesMut::with_capacity(12);
        buf.put_slice(&[0xFF, 0xD8]);
        buf.put_u64(seq);
        buf.put_slice(&[0xFF, 0xD9]);
        buf.freeze()
    }
}

/// Driver over a set of synthetic cameras
#[derive(Debug, Default)]
pub struct SyntheticDriver {
    cameras: Mutex<HashMap<String, SyntheticCamera>>,
}

impl SyntheticDriver {
    /// Create an empty driver
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug a camera in
    pub fn add(&self, camera: SyntheticCamera) {
        camera.state.gone.store(false, Ordering::SeqCst);
        self.cameras
            .lock()
            .insert(camera.info.path.clone(), camera);
    }

    /// Unplug the camera at `path`; opened handles start failing
    pub fn remove(&self, path: &str) -> Option<SyntheticCamera> {
        let camera = self.cameras.lock().remove(path)?;
        camera.state.gone.store(true, Ordering::SeqCst);
        Some(camera)
    }
}

impl DeviceDriver for SyntheticDriver {
    fn enumerate(&self) -> Vec<DeviceInfo> {
        let mut list: Vec<DeviceInfo> = self
            .cameras
            .lock()
            .values()
            .map(|c| c.info.clone())
            .collect();
        list.sort_by(|a, b| a.path.cmp(&b.path));
        list
    }

    fn open(&self, path: &str) -> Result<Box<dyn CaptureDevice>> {
        let camera = self
            .cameras
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::open(path, "no such device"))?;

        if camera.state.fail_open.load(Ordering::SeqCst) {
            return Err(Error::open(path, "device busy"));
        }

        camera.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticDevice {
            format: camera.formats.first().cloned().unwrap_or_default(),
            camera,
            streaming: false,
        }))
    }
}

struct SyntheticDevice {
    camera: SyntheticCamera,
    format: VideoConfig,
    streaming: bool,
}

impl CaptureDevice for SyntheticDevice {
    fn formats(&self) -> Result<Vec<VideoConfig>> {
        Ok(self.camera.formats.clone())
    }

    fn set_format(&mut self, config: &VideoConfig) -> Result<()> {
        if !self.camera.formats.contains(config) {
            return Err(Error::open(
                &self.camera.info.path,
                format!("format {} not offered", config),
            ));
        }
        self.format = config.clone();
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.streaming = true;
        Ok(())
    }

    fn capture(&mut self) -> Result<Bytes> {
        let path = &self.camera.info.path;
        let state = &self.camera.state;

        if state.gone.load(Ordering::SeqCst) {
            return Err(Error::read(path, "device unplugged"));
        }
        if !self.streaming {
            return Err(Error::read(path, "not streaming"));
        }

        let fail = state
            .fail_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if fail.is_ok() {
            return Err(Error::read(path, "injected failure"));
        }

        let fps = self.format.fps.max(1);
        std::thread::sleep(Duration::from_millis(1000 / u64::from(fps)));

        let seq = state.frames.fetch_add(1, Ordering::SeqCst);
        Ok(self.camera.frame(seq))
    }

    fn stop(&mut self) {
        self.streaming = false;
    }

    fn controls(&self) -> Arc<dyn DeviceControls> {
        self.camera.controls()
    }
}
