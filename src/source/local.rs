//! Local capture device source

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::control::ControlHandle;
use crate::error::{Error, Result};

use super::config::VideoConfig;
use super::driver::{CaptureDevice, DeviceControls, DeviceDriver, DeviceInfo};
use super::VideoSource;

type SharedDevice = Arc<Mutex<Box<dyn CaptureDevice>>>;

/// A capture device on this host
///
/// Frames are captured on the blocking pool. The control surface is a
/// separate handle so control requests never wait on a frame read.
pub struct LocalCam {
    driver: Arc<dyn DeviceDriver>,
    info: DeviceInfo,
    device: Option<SharedDevice>,
    controls: Option<Arc<dyn DeviceControls>>,
    config: VideoConfig,
}

impl LocalCam {
    /// Create an unopened source for an enumerated device
    pub fn new(driver: Arc<dyn DeviceDriver>, info: DeviceInfo) -> Self {
        Self {
            driver,
            info,
            device: None,
            controls: None,
            config: VideoConfig::default(),
        }
    }

    /// Device info as enumerated
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Config granted by the last successful open
    pub fn config(&self) -> &VideoConfig {
        &self.config
    }
}

/// Open `info`, settle on the closest offered format and start capture
///
/// Runs on the blocking pool; driver calls may sleep on the device.
fn open_device(
    driver: &dyn DeviceDriver,
    info: &DeviceInfo,
    requested: &VideoConfig,
) -> Result<(Box<dyn CaptureDevice>, VideoConfig)> {
    let mut device = driver.open(&info.path)?;
    let granted = match negotiate(device.as_mut(), info, requested) {
        Ok(granted) => granted,
        Err(e) => {
            device.stop();
            return Err(e);
        }
    };
    device.start()?;
    Ok((device, granted))
}

fn negotiate(device: &mut dyn CaptureDevice, info: &DeviceInfo, requested: &VideoConfig) -> Result<VideoConfig> {
    let path = &info.path;
    let formats = device.formats()?;
    let found = requested
        .best_match(&formats)
        .cloned()
        .ok_or_else(|| Error::open(path, "device offers no formats"))?;

    device.set_format(&found).map_err(|e| {
        tracing::warn!(path = %path, format = %found, error = %e, "Format refused");
        e
    })?;

    Ok(found.with_path(path).with_driver(&info.driver))
}

#[async_trait]
impl VideoSource for LocalCam {
    fn path(&self) -> &str {
        &self.info.path
    }

    fn is_opened(&self) -> bool {
        self.device.is_some()
    }

    async fn open(&mut self, config: &VideoConfig) -> Result<VideoConfig> {
        if self.is_opened() {
            self.close().await;
        }

        let driver = Arc::clone(&self.driver);
        let info = self.info.clone();
        let requested = config.clone();
        let (device, granted) =
            tokio::task::spawn_blocking(move || open_device(driver.as_ref(), &info, &requested))
                .await
                .map_err(|e| Error::open(&self.info.path, e))??;

        tracing::info!(
            path = %self.info.path,
            name = %self.info.name,
            config = %granted,
            "Opened local device"
        );

        self.controls = Some(device.controls());
        self.device = Some(Arc::new(Mutex::new(device)));
        self.config = granted.clone();
        Ok(granted)
    }

    async fn read(&mut self) -> Result<Bytes> {
        let device = self
            .device
            .clone()
            .ok_or_else(|| Error::NotOpen(self.info.path.clone()))?;

        tokio::task::spawn_blocking(move || device.lock().capture())
            .await
            .map_err(|e| Error::read(&self.info.path, e))?
    }

    async fn close(&mut self) {
        self.controls = None;
        if let Some(device) = self.device.take() {
            let _ = tokio::task::spawn_blocking(move || device.lock().stop()).await;
            tracing::info!(path = %self.info.path, "Closed local device");
        }
    }

    fn control_handle(&self) -> Option<ControlHandle> {
        self.controls.clone().map(ControlHandle::Local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::synthetic::{SyntheticCamera, SyntheticDriver};

    fn setup() -> (Arc<SyntheticDriver>, SyntheticCamera, LocalCam) {
        let driver = Arc::new(SyntheticDriver::new());
        let camera = SyntheticCamera::new("/dev/video0");
        driver.add(camera.clone());
        let cam = LocalCam::new(driver.clone(), camera.info().clone());
        (driver, camera, cam)
    }

    #[tokio::test]
    async fn test_open_negotiates_config() {
        let (_driver, _camera, mut cam) = setup();

        let granted = cam.open(&VideoConfig::mjpeg_1080p()).await.unwrap();
        assert!(cam.is_opened());
        assert_eq!(granted.path, "/dev/video0");
        assert_eq!(granted.driver, "uvcvideo");
        assert_eq!(granted.codec, "MJPG");
        assert_eq!((granted.width, granted.height, granted.fps), (1920, 1080, 30));
        assert!(cam.control_handle().is_some());
    }

    #[tokio::test]
    async fn test_open_picks_closest_format() {
        let (_driver, _camera, mut cam) = setup();

        let granted = cam
            .open(&VideoConfig::new("MJPG", 1280, 700, 25))
            .await
            .unwrap();
        assert_eq!((granted.width, granted.height), (1280, 720));
    }

    #[tokio::test]
    async fn test_read_and_close() {
        let (_driver, camera, mut cam) = setup();
        cam.open(&VideoConfig::mjpeg_1080p()).await.unwrap();

        let frame = cam.read().await.unwrap();
        assert_eq!(&frame[..2], &[0xFF, 0xD8]);
        assert_eq!(camera.frames_captured(), 1);

        cam.close().await;
        assert!(!cam.is_opened());
        assert!(cam.control_handle().is_none());
        assert!(matches!(cam.read().await, Err(Error::NotOpen(_))));
    }

    #[tokio::test]
    async fn test_open_fails_when_busy() {
        let (_driver, camera, mut cam) = setup();
        camera.fail_open(true);

        assert!(cam.open(&VideoConfig::mjpeg_1080p()).await.is_err());
        assert!(!cam.is_opened());
    }
}
