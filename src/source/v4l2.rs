//! Video4Linux capture driver (feature `v4l2`)

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use v4l::buffer::Type;
use v4l::control::{Control, Description, Value};
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC, Format};

use crate::error::{Error, Result};

use super::config::VideoConfig;
use super::driver::{CaptureDevice, ControlInfo, DeviceControls, DeviceDriver, DeviceInfo};

const BUFFER_COUNT: u32 = 4;

/// Enumerates `/dev/video*` nodes through V4L2
#[derive(Debug, Default)]
pub struct V4l2Driver;

impl V4l2Driver {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceDriver for V4l2Driver {
    fn enumerate(&self) -> Vec<DeviceInfo> {
        let mut devices = Vec::new();
        for node in v4l::context::enum_devices() {
            let path = node.path().to_string_lossy().to_string();
            let caps = match Device::with_path(node.path()).and_then(|dev| dev.query_caps()) {
                Ok(caps) => caps,
                Err(e) => {
                    tracing::debug!(path = %path, error = %e, "Skipping device");
                    continue;
                }
            };
            devices.push(DeviceInfo {
                path,
                name: node.name().unwrap_or_else(|| caps.card.clone()),
                driver: caps.driver.clone(),
                camera: caps
                    .capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE),
            });
        }
        devices.sort_by(|a, b| a.path.cmp(&b.path));
        devices
    }

    fn open(&self, path: &str) -> Result<Box<dyn CaptureDevice>> {
        let device = Device::with_path(path).map_err(|e| Error::open(path, e))?;
        let controls = Device::with_path(path).map_err(|e| Error::open(path, e))?;
        let descriptions = controls
            .query_controls()
            .unwrap_or_default()
            .into_iter()
            .filter(|d| {
                let fits = control_info(d).is_some();
                if !fits {
                    tracing::debug!(path = %path, control = %d.name, "Control range exceeds i32, skipped");
                }
                fits
            })
            .collect();

        Ok(Box::new(V4l2Device {
            path: path.to_string(),
            device,
            stream: None,
            controls: Arc::new(V4l2Controls {
                device: Mutex::new(controls),
                descriptions,
            }),
        }))
    }
}

struct V4l2Device {
    path: String,
    device: Device,
    stream: Option<MmapStream<'static>>,
    controls: Arc<V4l2Controls>,
}

impl CaptureDevice for V4l2Device {
    fn formats(&self) -> Result<Vec<VideoConfig>> {
        let mut configs = Vec::new();
        let formats = self
            .device
            .enum_formats()
            .map_err(|e| Error::open(&self.path, e))?;

        for format in formats {
            let codec = format.fourcc.str().unwrap_or_default().to_string();
            let sizes = self.device.enum_framesizes(format.fourcc).unwrap_or_default();
            for size in sizes {
                let FrameSizeEnum::Discrete(discrete) = size.size else {
                    continue;
                };
                let intervals = self
                    .device
                    .enum_frameintervals(format.fourcc, discrete.width, discrete.height)
                    .unwrap_or_default();
                for interval in intervals {
                    if let v4l::frameinterval::FrameIntervalEnum::Discrete(fraction) = interval.interval {
                        if fraction.numerator == 0 {
                            continue;
                        }
                        configs.push(VideoConfig::new(
                            codec.clone(),
                            discrete.width,
                            discrete.height,
                            fraction.denominator / fraction.numerator,
                        ));
                    }
                }
            }
        }
        Ok(configs)
    }

    fn set_format(&mut self, config: &VideoConfig) -> Result<()> {
        let mut fourcc = [b' '; 4];
        for (dst, src) in fourcc.iter_mut().zip(config.codec.bytes()) {
            *dst = src;
        }
        let format = Format::new(config.width, config.height, FourCC::new(&fourcc));
        let granted = self
            .device
            .set_format(&format)
            .map_err(|e| Error::open(&self.path, e))?;
        if granted.fourcc != format.fourcc {
            return Err(Error::open(&self.path, format!("format {} refused", config)));
        }
        let params = v4l::video::capture::Parameters::with_fps(config.fps);
        if let Err(e) = self.device.set_params(&params) {
            tracing::debug!(path = %self.path, error = %e, "Frame rate not applied");
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| Error::open(&self.path, e))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn capture(&mut self) -> Result<Bytes> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::NotOpen(self.path.clone()))?;
        let (buf, meta) = stream.next().map_err(|e| Error::read(&self.path, e))?;
        let len = (meta.bytesused as usize).min(buf.len());
        Ok(Bytes::copy_from_slice(&buf[..len]))
    }

    fn stop(&mut self) {
        self.stream = None;
    }

    fn controls(&self) -> Arc<dyn DeviceControls> {
        self.controls.clone()
    }
}

fn narrow<T: TryInto<i32>>(value: T) -> Option<i32> {
    value.try_into().ok()
}

/// Range of a control, if every bound fits an `i32`
fn control_info(desc: &Description) -> Option<ControlInfo> {
    Some(ControlInfo {
        name: desc.name.clone(),
        min: narrow(desc.minimum)?,
        max: narrow(desc.maximum)?,
        step: narrow(desc.step)?,
        default: narrow(desc.default)?,
    })
}

struct V4l2Controls {
    device: Mutex<Device>,
    descriptions: Vec<Description>,
}

impl V4l2Controls {
    fn find(&self, name: &str) -> Result<&Description> {
        self.descriptions
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownControl(name.to_string()))
    }
}

impl DeviceControls for V4l2Controls {
    fn list(&self) -> Vec<ControlInfo> {
        self.descriptions
            .iter()
            .filter_map(control_info)
            .collect()
    }

    fn get(&self, name: &str) -> Result<i32> {
        let desc = self.find(name)?;
        let control = self
            .device
            .lock()
            .control(desc.id)
            .map_err(|e| Error::control(name, e))?;
        match control.value {
            Value::Integer(v) => narrow(v).ok_or_else(|| Error::control(name, "value exceeds i32")),
            Value::Boolean(b) => Ok(i32::from(b)),
            _ => Err(Error::control(name, "not an integer control")),
        }
    }

    fn set(&self, name: &str, value: i32) -> Result<()> {
        let desc = self.find(name)?;
        self.device
            .lock()
            .set_control(Control {
                id: desc.id,
                value: Value::Integer(i64::from(value)),
            })
            .map_err(|e| Error::control(name, e))
    }
}
