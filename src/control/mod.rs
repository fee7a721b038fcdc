//! Device control table
//!
//! Maps public URL fragments such as `/zoomin` to a named hardware control
//! and a step multiplier. The table is assembled once from static per-driver
//! data and never mutated afterwards.

pub mod dispatch;

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{Error, Result};

pub use dispatch::{ControlHandle, ControlReply};

/// Sub-path restoring every known control to its default
pub const RESET_URL: &str = "/reset";

/// Driver family of UVC webcams
pub const UVC_DRIVER: &str = "uvcvideo";

/// `(control name, url, icon, multiplier)` rows for UVC webcams
pub const UVC_CONTROLS: &[(&str, &str, &str, i32)] = &[
    ("Zoom, Absolute", "/zoomin", "zoom_in", 1),
    ("Zoom, Absolute", "/zoomout", "zoom_out", -1),
    ("Pan, Absolute", "/panleft", "arrow_back", -1),
    ("Pan, Absolute", "/panright", "arrow_forward", 1),
    ("Tilt, Absolute", "/tiltup", "arrow_upward", 1),
    ("Tilt, Absolute", "/tiltdown", "arrow_downward", -1),
    ("Brightness", "/brightnessup", "brightness_high", 10),
    ("Brightness", "/brightnessdown", "brightness_low", -10),
    ("Contrast", "/contrastup", "contrast_square", 10),
    ("Contrast", "/contrastdown", "exposure", -10),
    ("Saturation", "/saturationup", "backlight_high", 10),
    ("Saturation", "/saturationdown", "backlight_low", -10),
];

/// One control URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlEntry {
    /// Public URL fragment, e.g. "/zoomin"
    pub url: String,
    /// Hardware control name, e.g. "Zoom, Absolute"
    pub control: String,
    /// Icon name for UIs
    pub icon: String,
    /// Steps applied per request (sign gives the direction)
    pub multiplier: i32,
    /// Driver family the entry belongs to
    pub driver: String,
}

/// Immutable URL → control lookup
#[derive(Debug, Clone, Default)]
pub struct ControlTable {
    entries: Vec<ControlEntry>,
    by_url: HashMap<String, usize>,
}

impl ControlTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for the control families this host ships with
    pub fn standard() -> Result<Self> {
        Self::new().with_driver(UVC_DRIVER, UVC_CONTROLS)
    }

    /// Add a driver family's rows
    ///
    /// Fails if any URL is already claimed, whether by this driver or another.
    pub fn with_driver(mut self, driver: &str, rows: &[(&str, &str, &str, i32)]) -> Result<Self> {
        for &(control, url, icon, multiplier) in rows {
            if self.by_url.contains_key(url) {
                return Err(Error::ControlTableConflict(url.to_string()));
            }
            self.by_url.insert(url.to_string(), self.entries.len());
            self.entries.push(ControlEntry {
                url: url.to_string(),
                control: control.to_string(),
                icon: icon.to_string(),
                multiplier,
                driver: driver.to_string(),
            });
        }
        Ok(self)
    }

    /// Entry for `url`
    pub fn get(&self, url: &str) -> Option<&ControlEntry> {
        self.by_url.get(url).map(|&i| &self.entries[i])
    }

    /// All entries in registration order
    pub fn entries(&self) -> &[ControlEntry] {
        &self.entries
    }

    /// Distinct control names, in registration order
    pub fn control_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !names.contains(&entry.control.as_str()) {
                names.push(&entry.control);
            }
        }
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Apply `step * multiplier` to `current`
///
/// Returns the new value only if it lies within `[min, max]`; an adjustment
/// that would leave the range is not applied at all.
pub fn adjust(current: i32, step: i32, multiplier: i32, min: i32, max: i32) -> Option<i32> {
    let value = i64::from(current) + i64::from(step) * i64::from(multiplier);
    if value < i64::from(min) || value > i64::from(max) {
        return None;
    }
    i32::try_from(value).ok()
}
