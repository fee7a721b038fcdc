//! Control request dispatch
//!
//! A local source applies the request to its own device controls. A proxied
//! source relays the raw sub-path to the origin host, where the real
//! adjustment happens.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::client::RemoteRelay;
use crate::error::{Error, Result};
use crate::source::DeviceControls;

use super::{adjust, ControlTable, RESET_URL};

/// Control surface of a bound source
#[derive(Clone)]
pub enum ControlHandle {
    /// Device controls on this host
    Local(Arc<dyn DeviceControls>),
    /// Relay to the origin host's stream URL
    Remote(RemoteRelay),
}

/// Outcome of a control request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReply {
    /// Value of the control after the request
    Value(ControlValue),
    /// Controls were reset to their defaults
    Reset,
    /// Response body of the origin host, verbatim
    Relayed(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlValue {
    pub control: String,
    pub value: i32,
}

impl ControlHandle {
    /// Handle `sub_path` (e.g. "/zoomin" or "/reset")
    pub async fn handle(&self, table: &ControlTable, sub_path: &str) -> Result<ControlReply> {
        match self {
            ControlHandle::Local(controls) => {
                if sub_path == RESET_URL {
                    reset(controls.as_ref(), table);
                    return Ok(ControlReply::Reset);
                }
                step(controls.as_ref(), table, sub_path).map(ControlReply::Value)
            }
            ControlHandle::Remote(relay) => relay.forward(sub_path).await.map(ControlReply::Relayed),
        }
    }
}

/// Apply one control URL to local device controls
pub fn step(controls: &dyn DeviceControls, table: &ControlTable, url: &str) -> Result<ControlValue> {
    let entry = table
        .get(url)
        .ok_or_else(|| Error::UnknownControl(url.to_string()))?;
    let info = controls
        .info(&entry.control)
        .ok_or_else(|| Error::UnknownControl(entry.control.clone()))?;

    let current = controls.get(&entry.control)?;
    let value = match adjust(current, info.step, entry.multiplier, info.min, info.max) {
        Some(value) => {
            controls.set(&entry.control, value)?;
            value
        }
        None => {
            tracing::debug!(
                control = %entry.control,
                current = current,
                "Adjustment out of range, not applied"
            );
            current
        }
    };

    Ok(ControlValue {
        control: entry.control.clone(),
        value,
    })
}

/// Restore every control in `table` to its default, best-effort
pub fn reset(controls: &dyn DeviceControls, table: &ControlTable) {
    for name in table.control_names() {
        let Some(info) = controls.info(name) else {
            continue;
        };
        if let Err(e) = controls.set(name, info.default) {
            tracing::warn!(control = %name, error = %e, "Failed to reset control");
        }
    }
}

impl std::fmt::Debug for ControlHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlHandle::Local(controls) => f
                .debug_tuple("Local")
                .field(&controls.list().len())
                .finish(),
            ControlHandle::Remote(relay) => f.debug_tuple("Remote").field(relay).finish(),
        }
    }
}
