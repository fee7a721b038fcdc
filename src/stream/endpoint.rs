//! Per-slot state shared with HTTP handlers

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::control::ControlHandle;
use crate::media::FrameHub;

/// Public face of one registry slot
///
/// Lives as long as the slot, so `/videoN` keeps its hub (and attached
/// viewers) across source rebinds. Only the slot's actor flips the flags
/// and swaps the control binding.
#[derive(Debug)]
pub struct StreamEndpoint {
    id: usize,
    url: String,
    hub: FrameHub,
    control: RwLock<Option<ControlHandle>>,
    busy: AtomicBool,
    recording: AtomicBool,
}

impl StreamEndpoint {
    /// Endpoint for slot `id`, served at `/video{id}`
    pub fn new(id: usize, viewer_backlog: usize) -> Self {
        let url = stream_url(id);
        Self {
            id,
            hub: FrameHub::new(url.clone(), viewer_backlog),
            url,
            control: RwLock::new(None),
            busy: AtomicBool::new(false),
            recording: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn hub(&self) -> &FrameHub {
        &self.hub
    }

    /// Whether an actor is serving this slot
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Control surface of the bound source, while it is served
    pub fn control(&self) -> Option<ControlHandle> {
        self.control.read().clone()
    }

    /// Mark busy; returns the previous value
    pub(crate) fn acquire(&self) -> bool {
        self.busy.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn release(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }

    pub(crate) fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::SeqCst);
    }

    pub(crate) fn bind_control(&self, control: Option<ControlHandle>) {
        *self.control.write() = control;
    }
}

/// Public URL of slot `id`
pub fn stream_url(id: usize) -> String {
    format!("/video{}", id)
}

/// Slot id of a public URL such as `/video3`
pub fn parse_stream_url(url: &str) -> Option<usize> {
    let id = url.trim_start_matches('/').strip_prefix("video")?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url() {
        assert_eq!(stream_url(0), "/video0");
        assert_eq!(parse_stream_url("/video12"), Some(12));
        assert_eq!(parse_stream_url("video3"), Some(3));
        assert_eq!(parse_stream_url("/video"), None);
        assert_eq!(parse_stream_url("/video-1"), None);
        assert_eq!(parse_stream_url("/host"), None);
    }

    #[test]
    fn test_acquire_release() {
        let endpoint = StreamEndpoint::new(2, 4);
        assert_eq!(endpoint.url(), "/video2");
        assert!(!endpoint.acquire());
        assert!(endpoint.acquire());
        assert!(endpoint.is_busy());
        endpoint.release();
        assert!(!endpoint.is_busy());
    }
}
