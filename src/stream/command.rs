//! Commands delivered to a stream actor

use std::time::Duration;

/// Default recording length when none is requested
pub const DEFAULT_RECORD_SECS: u64 = 60;

/// Longest recording a single request can ask for (one day)
pub const MAX_RECORD_SECS: u64 = 24 * 60 * 60;

/// Command executed by a stream actor between frame reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCmd {
    /// Start recording for the given duration, restarting any active session
    RecordStart(Duration),
    /// Stop the active recording, if any
    RecordStop,
}

impl ServerCmd {
    /// `RecordStart` for `secs` seconds, capped at [`MAX_RECORD_SECS`]
    pub fn record_for(secs: u64) -> Self {
        ServerCmd::RecordStart(Duration::from_secs(secs.min(MAX_RECORD_SECS)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_for_is_capped() {
        assert_eq!(ServerCmd::record_for(30), ServerCmd::RecordStart(Duration::from_secs(30)));
        assert_eq!(
            ServerCmd::record_for(u64::MAX),
            ServerCmd::RecordStart(Duration::from_secs(MAX_RECORD_SECS))
        );
    }
}
