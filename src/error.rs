//! Error types
//!
//! A single error enum shared by sources, the orchestrator, control dispatch
//! and the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all camhub operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error (federation fetch, remote source, control relay)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation requires an opened source
    #[error("Source not open: {0}")]
    NotOpen(String),

    /// Source could not be opened
    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    /// Frame read failed
    #[error("Read failed on {path}: {reason}")]
    Read { path: String, reason: String },

    /// Remote byte stream ended
    #[error("End of stream: {0}")]
    EndOfStream(String),

    /// Malformed multipart payload or remote state
    #[error("Malformed data: {0}")]
    Malformed(String),

    /// Control URL or control name not supported by the source
    #[error("Unsupported control: {0}")]
    UnknownControl(String),

    /// Device refused a control read/write
    #[error("Control {name} failed: {reason}")]
    Control { name: String, reason: String },

    /// No registry slot with that URL
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// Two control tables claim the same URL
    #[error("Control URL registered twice: {0}")]
    ControlTableConflict(String),

    /// The orchestrator loop is no longer running
    #[error("Host monitor stopped")]
    HostStopped,

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Build an open failure for `path`
    pub fn open(path: impl Into<String>, reason: impl ToString) -> Self {
        Error::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a read failure for `path`
    pub fn read(path: impl Into<String>, reason: impl ToString) -> Self {
        Error::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a control failure for control `name`
    pub fn control(name: impl Into<String>, reason: impl ToString) -> Self {
        Error::Control {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            Error::StreamNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::UnknownControl(_) => (StatusCode::NOT_FOUND, "UNKNOWN_CONTROL"),
            Error::HostStopped => (StatusCode::SERVICE_UNAVAILABLE, "HOST_STOPPED"),
            Error::Http(_) | Error::EndOfStream(_) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR"),
            Error::Config(_) | Error::Malformed(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let message = self.to_string();

        tracing::debug!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        (
            status,
            Json(json!({
                "error_code": error_code,
                "message": message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::open("/dev/video0", "busy");
        assert_eq!(err.to_string(), "Failed to open /dev/video0: busy");

        let err = Error::StreamNotFound("/video3".into());
        assert_eq!(err.to_string(), "Stream not found: /video3");
    }

    #[test]
    fn test_not_found_status() {
        let response = Error::StreamNotFound("/video9".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = Error::HostStopped.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
