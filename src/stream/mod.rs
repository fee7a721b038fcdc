//! Per-stream actors
//!
//! Each registry slot owns a [`StreamEndpoint`] for its whole life and, while
//! a source is bound, one actor serving that source into the endpoint's hub.

pub mod actor;
pub mod command;
pub mod endpoint;
pub mod recording;
pub mod retry;

pub use actor::{serve, ActorHandle};
pub use command::{ServerCmd, DEFAULT_RECORD_SECS, MAX_RECORD_SECS};
pub use endpoint::{parse_stream_url, stream_url, StreamEndpoint};
pub use recording::{AudioSource, Collaborators, FileRecorder, Recorder, RecordingSession, StreamListener};
pub use retry::{Backoff, RetryPolicy};
