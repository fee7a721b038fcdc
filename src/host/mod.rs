//! Host orchestration
//!
//! - [`monitor`]: the task owning the stream registry, driving discovery
//!   scans and answering registry queries
//! - [`state`]: the `/host` document peers federate with

pub mod monitor;
pub mod state;

pub use monitor::{Host, HostBuilder};
pub use state::{HostState, StreamInfo, StreamSummary};
