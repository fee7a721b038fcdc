//! HTTP clients for peer hosts
//!
//! - Fetching a peer's published `/host` state for federation
//! - Relaying control requests to the origin of a proxied stream

pub mod federation;
pub mod relay;

pub use federation::{normalize_base, FederationClient};
pub use relay::RemoteRelay;
