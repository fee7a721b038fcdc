//! HTTP surface of a host

pub mod config;
pub mod listener;

pub use config::{HostConfig, CONFIG_FILE};
pub use listener::HttpServer;
