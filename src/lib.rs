//! camhub: video capture discovery, MJPEG multiplexing and host federation
//!
//! A host periodically discovers capture devices (through a
//! [`DeviceDriver`](source::DeviceDriver)) and the streams of peer hosts,
//! binds each to a stable `/videoN` slot and serves it to any number of HTTP
//! viewers as `multipart/x-mixed-replace` MJPEG. Control sub-paths such as
//! `/video0/zoomin` adjust the device; on a proxied stream they are relayed
//! to the origin host.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use camhub::source::synthetic::{SyntheticCamera, SyntheticDriver};
//! use camhub::{HostBuilder, HostConfig, HttpServer};
//!
//! # async fn example() -> camhub::error::Result<()> {
//! let driver = Arc::new(SyntheticDriver::new());
//! driver.add(SyntheticCamera::new("/dev/video0"));
//!
//! let config = HostConfig::default().addr("127.0.0.1").port(9000);
//! let bind_addr = config.bind_addr()?;
//! let (host, _monitor) = HostBuilder::new(config).driver(driver).spawn()?;
//!
//! HttpServer::new(host, bind_addr).run().await
//! # }
//! ```

pub mod client;
pub mod control;
pub mod error;
pub mod host;
pub mod media;
pub mod registry;
pub mod server;
pub mod source;
pub mod stream;

pub use error::{Error, Result};
pub use host::{Host, HostBuilder, HostState};
pub use server::{HostConfig, HttpServer};
pub use source::{Source, VideoConfig, VideoSource};
