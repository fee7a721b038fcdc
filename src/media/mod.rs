//! MJPEG media plumbing
//!
//! This module provides:
//! - Multipart framing for serving and consuming MJPEG over HTTP
//! - The per-stream fan-out hub feeding HTTP viewers

pub mod hub;
pub mod multipart;

pub use hub::FrameHub;
pub use multipart::{MultipartReader, PartParser};
