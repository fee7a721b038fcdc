//! Stream registry
//!
//! Reconciles discovered sources against a list of stable slots:
//!
//! ```text
//!   discovered path ──► placement()
//!                         │
//!        ┌────────────────┼─────────────────┬──────────────┐
//!        ▼                ▼                 ▼              ▼
//!   Skip (open)    Rebind (own slot,   Reuse (first    Append
//!                   closed)            closed slot)    (id = len)
//!                         │                 │              │
//!                         └──── open source, then bind() ──┘
//!                                           │
//!                                 StreamEntry { endpoint, actor }
//! ```
//!
//! Placement is decided before the source is opened and applied only after
//! the open succeeded, so a failed open never mutates the registry.

pub mod entry;
pub mod store;

pub use entry::StreamEntry;
pub use store::{Placement, StreamRegistry};
