//! Stream registry
//!
//! Slots are never removed. A slot whose actor stopped is "closed" and may be
//! rebound to a newly opened source, so a URL handed out once keeps working.

use std::sync::Arc;

use crate::error::Result;
use crate::host::state::{StreamInfo, StreamSummary};
use crate::source::{Source, VideoConfig, VideoSource};
use crate::stream::{self, parse_stream_url, Collaborators, RetryPolicy, StreamEndpoint};

use super::entry::StreamEntry;

/// Where a discovered source goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Already served by this open slot
    Skip(usize),
    /// Its own slot exists but is closed
    Rebind(usize),
    /// First closed slot, previously bound to another path
    Reuse(usize),
    /// New slot at the end
    Append(usize),
}

impl Placement {
    pub fn id(&self) -> usize {
        match *self {
            Placement::Skip(id)
            | Placement::Rebind(id)
            | Placement::Reuse(id)
            | Placement::Append(id) => id,
        }
    }
}

/// Registry of stream slots
///
/// Owned by the host monitor task, which is its only reader and writer.
#[derive(Debug)]
pub struct StreamRegistry {
    entries: Vec<StreamEntry>,
    viewer_backlog: usize,
}

impl StreamRegistry {
    /// Create an empty registry; hubs of new slots get `viewer_backlog`
    pub fn new(viewer_backlog: usize) -> Self {
        Self {
            entries: Vec::new(),
            viewer_backlog,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StreamEntry] {
        &self.entries
    }

    /// Slot served at `url` ("/video3" or "video3")
    pub fn get(&self, url: &str) -> Option<&StreamEntry> {
        parse_stream_url(url).and_then(|id| self.entries.get(id))
    }

    /// Decide where a source with physical `path` belongs
    ///
    /// A slot already bound to the path wins; otherwise the first closed slot
    /// is reused before a new one is appended.
    pub fn placement(&self, path: &str) -> Placement {
        if let Some(entry) = self.entries.iter().find(|e| e.path == path) {
            return if entry.is_open() {
                Placement::Skip(entry.id)
            } else {
                Placement::Rebind(entry.id)
            };
        }
        match self.entries.iter().find(|e| !e.is_open()) {
            Some(entry) => Placement::Reuse(entry.id),
            None => Placement::Append(self.entries.len()),
        }
    }

    /// Bind an opened source according to `placement` and start serving it
    ///
    /// Returns the slot id.
    pub async fn bind(
        &mut self,
        placement: Placement,
        source: Source,
        config: VideoConfig,
        policy: RetryPolicy,
        hooks: Collaborators,
    ) -> Result<usize> {
        let path = source.path().to_string();

        let id = match placement {
            Placement::Skip(id) => return Ok(id),
            Placement::Rebind(id) | Placement::Reuse(id) => {
                let entry = &mut self.entries[id];
                // The previous actor already stopped; reap it
                if let Some(mut actor) = entry.actor.take() {
                    actor.quit().await;
                }
                id
            }
            Placement::Append(id) => {
                debug_assert_eq!(id, self.entries.len());
                self.entries.push(StreamEntry {
                    id,
                    path: path.clone(),
                    config: config.clone(),
                    endpoint: Arc::new(StreamEndpoint::new(id, self.viewer_backlog)),
                    actor: None,
                });
                id
            }
        };

        let entry = &mut self.entries[id];
        let actor = stream::serve(
            Arc::clone(&entry.endpoint),
            source,
            config.clone(),
            policy,
            hooks,
        )?;

        tracing::info!(
            stream = %entry.url(),
            path = %path,
            previous = %entry.path,
            placement = ?placement,
            "Stream bound"
        );

        entry.path = path;
        entry.config = config;
        entry.actor = Some(actor);
        Ok(id)
    }

    pub fn summaries(&self) -> Vec<StreamSummary> {
        self.entries.iter().map(StreamEntry::summary).collect()
    }

    pub fn infos(&self) -> Vec<StreamInfo> {
        self.entries.iter().map(StreamEntry::info).collect()
    }

    /// Stop every actor in slot order, waiting for each
    pub async fn quit_all(&mut self) {
        for entry in &mut self.entries {
            if let Some(actor) = entry.actor.as_mut() {
                actor.quit().await;
            }
        }
    }
}
