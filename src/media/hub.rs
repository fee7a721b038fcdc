//! Frame fan-out hub
//!
//! One producer (the stream actor) publishes the latest captured frame; any
//! number of HTTP viewers receive it as a multipart byte stream.
//!
//! Built on `tokio::sync::broadcast`: publishing never waits for viewers, and
//! a viewer that falls more than `backlog` frames behind skips ahead instead
//! of buffering. `Bytes` is reference counted, so every viewer shares the
//! same frame allocation.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::multipart;

/// Broadcaster for one stream's frames
#[derive(Debug, Clone)]
pub struct FrameHub {
    inner: Arc<HubInner>,
}

#[derive(Debug)]
struct HubInner {
    name: String,
    tx: broadcast::Sender<Bytes>,
    viewers: Arc<AtomicU32>,
}

/// Registration of one viewer; deregisters on drop
///
/// Holds only the counter, so viewers never keep the sender alive: once the
/// hub is dropped every viewer stream ends.
#[derive(Debug)]
struct ViewerGuard {
    name: String,
    viewers: Arc<AtomicU32>,
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        let prev = self.viewers.fetch_sub(1, Ordering::Relaxed);
        tracing::debug!(
            stream = %self.name,
            viewers = prev.saturating_sub(1),
            "Viewer detached"
        );
    }
}

impl FrameHub {
    /// Create a hub; each viewer may lag `backlog` frames before skipping
    pub fn new(name: impl Into<String>, backlog: usize) -> Self {
        let (tx, _) = broadcast::channel(backlog.max(1));
        Self {
            inner: Arc::new(HubInner {
                name: name.into(),
                tx,
                viewers: Arc::new(AtomicU32::new(0)),
            }),
        }
    }

    /// Publish a frame to every attached viewer
    ///
    /// Returns the number of viewers the frame was queued for.
    pub fn update(&self, frame: Bytes) -> usize {
        // Err only means nobody is watching
        self.inner.tx.send(frame).unwrap_or(0)
    }

    /// Number of attached viewers
    pub fn viewer_count(&self) -> u32 {
        self.inner.viewers.load(Ordering::Relaxed)
    }

    /// Attach a viewer and return its frame stream
    ///
    /// The viewer stays registered until the stream is dropped, which the
    /// HTTP transport does when the client disconnects.
    pub fn subscribe(&self) -> impl Stream<Item = Bytes> + Send + 'static {
        let rx = self.inner.tx.subscribe();
        let prev = self.inner.viewers.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(stream = %self.inner.name, viewers = prev + 1, "Viewer attached");

        let guard = ViewerGuard {
            name: self.inner.name.clone(),
            viewers: Arc::clone(&self.inner.viewers),
        };

        futures::stream::unfold((rx, guard), |(mut rx, guard)| async move {
            loop {
                match rx.recv().await {
                    Ok(frame) => return Some((frame, (rx, guard))),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::trace!(
                            stream = %guard.name,
                            skipped = skipped,
                            "Slow viewer skipped frames"
                        );
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }

    /// HTTP response carrying this hub's live multipart feed
    pub fn stream(&self) -> Response {
        use futures::StreamExt;

        let body = self
            .subscribe()
            .map(|frame| Ok::<_, Infallible>(multipart::encode_part(&frame)));

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, multipart::content_type()),
                (header::CACHE_CONTROL, "no-cache, no-store".to_string()),
            ],
            Body::from_stream(body),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn test_update_without_viewers() {
        let hub = FrameHub::new("/video0", 4);
        assert_eq!(hub.update(Bytes::from_static(b"x")), 0);
        assert_eq!(hub.viewer_count(), 0);
    }

    #[tokio::test]
    async fn test_fan_out_to_viewers() {
        let hub = FrameHub::new("/video0", 4);
        let a = hub.subscribe();
        let b = hub.subscribe();
        tokio::pin!(a);
        tokio::pin!(b);
        assert_eq!(hub.viewer_count(), 2);

        assert_eq!(hub.update(Bytes::from_static(b"frame-1")), 2);

        assert_eq!(&a.next().await.unwrap()[..], b"frame-1");
        assert_eq!(&b.next().await.unwrap()[..], b"frame-1");
    }

    #[tokio::test]
    async fn test_viewer_drop_deregisters() {
        let hub = FrameHub::new("/video0", 4);
        let viewer = hub.subscribe();
        assert_eq!(hub.viewer_count(), 1);

        drop(viewer);
        assert_eq!(hub.viewer_count(), 0);
        assert_eq!(hub.update(Bytes::from_static(b"x")), 0);
    }

    #[tokio::test]
    async fn test_viewers_end_when_hub_dropped() {
        let hub = FrameHub::new("/video0", 4);
        let viewer = hub.subscribe();
        tokio::pin!(viewer);

        drop(hub);
        assert!(viewer.next().await.is_none());
    }

    #[tokio::test]
    async fn test_slow_viewer_skips_ahead() {
        let hub = FrameHub::new("/video0", 2);
        let viewer = hub.subscribe();
        tokio::pin!(viewer);

        // Producer never blocks even though nobody is reading
        for i in 0..10u8 {
            hub.update(Bytes::from(vec![i]));
        }

        // Only the newest `backlog` frames survive
        assert_eq!(&viewer.next().await.unwrap()[..], &[8]);
        assert_eq!(&viewer.next().await.unwrap()[..], &[9]);
    }
}
