//! Recording collaborators and supervised recording tasks
//!
//! A recording session runs a video task (fed frames by the stream actor)
//! and optionally an audio task. Both are spawned with a stop signal and
//! their `JoinHandle` is awaited on stop, so failures are logged instead of
//! lost.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Result;

use super::command::MAX_RECORD_SECS;

/// Frames queued for the recorder before frames are dropped
const RECORD_QUEUE: usize = 64;

/// Persists a recorded frame sequence
#[async_trait]
pub trait Recorder: Send + Sync + 'static {
    /// Consume `frames` until `stop` fires or the channel closes
    async fn record(
        &self,
        stream_id: usize,
        frames: mpsc::Receiver<Bytes>,
        stop: oneshot::Receiver<()>,
    ) -> Result<()>;
}

/// Audio capture alongside a video recording
#[async_trait]
pub trait AudioSource: Send + Sync + 'static {
    fn is_enabled(&self) -> bool;

    /// Record until `stop` fires
    async fn record(&self, stream_id: usize, stop: oneshot::Receiver<()>) -> Result<()>;
}

/// Notified when a stream starts or stops recording
pub trait StreamListener: Send + Sync + 'static {
    fn stream_on(&self, stream_id: usize);
    fn stream_off(&self, stream_id: usize);
}

/// Optional recording collaborators handed to every stream actor
#[derive(Clone, Default)]
pub struct Collaborators {
    pub recorder: Option<Arc<dyn Recorder>>,
    pub audio: Option<Arc<dyn AudioSource>>,
    pub listener: Option<Arc<dyn StreamListener>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("recorder", &self.recorder.is_some())
            .field("audio", &self.audio.is_some())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// Writes concatenated JPEG frames to `<dir>/video<id>-<timestamp>.mjpeg`
#[derive(Debug, Clone)]
pub struct FileRecorder {
    dir: PathBuf,
}

impl FileRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output file for a recording of `stream_id` started now
    pub fn file_path(&self, stream_id: usize) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        self.dir.join(format!("video{}-{}.mjpeg", stream_id, stamp))
    }
}

#[async_trait]
impl Recorder for FileRecorder {
    async fn record(
        &self,
        stream_id: usize,
        mut frames: mpsc::Receiver<Bytes>,
        mut stop: oneshot::Receiver<()>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.file_path(stream_id);
        let mut file = tokio::io::BufWriter::new(tokio::fs::File::create(&path).await?);

        tracing::info!(stream_id = stream_id, path = %path.display(), "Recording started");

        let mut written = 0u64;
        loop {
            tokio::select! {
                _ = &mut stop => break,
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        file.write_all(&frame).await?;
                        written += 1;
                    }
                    None => break,
                },
            }
        }
        file.flush().await?;

        tracing::info!(
            stream_id = stream_id,
            path = %path.display(),
            frames = written,
            "Recording finished"
        );
        Ok(())
    }
}

/// A spawned collaborator task with its stop signal
#[derive(Debug)]
pub struct RecordingTask {
    name: &'static str,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl RecordingTask {
    fn spawn<F>(name: &'static str, stop: oneshot::Sender<()>, task: F) -> Self
    where
        F: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name,
            stop,
            handle: tokio::spawn(task),
        }
    }

    /// Signal the task and wait for it to finish
    pub async fn stop(self, stream_id: usize) {
        // Err: the task already returned on its own
        let _ = self.stop.send(());
        match self.handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(stream_id = stream_id, task = self.name, error = %e, "Recording task failed");
            }
            Err(e) => {
                tracing::error!(stream_id = stream_id, task = self.name, error = %e, "Recording task panicked");
            }
        }
    }
}

/// An active recording on one stream
#[derive(Debug)]
pub struct RecordingSession {
    stream_id: usize,
    frames: mpsc::Sender<Bytes>,
    video: RecordingTask,
    audio: Option<RecordingTask>,
    deadline: Instant,
    dropped: u64,
}

impl RecordingSession {
    /// Spawn the video (and, if enabled, audio) tasks
    pub fn start(
        stream_id: usize,
        duration: Duration,
        recorder: Arc<dyn Recorder>,
        audio: Option<&Arc<dyn AudioSource>>,
    ) -> Self {
        let audio = match audio {
            Some(source) if source.is_enabled() => {
                let (tx, rx) = oneshot::channel();
                let source = Arc::clone(source);
                Some(RecordingTask::spawn("audio", tx, async move {
                    source.record(stream_id, rx).await
                }))
            }
            Some(_) => {
                tracing::debug!(stream_id = stream_id, "Audio source not enabled");
                None
            }
            None => None,
        };

        let (frames_tx, frames_rx) = mpsc::channel(RECORD_QUEUE);
        let (stop_tx, stop_rx) = oneshot::channel();
        let video = RecordingTask::spawn("video", stop_tx, async move {
            recorder.record(stream_id, frames_rx, stop_rx).await
        });

        let now = Instant::now();
        let deadline = now
            .checked_add(duration)
            .unwrap_or_else(|| now + Duration::from_secs(MAX_RECORD_SECS));

        Self {
            stream_id,
            frames: frames_tx,
            video,
            audio,
            deadline,
            dropped: 0,
        }
    }

    /// Queue a frame for the recorder without waiting
    pub fn push(&mut self, frame: Bytes) {
        if self.frames.try_send(frame).is_err() {
            self.dropped += 1;
            tracing::trace!(stream_id = self.stream_id, dropped = self.dropped, "Recorder behind, frame dropped");
        }
    }

    /// Whether the session ran past its deadline
    pub fn expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Stop audio then video, waiting for both
    pub async fn stop(self) {
        if let Some(audio) = self.audio {
            audio.stop(self.stream_id).await;
        }
        drop(self.frames);
        self.video.stop(self.stream_id).await;
    }
}
