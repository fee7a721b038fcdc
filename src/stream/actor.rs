//! Stream actor: owns one source and serves its frames
//!
//! The actor is the only task touching its source's read path. Between
//! reads it drains at most one command; commands never run mid-read. A quit
//! signal is observed while sleeping and while waiting on a read, so a
//! stalled peer or a long hibernate does not delay shutdown.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::source::{Source, VideoConfig, VideoSource};

use super::command::ServerCmd;
use super::endpoint::StreamEndpoint;
use super::recording::{Collaborators, RecordingSession};
use super::retry::{Backoff, RetryPolicy};

const COMMAND_QUEUE: usize = 16;

/// Handle the registry keeps for a running (or finished) actor
#[derive(Debug)]
pub struct ActorHandle {
    endpoint: Arc<StreamEndpoint>,
    quit: Option<oneshot::Sender<()>>,
    commands: mpsc::Sender<ServerCmd>,
    join: Option<JoinHandle<()>>,
}

impl ActorHandle {
    /// Whether the actor is still serving
    pub fn is_busy(&self) -> bool {
        self.endpoint.is_busy()
    }

    /// Queue a command; processed in send order between frame reads
    pub fn command(&self, cmd: ServerCmd) -> Result<()> {
        if !self.is_busy() {
            return Err(Error::NotOpen(self.endpoint.url().to_string()));
        }
        self.commands.try_send(cmd).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::control(self.endpoint.url(), "command queue full")
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::NotOpen(self.endpoint.url().to_string())
            }
        })
    }

    /// Stop the actor and wait until it has released its source
    ///
    /// A finished actor is not signalled; waiting on it returns at once.
    pub async fn quit(&mut self) {
        if self.is_busy() {
            if let Some(quit) = self.quit.take() {
                let _ = quit.send(());
            }
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::error!(stream = %self.endpoint.url(), error = %e, "Stream actor panicked");
            }
        }
    }
}

/// Start serving `source` on `endpoint`
///
/// The source must already be open; the granted `config` is reused when the
/// actor has to reopen it after a read failure.
///
/// # Panics
///
/// If the endpoint is already being served. Two actors on one slot means
/// reconciliation bound the slot twice.
pub fn serve(
    endpoint: Arc<StreamEndpoint>,
    source: Source,
    config: VideoConfig,
    policy: RetryPolicy,
    hooks: Collaborators,
) -> Result<ActorHandle> {
    if !source.is_opened() {
        tracing::warn!(path = %source.path(), "Unable to serve, source is not open");
        return Err(Error::NotOpen(source.path().to_string()));
    }
    if endpoint.acquire() {
        panic!("stream {} is already being served", endpoint.url());
    }
    endpoint.bind_control(source.control_handle());

    let (quit_tx, quit_rx) = oneshot::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);

    tracing::info!(
        stream = %endpoint.url(),
        path = %source.path(),
        config = %config,
        "Serving"
    );

    let actor = StreamActor {
        endpoint: Arc::clone(&endpoint),
        source,
        config,
        backoff: Backoff::new(policy),
        policy,
        hooks,
        quit: quit_rx,
        commands: cmd_rx,
        recording: None,
    };
    let join = tokio::spawn(actor.run());

    Ok(ActorHandle {
        endpoint,
        quit: Some(quit_tx),
        commands: cmd_tx,
        join: Some(join),
    })
}

/// Frees the slot when the actor task ends, panics included
struct SlotRelease(Arc<StreamEndpoint>);

impl Drop for SlotRelease {
    fn drop(&mut self) {
        if self.0.is_busy() {
            self.0.set_recording(false);
            self.0.bind_control(None);
            self.0.release();
        }
    }
}

struct StreamActor {
    endpoint: Arc<StreamEndpoint>,
    source: Source,
    config: VideoConfig,
    backoff: Backoff,
    policy: RetryPolicy,
    hooks: Collaborators,
    quit: oneshot::Receiver<()>,
    commands: mpsc::Receiver<ServerCmd>,
    recording: Option<RecordingSession>,
}

impl StreamActor {
    async fn run(mut self) {
        let _release = SlotRelease(Arc::clone(&self.endpoint));
        let mut delay = self.policy.normal();

        loop {
            tokio::select! {
                biased;
                _ = &mut self.quit => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if let Ok(cmd) = self.commands.try_recv() {
                self.execute(cmd).await;
                continue;
            }

            let result = tokio::select! {
                biased;
                _ = &mut self.quit => break,
                result = self.source.read() => result,
            };

            match result {
                Ok(frame) => {
                    delay = self.backoff.on_success();
                    self.endpoint.hub().update(frame.clone());
                    self.forward_to_recorder(frame).await;
                }
                Err(e) => {
                    delay = self.backoff.on_failure();
                    tracing::warn!(
                        stream = %self.endpoint.url(),
                        path = %self.source.path(),
                        attempts = self.backoff.failures(),
                        next_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Source unavailable"
                    );

                    if self.source.is_opened() {
                        self.source.close().await;
                    }
                    match self.source.open(&self.config).await {
                        Ok(granted) => {
                            self.config = granted;
                            self.endpoint.bind_control(self.source.control_handle());
                        }
                        Err(e) => {
                            tracing::warn!(
                                stream = %self.endpoint.url(),
                                path = %self.source.path(),
                                error = %e,
                                "Shutting down stream"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn forward_to_recorder(&mut self, frame: bytes::Bytes) {
        let Some(session) = self.recording.as_mut() else {
            return;
        };
        session.push(frame);
        if session.expired(Instant::now()) {
            tracing::info!(stream = %self.endpoint.url(), "Recording deadline reached");
            self.stop_recording().await;
        }
    }

    async fn execute(&mut self, cmd: ServerCmd) {
        tracing::debug!(stream = %self.endpoint.url(), command = ?cmd, "Command");
        match cmd {
            ServerCmd::RecordStart(duration) => {
                if self.recording.is_some() {
                    tracing::info!(stream = %self.endpoint.url(), "Already recording, restarting");
                    self.stop_recording().await;
                }

                let Some(recorder) = self.hooks.recorder.clone() else {
                    tracing::warn!(stream = %self.endpoint.url(), "No recorder configured");
                    return;
                };
                let id = self.endpoint.id();
                self.recording = Some(RecordingSession::start(
                    id,
                    duration,
                    recorder,
                    self.hooks.audio.as_ref(),
                ));
                self.endpoint.set_recording(true);
                if let Some(listener) = &self.hooks.listener {
                    listener.stream_on(id);
                }
                tracing::info!(
                    stream = %self.endpoint.url(),
                    seconds = duration.as_secs(),
                    "Recording started"
                );
            }
            ServerCmd::RecordStop => self.stop_recording().await,
        }
    }

    async fn stop_recording(&mut self) {
        let Some(session) = self.recording.take() else {
            tracing::debug!(stream = %self.endpoint.url(), "Not recording");
            return;
        };
        session.stop().await;
        self.endpoint.set_recording(false);
        if let Some(listener) = &self.hooks.listener {
            listener.stream_off(self.endpoint.id());
        }
        tracing::info!(stream = %self.endpoint.url(), "Recording stopped");
    }

    async fn shutdown(mut self) {
        self.stop_recording().await;
        self.source.close().await;
        self.endpoint.bind_control(None);
        self.endpoint.release();
        tracing::info!(stream = %self.endpoint.url(), path = %self.source.path(), "Stream stopped");
    }
}
