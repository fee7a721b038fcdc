//! Host monitor
//!
//! One task owns the stream registry. It alternates between periodic
//! discovery scans and requests arriving on its command channel; every
//! registry read or write goes through it, so queries always see whole
//! scans and never a half-applied one.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::{normalize_base, FederationClient};
use crate::control::ControlTable;
use crate::error::{Error, Result};
use crate::registry::{Placement, StreamRegistry};
use crate::server::config::HostConfig;
use crate::source::{DeviceDriver, LocalCam, Source, VideoConfig, VideoSource};
use crate::stream::{
    AudioSource, Collaborators, FileRecorder, Recorder, ServerCmd, StreamEndpoint, StreamListener,
};

use super::state::{HostState, StreamSummary};

const COMMAND_QUEUE: usize = 64;

/// Request to the monitor, answered on its reply channel
#[derive(Debug)]
enum HostCommand {
    Scan(oneshot::Sender<()>),
    Streams(oneshot::Sender<Vec<StreamSummary>>),
    Stream(String, oneshot::Sender<Option<StreamSummary>>),
    Endpoint(String, oneshot::Sender<Option<Arc<StreamEndpoint>>>),
    State(oneshot::Sender<HostState>),
    Command(String, ServerCmd, oneshot::Sender<Result<()>>),
    Quit(oneshot::Sender<()>),
}

/// Handle to a running host monitor
#[derive(Debug, Clone)]
pub struct Host {
    tx: mpsc::Sender<HostCommand>,
    table: Arc<ControlTable>,
    url: String,
}

impl Host {
    /// Base URL this host publishes
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Control table used for control sub-paths
    pub fn control_table(&self) -> &Arc<ControlTable> {
        &self.table
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> HostCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .await
            .map_err(|_| Error::HostStopped)?;
        rx.await.map_err(|_| Error::HostStopped)
    }

    /// Run one discovery cycle now and wait for it
    pub async fn scan(&self) -> Result<()> {
        self.request(HostCommand::Scan).await
    }

    /// Snapshot of every slot
    pub async fn streams(&self) -> Result<Vec<StreamSummary>> {
        self.request(HostCommand::Streams).await
    }

    /// Snapshot of the slot at `url`
    pub async fn stream(&self, url: &str) -> Result<StreamSummary> {
        let url = url.to_string();
        self.request(|tx| HostCommand::Stream(url.clone(), tx))
            .await?
            .ok_or(Error::StreamNotFound(url))
    }

    /// Shared endpoint of the slot at `url`
    pub async fn endpoint(&self, url: &str) -> Result<Arc<StreamEndpoint>> {
        let url = url.to_string();
        self.request(|tx| HostCommand::Endpoint(url.clone(), tx))
            .await?
            .ok_or(Error::StreamNotFound(url))
    }

    /// Published state document
    pub async fn state(&self) -> Result<HostState> {
        self.request(HostCommand::State).await
    }

    /// Start recording the stream at `url` for `secs` seconds
    pub async fn record(&self, url: &str, secs: u64) -> Result<()> {
        self.command(url, ServerCmd::record_for(secs)).await
    }

    /// Stop recording the stream at `url`
    pub async fn stop_record(&self, url: &str) -> Result<()> {
        self.command(url, ServerCmd::RecordStop).await
    }

    async fn command(&self, url: &str, cmd: ServerCmd) -> Result<()> {
        let url = url.to_string();
        self.request(|tx| HostCommand::Command(url, cmd, tx)).await?
    }

    /// Stop every stream actor in slot order, then the monitor
    pub async fn quit(&self) -> Result<()> {
        self.request(HostCommand::Quit).await
    }
}

/// Assembles a host monitor
pub struct HostBuilder {
    config: HostConfig,
    driver: Option<Arc<dyn DeviceDriver>>,
    hooks: Collaborators,
    table: Option<ControlTable>,
    federation: Option<FederationClient>,
}

impl HostBuilder {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            driver: None,
            hooks: Collaborators::default(),
            table: None,
            federation: None,
        }
    }

    /// Capture driver for local cameras; without one only remotes are served
    pub fn driver(mut self, driver: Arc<dyn DeviceDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Recorder; defaults to files under the configured recording directory
    pub fn recorder(mut self, recorder: Arc<dyn Recorder>) -> Self {
        self.hooks.recorder = Some(recorder);
        self
    }

    pub fn audio(mut self, audio: Arc<dyn AudioSource>) -> Self {
        self.hooks.audio = Some(audio);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn StreamListener>) -> Self {
        self.hooks.listener = Some(listener);
        self
    }

    /// Control table; defaults to [`ControlTable::standard`]
    pub fn control_table(mut self, table: ControlTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn federation(mut self, client: FederationClient) -> Self {
        self.federation = Some(client);
        self
    }

    /// Spawn the monitor task
    ///
    /// The first discovery cycle starts immediately.
    pub fn spawn(self) -> Result<(Host, JoinHandle<()>)> {
        let table = match self.table {
            Some(table) => table,
            None => ControlTable::standard()?,
        };
        let mut hooks = self.hooks;
        if hooks.recorder.is_none() {
            hooks.recorder = Some(Arc::new(FileRecorder::new(self.config.recording_dir.clone())));
        }

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let url = self.config.url();

        let monitor = Monitor {
            registry: StreamRegistry::new(self.config.viewer_backlog),
            url: url.clone(),
            config: self.config,
            driver: self.driver,
            federation: self.federation.unwrap_or_default(),
            hooks,
            rx,
        };
        let join = tokio::spawn(monitor.run());

        let host = Host {
            tx,
            table: Arc::new(table),
            url,
        };
        Ok((host, join))
    }
}

struct Monitor {
    config: HostConfig,
    url: String,
    registry: StreamRegistry,
    driver: Option<Arc<dyn DeviceDriver>>,
    federation: FederationClient,
    hooks: Collaborators,
    rx: mpsc::Receiver<HostCommand>,
}

impl Monitor {
    async fn run(mut self) {
        tracing::info!(
            url = %self.url,
            remotes = self.config.remotes.len(),
            interval_ms = self.config.scan_interval_ms,
            "Host monitor started"
        );

        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.scan().await,
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle(cmd).await.is_break() {
                            return;
                        }
                    }
                    // Every handle dropped
                    None => break,
                },
            }
        }

        self.registry.quit_all().await;
        tracing::info!("Host monitor stopped");
    }

    /// Answer one request; breaks once the monitor has quit
    async fn handle(&mut self, cmd: HostCommand) -> ControlFlow<()> {
        // A dropped reply receiver only means the requester gave up
        match cmd {
            HostCommand::Scan(reply) => {
                self.scan().await;
                let _ = reply.send(());
            }
            HostCommand::Streams(reply) => {
                let _ = reply.send(self.registry.summaries());
            }
            HostCommand::Stream(url, reply) => {
                let _ = reply.send(self.registry.get(&url).map(|e| e.summary()));
            }
            HostCommand::Endpoint(url, reply) => {
                let _ = reply.send(self.registry.get(&url).map(|e| Arc::clone(e.endpoint())));
            }
            HostCommand::State(reply) => {
                let _ = reply.send(self.state());
            }
            HostCommand::Command(url, cmd, reply) => {
                let result = match self.registry.get(&url) {
                    None => Err(Error::StreamNotFound(url)),
                    Some(entry) => match entry.actor() {
                        Some(actor) => actor.command(cmd),
                        None => Err(Error::NotOpen(entry.url().to_string())),
                    },
                };
                let _ = reply.send(result);
            }
            HostCommand::Quit(reply) => {
                self.registry.quit_all().await;
                tracing::info!("Host monitor stopped");
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn state(&self) -> HostState {
        HostState {
            url: self.url.clone(),
            streams: self.registry.infos(),
            remotes: self.config.remotes.clone(),
            interval: self.config.scan_interval_ms,
        }
    }

    async fn scan(&mut self) {
        tracing::debug!(streams = self.registry.len(), "Scanning");

        if let Some(driver) = self.driver.clone() {
            let requested = self.config.preferred.clone();
            let devices = driver
                .enumerate()
                .into_iter()
                .filter(|d| d.camera && d.driver == self.config.driver_family)
                .collect::<Vec<_>>();

            for info in devices {
                let cam = LocalCam::new(Arc::clone(&driver), info);
                self.reconcile(Source::Local(cam), &requested).await;
            }
        }

        for remote in self.config.remotes.clone() {
            if normalize_base(&remote) == self.url {
                tracing::debug!(remote = %remote, "Skipping self");
                continue;
            }
            match self.federation.candidates(&remote).await {
                Ok(candidates) => {
                    tracing::debug!(remote = %remote, streams = candidates.len(), "Fetched remote host");
                    for (cam, config) in candidates {
                        self.reconcile(Source::Remote(cam), &config).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(remote = %remote, error = %e, "Remote host unavailable, skipped this cycle");
                }
            }
        }
    }

    /// Place one discovered source in the registry
    async fn reconcile(&mut self, mut source: Source, requested: &VideoConfig) {
        let placement = self.registry.placement(source.path());
        if let Placement::Skip(id) = placement {
            tracing::trace!(path = %source.path(), id = id, "Already serving");
            return;
        }

        let granted = match source.open(requested).await {
            Ok(granted) => granted,
            Err(e) => {
                tracing::warn!(path = %source.path(), error = %e, "Open failed, retrying next cycle");
                return;
            }
        };

        if let Err(e) = self
            .registry
            .bind(placement, source, granted, self.config.retry, self.hooks.clone())
            .await
        {
            tracing::warn!(id = placement.id(), error = %e, "Bind failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::source::synthetic::{SyntheticCamera, SyntheticDriver};

    fn config() -> HostConfig {
        HostConfig::default()
            .addr("127.0.0.1")
            .port(9000)
            .scan_interval(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_scan_filters_driver_family() {
        let driver = Arc::new(SyntheticDriver::new());
        driver.add(SyntheticCamera::new("/dev/video0"));
        driver.add(SyntheticCamera::new("/dev/video1").with_driver("bcm2835-isp"));

        let (host, monitor) = HostBuilder::new(config()).driver(driver).spawn().unwrap();
        host.scan().await.unwrap();

        let streams = host.streams().await.unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].config.path, "/dev/video0");
        assert!(streams[0].opened);

        host.quit().await.unwrap();
        monitor.await.unwrap();
        assert!(matches!(host.streams().await, Err(Error::HostStopped)));
    }

    #[tokio::test]
    async fn test_failed_open_retried_next_scan() {
        let driver = Arc::new(SyntheticDriver::new());
        let camera = SyntheticCamera::new("/dev/video0");
        camera.fail_open(true);
        driver.add(camera.clone());

        let (host, _monitor) = HostBuilder::new(config()).driver(driver).spawn().unwrap();
        host.scan().await.unwrap();
        assert!(host.streams().await.unwrap().is_empty());

        camera.fail_open(false);
        host.scan().await.unwrap();
        let stream = host.stream("/video0").await.unwrap();
        assert!(stream.opened);

        host.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_document() {
        let config = config().remote("127.0.0.1:9");
        let (host, _monitor) = HostBuilder::new(config).spawn().unwrap();

        let state = host.state().await.unwrap();
        assert_eq!(state.url, "http://127.0.0.1:9000");
        assert_eq!(state.remotes, vec!["127.0.0.1:9".to_string()]);
        assert_eq!(state.interval, 3_600_000);
        assert!(state.streams.is_empty());

        host.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_stream() {
        let (host, _monitor) = HostBuilder::new(config()).spawn().unwrap();

        assert!(matches!(host.stream("/video0").await, Err(Error::StreamNotFound(_))));
        assert!(matches!(host.endpoint("/video0").await, Err(Error::StreamNotFound(_))));
        assert!(matches!(host.record("/video0", 5).await, Err(Error::StreamNotFound(_))));

        host.quit().await.unwrap();
    }
}
