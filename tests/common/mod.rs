//! Shared harness: a host with synthetic cameras behind a real HTTP server

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use camhub::client::FederationClient;
use camhub::source::synthetic::{SyntheticCamera, SyntheticDriver};
use camhub::{Host, HostBuilder, HostConfig, HttpServer};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct TestHost {
    pub host: Host,
    pub base: String,
    pub driver: Arc<SyntheticDriver>,
    pub cameras: Vec<SyntheticCamera>,
    pub recordings: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<camhub::Result<()>>,
}

impl TestHost {
    /// Start a host serving `cameras` synthetic cameras and federating with `remotes`
    pub async fn start(cameras: usize, remotes: &[String]) -> Self {
        Self::launch(cameras, remotes, false).await
    }

    /// Start a host that also lists its own address among its remotes
    pub async fn start_self_listed(cameras: usize) -> Self {
        Self::launch(cameras, &[], true).await
    }

    async fn launch(cameras: usize, remotes: &[String], self_listed: bool) -> Self {
        let listener = tokio_test::assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = tokio_test::assert_ok!(listener.local_addr());
        let recordings = tokio_test::assert_ok!(tempfile::tempdir());

        let driver = Arc::new(SyntheticDriver::new());
        let cameras: Vec<SyntheticCamera> = (0..cameras)
            .map(|i| SyntheticCamera::new(format!("/dev/video{}", i)))
            .collect();
        for camera in &cameras {
            driver.add(camera.clone());
        }

        // Scans are driven by the tests, not the ticker
        let mut config = HostConfig::default()
            .addr("127.0.0.1")
            .port(addr.port())
            .scan_interval(Duration::from_secs(3600))
            .recording_dir(recordings.path());
        for remote in remotes {
            config = config.remote(remote.clone());
        }
        if self_listed {
            config = config.remote(addr.to_string());
        }
        let base = config.url();

        // Peers are local; a stalled one is given up on quickly
        let federation = FederationClient::new(reqwest::Client::new(), Duration::from_secs(1));
        let (host, _monitor) = tokio_test::assert_ok!(HostBuilder::new(config)
            .driver(driver.clone())
            .federation(federation)
            .spawn());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = HttpServer::new(host.clone(), addr);
        let server = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tokio_test::assert_ok!(host.scan().await);

        Self {
            host,
            base,
            driver,
            cameras,
            recordings,
            shutdown: Some(shutdown_tx),
            server,
        }
    }

    /// Host address without the scheme, as peers are configured
    pub fn addr(&self) -> String {
        self.base.trim_start_matches("http://").to_string()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Stop the monitor, then the server
    pub async fn stop(mut self) {
        tokio_test::assert_ok!(self.host.quit().await);
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let result = tokio::time::timeout(Duration::from_secs(5), self.server)
            .await
            .expect("server did not drain");
        tokio_test::assert_ok!(result.expect("server task panicked"));
    }
}

/// Serve `app` on an ephemeral port as a stand-in peer, returning its address
pub async fn spawn_peer(app: axum::Router) -> String {
    let listener = tokio_test::assert_ok!(TcpListener::bind("127.0.0.1:0").await);
    let addr = tokio_test::assert_ok!(listener.local_addr());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr.to_string()
}

/// Poll `check` until it holds, failing after five seconds
pub async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Read a live feed until a whole JPEG frame has arrived
pub async fn first_frame(response: &mut reqwest::Response) -> Vec<u8> {
    let mut buf = Vec::new();
    let read = async {
        while let Some(chunk) = response.chunk().await.expect("feed read failed") {
            buf.extend_from_slice(&chunk);
            let soi = buf.windows(2).position(|w| w == [0xFF, 0xD8]);
            let eoi = buf.windows(2).rposition(|w| w == [0xFF, 0xD9]);
            if let (Some(soi), Some(eoi)) = (soi, eoi) {
                if eoi > soi {
                    return buf[soi..eoi + 2].to_vec();
                }
            }
        }
        panic!("feed ended before a frame arrived");
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("no frame within five seconds")
}
