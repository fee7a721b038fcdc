//! Host configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::control::UVC_DRIVER;
use crate::error::{Error, Result};
use crate::source::VideoConfig;
use crate::stream::RetryPolicy;

/// Default config file name
pub const CONFIG_FILE: &str = "camhub.json";

/// Host configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Address to publish and bind; empty means the outbound interface
    pub host_addr: String,

    /// HTTP port
    pub host_port: u16,

    /// Peer hosts to federate with ("host:port" or a base URL)
    pub remotes: Vec<String>,

    /// Milliseconds between discovery cycles
    pub scan_interval_ms: u64,

    /// Directory recordings are written to
    pub recording_dir: PathBuf,

    /// Kernel driver family of local cameras to serve
    pub driver_family: String,

    /// Config requested when opening local cameras
    pub preferred: VideoConfig,

    /// Frames a viewer may fall behind before skipping ahead
    pub viewer_backlog: usize,

    /// Read-failure backoff of stream actors
    pub retry: RetryPolicy,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host_addr: String::new(),
            host_port: 9000,
            remotes: Vec::new(),
            scan_interval_ms: 60_000,
            recording_dir: PathBuf::from("recordings"),
            driver_family: UVC_DRIVER.to_string(),
            preferred: VideoConfig::mjpeg_1080p(),
            viewer_backlog: 4,
            retry: RetryPolicy::default(),
        }
    }
}

impl HostConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let buf = std::fs::read(path.as_ref())?;
        let config = serde_json::from_slice(&buf)?;
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let buf = serde_json::to_vec_pretty(self)?;
        std::fs::write(path.as_ref(), buf)?;
        Ok(())
    }

    /// Whether a config file exists at `path`
    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Set the published address
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.host_addr = addr.into();
        self
    }

    /// Set the HTTP port
    pub fn port(mut self, port: u16) -> Self {
        self.host_port = port;
        self
    }

    /// Add a peer host
    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remotes.push(remote.into());
        self
    }

    /// Set the scan interval
    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the recording directory
    pub fn recording_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recording_dir = dir.into();
        self
    }

    /// Set the requested local camera config
    pub fn preferred(mut self, config: VideoConfig) -> Self {
        self.preferred = config;
        self
    }

    /// Set the read-failure backoff
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Scan interval as a duration (at least 1 ms)
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }

    /// Published address, detecting the outbound interface when unset
    pub fn resolved_addr(&self) -> String {
        if self.host_addr.is_empty() {
            outbound_ip().to_string()
        } else {
            self.host_addr.clone()
        }
    }

    /// Base URL peers reach this host at
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.resolved_addr(), self.host_port)
    }

    /// Socket address the HTTP server binds
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = if self.host_addr.is_empty() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            self.host_addr
                .parse()
                .map_err(|_| Error::Config(format!("invalid host address {:?}", self.host_addr)))?
        };
        Ok(SocketAddr::new(ip, self.host_port))
    }
}

/// Address of the interface used for outbound traffic
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn outbound_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();

        assert_eq!(config.host_port, 9000);
        assert!(config.remotes.is_empty());
        assert_eq!(config.driver_family, "uvcvideo");
        assert_eq!(config.preferred, VideoConfig::mjpeg_1080p());
        assert_eq!(config.retry.threshold, 10);
    }

    #[test]
    fn test_builder_chaining() {
        let config = HostConfig::default()
            .addr("127.0.0.1")
            .port(9100)
            .remote("10.0.0.8:9000")
            .remote("10.0.0.9:9000")
            .scan_interval(Duration::from_secs(5))
            .recording_dir("/tmp/rec");

        assert_eq!(config.url(), "http://127.0.0.1:9100");
        assert_eq!(config.remotes.len(), 2);
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(config.bind_addr().unwrap(), "127.0.0.1:9100".parse().unwrap());
    }

    #[test]
    fn test_bind_addr_invalid() {
        let config = HostConfig::default().addr("not-an-ip");
        assert!(matches!(config.bind_addr(), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_addr_binds_all() {
        let config = HostConfig::default();
        assert!(config.bind_addr().unwrap().ip().is_unspecified());
        assert!(!config.resolved_addr().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert!(!HostConfig::exists(&path));

        let config = HostConfig::default().port(9200).remote("10.0.0.8:9000");
        config.save(&path).unwrap();
        assert!(HostConfig::exists(&path));

        let loaded = HostConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"host_port": 9300, "remotes": ["a:1"]}"#).unwrap();

        let loaded = HostConfig::load(&path).unwrap();
        assert_eq!(loaded.host_port, 9300);
        assert_eq!(loaded.remotes, vec!["a:1".to_string()]);
        assert_eq!(loaded.scan_interval_ms, 60_000);
    }
}
