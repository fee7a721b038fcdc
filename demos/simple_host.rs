//! Simple camhub host with synthetic cameras
//!
//! Run with: cargo run --example simple_host [PORT] [REMOTE...]
//!
//! Examples:
//!   cargo run --example simple_host                       # port 9000, no peers
//!   cargo run --example simple_host 9001 127.0.0.1:9000   # proxy the first host
//!
//! ## Watching
//!
//!   ffplay http://127.0.0.1:9000/video0
//!   curl http://127.0.0.1:9000/host
//!
//! ## Controls
//!
//!   curl http://127.0.0.1:9000/video0/zoomin
//!   curl http://127.0.0.1:9000/video0/reset
//!   curl "http://127.0.0.1:9000/video0/record?seconds=10"

use std::sync::Arc;
use std::time::Duration;

use camhub::source::synthetic::{SyntheticCamera, SyntheticDriver};
use camhub::{HostBuilder, HostConfig, HttpServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let port: u16 = match args.next() {
        Some(port) => port.parse()?,
        None => 9000,
    };
    let remotes: Vec<String> = args.collect();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camhub=debug".parse()?)
                .add_directive("simple_host=debug".parse()?),
        )
        .init();

    let driver = Arc::new(SyntheticDriver::new());
    driver.add(SyntheticCamera::new("/dev/video0"));
    driver.add(SyntheticCamera::new("/dev/video1"));

    let mut config = HostConfig::default()
        .addr("127.0.0.1")
        .port(port)
        .scan_interval(Duration::from_secs(10))
        .recording_dir(std::env::temp_dir().join("camhub-recordings"));
    for remote in remotes {
        config = config.remote(remote);
    }
    let bind_addr = config.bind_addr()?;

    println!("Starting camhub host on http://{}", bind_addr);
    println!();
    println!("=== Watch ===");
    println!("ffplay http://{}/video0", bind_addr);
    println!();
    println!("=== Control ===");
    println!("curl http://{}/video0/zoomin", bind_addr);
    println!();

    let (host, _monitor) = HostBuilder::new(config).driver(driver).spawn()?;
    let server = HttpServer::new(host.clone(), bind_addr);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    for stream in host.streams().await? {
        println!("{} {} opened={}", stream.url, stream.config, stream.opened);
    }
    host.quit().await?;

    Ok(())
}
