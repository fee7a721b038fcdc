//! camhub host binary
//!
//! ```text
//! camhub -p 9000 -r 10.0.0.8:9000 -r 10.0.0.9:9000 -o /srv/recordings
//! ```
//!
//! Settings are read from `camhub.json` (or `--config`) when it exists;
//! flags override them and `--update` writes the result back.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, ArgAction, Command};

use camhub::source::synthetic::{SyntheticCamera, SyntheticDriver};
use camhub::source::DeviceDriver;
use camhub::{HostBuilder, HostConfig, HttpServer};

fn cli() -> Command {
    Command::new("camhub")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Serves local and federated cameras as MJPEG over HTTP")
        .arg(
            Arg::new("addr")
                .short('a')
                .long("addr")
                .help("host ip address"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_parser(clap::value_parser!(u16))
                .help("host ip port number"),
        )
        .arg(
            Arg::new("remote")
                .short('r')
                .long("remote")
                .action(ArgAction::Append)
                .help("remote host address (repeatable)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("recording directory path"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_parser(clap::value_parser!(u64))
                .help("scan interval in milliseconds"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .default_value(camhub::server::CONFIG_FILE)
                .help("configuration file"),
        )
        .arg(
            Arg::new("update")
                .short('u')
                .long("update")
                .action(ArgAction::SetTrue)
                .help("write the effective settings back to the configuration file"),
        )
        .arg(
            Arg::new("synthetic")
                .long("synthetic")
                .value_parser(clap::value_parser!(usize))
                .help("serve N synthetic test cameras instead of capture hardware"),
        )
}

fn load_config(matches: &clap::ArgMatches) -> Result<HostConfig, Box<dyn std::error::Error>> {
    let path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(camhub::server::CONFIG_FILE);

    let mut config = if HostConfig::exists(path) {
        HostConfig::load(path)?
    } else {
        HostConfig::default()
    };

    if let Some(addr) = matches.get_one::<String>("addr") {
        config.host_addr = addr.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.host_port = *port;
    }
    if let Some(remotes) = matches.get_many::<String>("remote") {
        config.remotes = remotes.cloned().collect();
    }
    if let Some(output) = matches.get_one::<String>("output") {
        config.recording_dir = output.into();
    }
    if let Some(interval) = matches.get_one::<u64>("interval") {
        config.scan_interval_ms = *interval;
    }

    if matches.get_flag("update") {
        let existed = HostConfig::exists(path);
        config.save(path)?;
        if existed {
            tracing::info!(path = %path, "Updated configuration file");
        } else {
            tracing::info!(path = %path, "Created configuration file");
        }
    }

    Ok(config)
}

fn driver(matches: &clap::ArgMatches) -> Option<Arc<dyn DeviceDriver>> {
    if let Some(count) = matches.get_one::<usize>("synthetic") {
        let driver = SyntheticDriver::new();
        for i in 0..*count {
            driver.add(SyntheticCamera::new(format!("/dev/video{}", i)));
        }
        return Some(Arc::new(driver));
    }

    #[cfg(feature = "v4l2")]
    {
        Some(Arc::new(camhub::source::v4l2::V4l2Driver::new()))
    }
    #[cfg(not(feature = "v4l2"))]
    {
        tracing::warn!("Built without capture support, serving remote hosts only");
        None
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let matches = cli().get_matches();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camhub=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let config = load_config(&matches)?;
    let bind_addr = config.bind_addr()?;

    let mut builder = HostBuilder::new(config);
    if let Some(driver) = driver(&matches) {
        builder = builder.driver(driver);
    }
    let (host, mut monitor) = builder.spawn()?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = HttpServer::new(host.clone(), bind_addr);
    let mut server_task = tokio::spawn(async move {
        server
            .run_until(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let mut server_done = false;
    let code = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            ExitCode::SUCCESS
        }
        result = &mut server_task => {
            server_done = true;
            match result {
                Ok(Ok(())) => ExitCode::SUCCESS,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "HTTP server failed");
                    ExitCode::FAILURE
                }
                Err(e) => {
                    tracing::error!(error = %e, "HTTP server panicked");
                    ExitCode::FAILURE
                }
            }
        }
        result = &mut monitor => {
            // The monitor only exits on its own if it panicked
            tracing::error!(error = ?result.err(), "Host monitor died");
            return Ok(ExitCode::FAILURE);
        }
    };

    // Stop actors first so live feeds end and the server can drain
    if let Err(e) = host.quit().await {
        tracing::warn!(error = %e, "Host monitor already stopped");
    }
    let _ = shutdown_tx.send(());
    if !server_done && tokio::time::timeout(Duration::from_secs(5), server_task).await.is_err() {
        tracing::warn!("HTTP server did not drain in time");
    }

    Ok(code)
}
