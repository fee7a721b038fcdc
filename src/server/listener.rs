//! HTTP server
//!
//! Routes:
//!
//! | Path                         | Action                                   |
//! |------------------------------|------------------------------------------|
//! | `GET /host`                  | published host state                     |
//! | `GET /videoN`                | live multipart feed (204 if not open)    |
//! | `GET /videoN/record?seconds` | start recording (default 60 s, max 1 day)|
//! | `GET /videoN/record/stop`    | stop recording                           |
//! | `GET /videoN/reset`          | reset controls to defaults               |
//! | `GET /videoN/<control>`      | adjust a control, e.g. `/zoomin`         |
//!
//! Stream lookups go through the host monitor. Control and recording
//! failures are logged and answered with an empty 204.

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::control::ControlReply;
use crate::error::Result;
use crate::host::{Host, HostState};
use crate::stream::{DEFAULT_RECORD_SECS, MAX_RECORD_SECS};

/// HTTP front of a host
pub struct HttpServer {
    host: Host,
    bind_addr: SocketAddr,
}

#[derive(Debug, Deserialize)]
struct RecordQuery {
    seconds: Option<u64>,
}

impl HttpServer {
    /// Create a server for `host` bound to `bind_addr`
    pub fn new(host: Host, bind_addr: SocketAddr) -> Self {
        Self { host, bind_addr }
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/host", get(host_state))
            .route("/:stream", get(stream_feed))
            .route("/:stream/*rest", get(stream_action))
            .layer(TraceLayer::new_for_http())
            .with_state(self.host.clone())
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(addr = %listener.local_addr()?, url = %self.host.url(), "HTTP server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await?;
        Ok(())
    }
}

async fn host_state(State(host): State<Host>) -> Result<Json<HostState>> {
    Ok(Json(host.state().await?))
}

async fn stream_feed(State(host): State<Host>, Path(stream): Path<String>) -> Result<Response> {
    let endpoint = host.endpoint(&stream).await?;
    if !endpoint.is_busy() {
        tracing::debug!(stream = %endpoint.url(), "Stream not open");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(endpoint.hub().stream())
}

async fn stream_action(
    State(host): State<Host>,
    Path((stream, rest)): Path<(String, String)>,
    Query(query): Query<RecordQuery>,
) -> Result<Response> {
    let endpoint = host.endpoint(&stream).await?;
    let url = endpoint.url().to_string();
    let rest = rest.trim_matches('/');

    match rest {
        "record" => {
            let seconds = query.seconds.unwrap_or(DEFAULT_RECORD_SECS).min(MAX_RECORD_SECS);
            match host.record(&url, seconds).await {
                Ok(()) => Ok(Json(json!({ "stream": url, "recording": true, "seconds": seconds })).into_response()),
                Err(e) => {
                    tracing::warn!(stream = %url, error = %e, "Record request failed");
                    Ok(StatusCode::NO_CONTENT.into_response())
                }
            }
        }
        "record/stop" => match host.stop_record(&url).await {
            Ok(()) => Ok(Json(json!({ "stream": url, "recording": false })).into_response()),
            Err(e) => {
                tracing::warn!(stream = %url, error = %e, "Stop record request failed");
                Ok(StatusCode::NO_CONTENT.into_response())
            }
        },
        _ => {
            let sub_path = format!("/{}", rest);
            let Some(control) = endpoint.control() else {
                tracing::warn!(stream = %url, control = %sub_path, "Control request on a closed stream");
                return Ok(StatusCode::NO_CONTENT.into_response());
            };

            match control.handle(host.control_table(), &sub_path).await {
                Ok(ControlReply::Value(value)) => Ok(Json(value).into_response()),
                Ok(ControlReply::Reset) => Ok(StatusCode::NO_CONTENT.into_response()),
                Ok(ControlReply::Relayed(body)) if body.is_empty() => {
                    Ok(StatusCode::NO_CONTENT.into_response())
                }
                Ok(ControlReply::Relayed(body)) => Ok((
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "application/json")],
                    body,
                )
                    .into_response()),
                Err(e) => {
                    tracing::warn!(stream = %url, control = %sub_path, error = %e, "Control request failed");
                    Ok(StatusCode::NO_CONTENT.into_response())
                }
            }
        }
    }
}
