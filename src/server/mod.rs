//! # Server Module
//!
//! Read-only HTTP polling API plus the WebSocket subscriber endpoint.
//!
//! This module handles:
//! - Accepting HTTP/1 connections and routing requests
//! - Upgrading `/ws` requests and handing them to the broadcaster
//! - Draining in-flight connections within a grace period on shutdown

pub mod routes;
pub mod websocket;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::config::ModemConfig;
use crate::error::Result;
use crate::shutdown::Shutdown;
use crate::store::TelemetryStore;

/// Shared handles every request handler reads from
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<TelemetryStore>,
    pub broadcaster: Broadcaster,
    /// Effective remote source settings, reported by `/stats`
    pub modem: Arc<ModemConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<TelemetryStore>, broadcaster: Broadcaster, modem: ModemConfig) -> Self {
        Self {
            store,
            broadcaster,
            modem: Arc::new(modem),
            started_at: Instant::now(),
        }
    }
}

/// HTTP/1 server bound to one listener
#[derive(Debug)]
pub struct ApiServer {
    listener: TcpListener,
    state: AppState,
    request_timeout: Duration,
    shutdown_grace: Duration,
}

impl ApiServer {
    /// Bind the listener
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound
    pub async fn bind(
        addr: SocketAddr,
        state: AppState,
        request_timeout: Duration,
        shutdown_grace: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state,
            request_timeout,
            shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until shutdown, then drain open connections
    pub async fn run(self, mut shutdown: Shutdown) -> Result<()> {
        let ApiServer {
            listener,
            state,
            request_timeout,
            shutdown_grace,
        } = self;

        info!("HTTP API listening on {}", listener.local_addr()?);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    debug!("HTTP connection from {}", peer);

                    let state = state.clone();
                    let conn_shutdown = shutdown.clone();
                    connections.spawn(serve_connection(stream, state, request_timeout, conn_shutdown));
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = shutdown.wait() => break,
            }
        }

        drop(listener);
        info!("HTTP API stopping, draining {} connection(s)", connections.len());

        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(shutdown_grace, drain).await.is_err() {
            warn!("Shutdown grace period elapsed, aborting {} connection(s)", connections.len());
            connections.abort_all();
        }

        info!("HTTP API stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    state: AppState,
    request_timeout: Duration,
    mut shutdown: Shutdown,
) {
    let service = service_fn(move |req: Request<Incoming>| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(routes::handle(req, state)) }
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(request_timeout)
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades();
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.wait() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        debug!("HTTP connection error: {}", e);
    }
}
