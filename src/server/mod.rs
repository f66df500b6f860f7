//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and serves exactly one HTTP/1.1 request per
//! connection on its own Tokio task: frame → parse → route → respond → close.
//! Connections are not kept alive.
//!
//! Every response carries `Access-Control-Allow-Origin: *`. When
//! [`ServerConfig::max_connections`] is set, the accept loop waits for a free
//! slot before accepting the next connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::http::{Request, Response, StatusCode};
use crate::router::Router;

pub mod config;
pub mod framer;

pub use config::ServerConfig;
use framer::{FrameError, FrameLimits};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// The crudhttp HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use crudhttp::server::{Server, ServerConfig};
/// use crudhttp::{Response, Router, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::new();
///     router.get("/", |_ctx| async { Response::new(StatusCode::Ok).body("Hello!") });
///
///     let server = Server::bind(ServerConfig::default().with_addr("127.0.0.1:8080")).await?;
///     server.run(router).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
}

impl Server {
    /// Binds the server to `config.addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.addr.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves connections with `router` until the process is terminated.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run(self, router: Router) -> Result<(), ServerError> {
        self.run_until(router, std::future::pending()).await
    }

    /// Serves connections until `shutdown` resolves, then stops accepting and
    /// waits for every in-flight connection to finish.
    pub async fn run_until<S>(self, router: Router, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        let router = Arc::new(router);
        let limits = FrameLimits::from(&self.config);
        let slots = self
            .config
            .max_connections
            .map(|max| Arc::new(Semaphore::new(max)));
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        info!(
            address = %self.local_addr,
            max_connections = ?self.config.max_connections,
            "crudhttp listening"
        );

        loop {
            let permit = match &slots {
                Some(slots) => tokio::select! {
                    permit = Arc::clone(slots).acquire_owned() => permit.ok(),
                    _ = &mut shutdown => break,
                },
                None => None,
            };

            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = &mut shutdown => break,
            };
            let (stream, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let router = Arc::clone(&router);

            connections.spawn(async move {
                let _permit = permit;
                if let Err(e) = serve_connection(stream, peer_addr, &router, limits).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });

            // Reap finished tasks so the set only tracks live connections.
            while connections.try_join_next().is_some() {}
        }

        info!(
            in_flight = connections.len(),
            "shutting down; waiting for open connections"
        );
        while connections.join_next().await.is_some() {}
        Ok(())
    }
}

/// Serves a single request on `stream` and closes it.
///
/// A peer that disconnects before sending anything gets no response. A request
/// that is not received within the read deadline gets `408`, one that exceeds
/// the size limits gets `413`; everything else goes through `router`.
pub async fn serve_connection<S>(
    mut stream: S,
    peer_addr: SocketAddr,
    router: &Router,
    limits: FrameLimits,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let start = Instant::now();

    let (method, path, mut response) = match framer::read_message(&mut stream, &limits).await {
        Ok(raw) => {
            let request = Request::parse(&raw);
            let method = request.method().to_string();
            let path = request.path().to_owned();
            debug!(peer = %peer_addr, %method, %path, "dispatching request");
            (method, path, router.route(request).await)
        }
        Err(FrameError::Closed) => {
            debug!(peer = %peer_addr, "connection closed by peer");
            return Ok(());
        }
        Err(FrameError::Io(e)) => return Err(e),
        Err(e @ FrameError::Timeout(_)) => {
            warn!(peer = %peer_addr, error = %e, "request timed out");
            let response = Response::error(StatusCode::RequestTimeout, e.to_string());
            ("-".to_owned(), "-".to_owned(), response)
        }
        Err(e @ FrameError::TooLarge { .. }) => {
            warn!(peer = %peer_addr, error = %e, "request too large");
            let response = Response::error(StatusCode::PayloadTooLarge, e.to_string());
            ("-".to_owned(), "-".to_owned(), response)
        }
    };

    if !response.headers().contains("access-control-allow-origin") {
        response.set_header("Access-Control-Allow-Origin", "*");
    }
    let status = response.status().as_u16();

    let (head, payload) = response.into_parts();
    stream.write_all(&head).await?;
    if let Some(payload) = payload {
        stream.write_all(&payload).await?;
    }
    stream.flush().await?;
    stream.shutdown().await?;

    info!("{} {} - {} ({:?})", method, path, status, start.elapsed());
    Ok(())
}
