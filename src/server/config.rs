//! Server configuration.
//!
//! [`ServerConfig::default`] gives the stock settings; [`ServerConfig::from_env`]
//! overlays `CRUDHTTP_*` environment variables on top of them.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Default listen address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Runtime settings for [`Server`](super::Server) and the API handlers.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use crudhttp::server::ServerConfig;
///
/// let config = ServerConfig::default()
///     .with_addr("127.0.0.1:0")
///     .with_read_timeout(Duration::from_secs(5))
///     .with_max_connections(Some(256));
///
/// assert_eq!(config.addr, "127.0.0.1:0");
/// assert_eq!(config.max_connections, Some(256));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, e.g. `0.0.0.0:8080`.
    pub addr: String,
    /// Directory uploaded files are written to and served from.
    pub upload_dir: PathBuf,
    /// HTML page served at `/`.
    pub client_page: PathBuf,
    /// Deadline for receiving one complete request.
    pub read_timeout: Duration,
    /// Upper bound on the request head (request line + headers).
    pub max_header_bytes: usize,
    /// Upper bound on a declared `Content-Length`.
    pub max_body_bytes: usize,
    /// Cap on simultaneously served connections; `None` means unbounded.
    pub max_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_owned(),
            upload_dir: PathBuf::from("uploads"),
            client_page: PathBuf::from("client.html"),
            read_timeout: Duration::from_secs(30),
            max_header_bytes: 64 * 1024,
            max_body_bytes: 64 * 1024 * 1024,
            max_connections: None,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by any of these environment variables:
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `CRUDHTTP_ADDR` | `addr` |
    /// | `CRUDHTTP_UPLOAD_DIR` | `upload_dir` |
    /// | `CRUDHTTP_CLIENT_PAGE` | `client_page` |
    /// | `CRUDHTTP_READ_TIMEOUT_SECS` | `read_timeout` |
    /// | `CRUDHTTP_MAX_BODY_BYTES` | `max_body_bytes` |
    /// | `CRUDHTTP_MAX_CONNECTIONS` | `max_connections` |
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = env::var("CRUDHTTP_ADDR") {
            config.addr = addr;
        }
        if let Ok(dir) = env::var("CRUDHTTP_UPLOAD_DIR") {
            config.upload_dir = dir.into();
        }
        if let Ok(page) = env::var("CRUDHTTP_CLIENT_PAGE") {
            config.client_page = page.into();
        }
        if let Some(secs) = parse_var::<u64>("CRUDHTTP_READ_TIMEOUT_SECS") {
            config.read_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var("CRUDHTTP_MAX_BODY_BYTES") {
            config.max_body_bytes = max;
        }
        if let Some(max) = parse_var("CRUDHTTP_MAX_CONNECTIONS") {
            config.max_connections = Some(max);
        }
        config
    }

    #[must_use]
    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Replaces the port of `addr`, keeping its host.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        let host = self
            .addr
            .rsplit_once(':')
            .map_or(self.addr.as_str(), |(host, _)| host);
        self.addr = format!("{host}:{port}");
        self
    }

    #[must_use]
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_client_page(mut self, page: impl Into<PathBuf>) -> Self {
        self.client_page = page.into();
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_header_bytes(mut self, max: usize) -> Self {
        self.max_header_bytes = max;
        self
    }

    #[must_use]
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    #[must_use]
    pub fn with_max_connections(mut self, max: Option<usize>) -> Self {
        self.max_connections = max;
        self
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}
