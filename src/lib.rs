//! # crudhttp
//!
//! A minimal async HTTP/1.1 server exposing CRUD endpoints over an in-memory
//! store and upload/download endpoints over a local directory.
//!
//! Each accepted connection is served on its own Tokio task: the request is
//! framed off the socket, parsed, routed to a handler and answered, then the
//! connection is closed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use crudhttp::api::{self, AppState};
//! use crudhttp::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default().with_addr("127.0.0.1:8080");
//!     let router = api::router(Arc::new(AppState::new(&config)));
//!
//!     let server = Server::bind(config).await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.run(router).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod context;
pub mod fields;
pub mod http;
pub mod router;
pub mod server;
pub mod store;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerConfig, ServerError};
pub use store::Store;
