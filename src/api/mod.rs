//! Application routes: CRUD over the in-memory [`Store`] and file
//! upload/download over the upload directory.
//!
//! | Method   | Path                               | Handler               |
//! |----------|------------------------------------|-----------------------|
//! | `POST`   | `/api/data/{collection}`           | [`data::create`]      |
//! | `GET`    | `/api/data/{collection}/{id}`      | [`data::read`]        |
//! | `GET`    | `/api/data/{collection}`           | [`data::read_all`]    |
//! | `PUT`    | `/api/data/{collection}/{id}`      | [`data::update`]      |
//! | `DELETE` | `/api/data/{collection}/{id}`      | [`data::delete`]      |
//! | `POST`   | `/api/files/upload`                | [`files::upload`]     |
//! | `GET`    | `/api/files/download/{filename}`   | [`files::download`]   |
//! | `GET`    | `/api/files`                       | [`files::list`]       |
//! | `GET`    | `/`                                | [`files::client_page`]|

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::context::Context;
use crate::router::{IntoHandler, Router};
use crate::server::ServerConfig;
use crate::store::Store;
use crate::Response;

pub mod data;
pub mod files;

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    pub store: Store,
    pub upload_dir: PathBuf,
    pub client_page: PathBuf,
}

impl AppState {
    /// Fresh state with an empty store and the paths from `config`.
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_store(Store::new(), config)
    }

    pub fn with_store(store: Store, config: &ServerConfig) -> Self {
        Self {
            store,
            upload_dir: config.upload_dir.clone(),
            client_page: config.client_page.clone(),
        }
    }
}

/// Builds the application router.
///
/// More specific patterns are registered before the general ones that share
/// their method.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    router.post("/api/data/{collection}", with_state(&state, data::create));
    router.get("/api/data/{collection}/{id}", with_state(&state, data::read));
    router.get("/api/data/{collection}", with_state(&state, data::read_all));
    router.put("/api/data/{collection}/{id}", with_state(&state, data::update));
    router.delete("/api/data/{collection}/{id}", with_state(&state, data::delete));

    router.post("/api/files/upload", with_state(&state, files::upload));
    router.get(
        "/api/files/download/{filename}",
        with_state(&state, files::download),
    );
    router.get("/api/files", with_state(&state, files::list));
    router.get("/", with_state(&state, files::client_page));

    router
}

// Binds a shared-state handler into a plain `Fn(Context)` route handler.
fn with_state<H, F>(state: &Arc<AppState>, handler: H) -> impl IntoHandler
where
    H: Fn(Arc<AppState>, Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let state = Arc::clone(state);
    move |ctx: Context| handler(Arc::clone(&state), ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_route() {
        let state = Arc::new(AppState::new(&ServerConfig::default()));
        assert_eq!(router(state).len(), 9);
    }
}
