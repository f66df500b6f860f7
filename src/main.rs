use std::sync::Arc;

use crudhttp::api::{self, AppState};
use crudhttp::{Server, ServerConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let mut config = ServerConfig::from_env();
    if let Some(arg) = std::env::args().nth(1) {
        match arg.parse::<u16>() {
            Ok(port) => config = config.with_port(port),
            Err(_) => warn!(value = %arg, addr = %config.addr, "invalid port number, using configured address"),
        }
    }

    let router = api::router(Arc::new(AppState::new(&config)));
    let server = Server::bind(config).await?;

    info!("client page: http://{}/", server.local_addr());
    info!("  POST   /api/data/{{collection}}          create item");
    info!("  GET    /api/data/{{collection}}          list items");
    info!("  GET    /api/data/{{collection}}/{{id}}     read item");
    info!("  PUT    /api/data/{{collection}}/{{id}}     update item");
    info!("  DELETE /api/data/{{collection}}/{{id}}     delete item");
    info!("  POST   /api/files/upload               upload files");
    info!("  GET    /api/files                      list uploaded files");
    info!("  GET    /api/files/download/{{filename}}  download file");

    server
        .run_until(router, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => {
                    error!(error = %e, "cannot listen for Ctrl-C; running until killed");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    info!("server stopped");
    Ok(())
}
