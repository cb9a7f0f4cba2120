//! REST API server (§6): the `netpulsed` binary's HTTP front end onto a
//! [`crate::manager::Manager`]. API-key auth, CORS, and request tracing
//! mirror `examples/original_source/netpulse/server/app.py`'s middleware
//! stack; the route surface mirrors its `routes/` package.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use auth::ApiKey;
pub use error::{ApiError, ApiResult};
pub use state::{ApiServerConfig, AppState};

/// Serves the router built from `state` until `shutdown` resolves.
pub async fn serve(
    bind: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app: Router = routes::api_routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!(%bind, "starting netpulse API server");
    let listener = TcpListener::bind(bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
