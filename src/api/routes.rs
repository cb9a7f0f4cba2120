//! Router wiring for §6's REST surface. Auth is enforced per-handler via
//! the [`super::auth::ApiKey`] extractor rather than a router-level layer,
//! mirroring how the original attaches `Security(verify_api_key)` per
//! route rather than globally (`/health` has no such dependency).

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::state::AppState;

pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/device/execute", post(handlers::execute_device))
        .route("/device/bulk", post(handlers::bulk_device))
        .route("/device/test-connection", post(handlers::test_connection))
        .route(
            "/job",
            get(handlers::get_jobs).delete(handlers::delete_jobs),
        )
        .route(
            "/worker",
            get(handlers::get_workers).delete(handlers::delete_workers),
        )
        .route("/health", get(handlers::health))
        .route("/template/render", post(handlers::render_template))
        .route("/template/render/:name", post(handlers::render_template))
        .route("/template/parse", post(handlers::parse_template))
        .route("/template/parse/:name", post(handlers::parse_template))
        .with_state(state)
}
