//! Shared application state for the REST API: the dispatcher, a direct
//! handle on the store (for `/job`, `/worker` listing, which reach past
//! the `Manager`'s dispatch surface), and the API-key configuration the
//! [`super::auth::ApiKey`] extractor checks requests against.

use std::sync::Arc;

use crate::manager::Manager;
use crate::store::StateStore;

/// Just the `server.*` fields the API layer itself needs; the rest of
/// [`crate::config::ServerConfig`] (bind address, worker count) is
/// consumed by the binary that builds this state.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub api_key: String,
    pub api_key_name: String,
}

pub struct AppState {
    pub manager: Arc<Manager>,
    pub store: Arc<dyn StateStore>,
    pub config: ApiServerConfig,
}

impl AppState {
    pub fn new(manager: Arc<Manager>, store: Arc<dyn StateStore>, config: ApiServerConfig) -> Self {
        Self { manager, store, config }
    }
}
