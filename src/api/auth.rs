//! API-key authentication (§6): query, header, and cookie sources are all
//! checked — the first one matching `server.api_key` wins — mirroring
//! `examples/original_source/netpulse/server/common.py`'s
//! `verify_api_key` dependency, which stacks `APIKeyQuery`/`APIKeyHeader`/
//! `APIKeyCookie` rather than picking a single transport.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;

/// Extractor that succeeds iff one of query/header/cookie carries the
/// configured API key under `server.api_key_name`. Reject with 403
/// otherwise, regardless of which source was tried.
pub struct ApiKey;

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for ApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let key_name = &state.config.api_key_name;

        if let Some(query) = parts.uri.query() {
            let matched = url::form_urlencoded::parse(query.as_bytes())
                .any(|(k, v)| k == key_name.as_str() && v == state.config.api_key.as_str());
            if matched {
                return Ok(ApiKey);
            }
        }

        if let Some(header_value) = parts.headers.get(key_name.as_str()) {
            if header_value.to_str().ok() == Some(state.config.api_key.as_str()) {
                return Ok(ApiKey);
            }
        }

        if let Some(cookie_header) = parts.headers.get(axum::http::header::COOKIE) {
            if let Ok(cookie_str) = cookie_header.to_str() {
                for pair in cookie_str.split(';') {
                    let mut parts = pair.trim().splitn(2, '=');
                    if let (Some(k), Some(v)) = (parts.next(), parts.next()) {
                        if k == key_name && v == state.config.api_key {
                            return Ok(ApiKey);
                        }
                    }
                }
            }
        }

        Err(ApiError::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::state::{AppState, ApiServerConfig};
    use crate::config::{JobConfig, WorkerConfig};
    use crate::manager::Manager;
    use crate::store::MemoryStore;
    use axum::http::{Request, Uri};

    fn test_state() -> Arc<AppState> {
        let store: Arc<dyn crate::store::StateStore> = Arc::new(MemoryStore::new());
        let manager = Arc::new(Manager::new(store.clone(), JobConfig::default(), WorkerConfig::default()));
        Arc::new(AppState {
            manager,
            store,
            config: ApiServerConfig {
                api_key: "secret123".to_string(),
                api_key_name: "X-API-KEY".to_string(),
            },
        })
    }

    #[tokio::test]
    async fn header_key_is_accepted() {
        let state = test_state();
        let req = Request::builder()
            .uri("/job")
            .header("X-API-KEY", "secret123")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        assert!(ApiKey::from_request_parts(&mut parts, &state).await.is_ok());
    }

    #[tokio::test]
    async fn query_key_is_accepted() {
        let state = test_state();
        let uri: Uri = "/job?X-API-KEY=secret123".parse().unwrap();
        let req = Request::builder().uri(uri).body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        assert!(ApiKey::from_request_parts(&mut parts, &state).await.is_ok());
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let state = test_state();
        let req = Request::builder()
            .uri("/job")
            .header("X-API-KEY", "wrong")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        assert!(ApiKey::from_request_parts(&mut parts, &state).await.is_err());
    }
}
