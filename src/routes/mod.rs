pub mod auth;
pub mod gateway;
pub mod health;

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    handler::HandlerWithoutStateExt,
    middleware,
    routing::{any, get},
};
use tower_http::services::ServeDir;

use crate::AppState;
use crate::constants::PROVIDER_ROUTE_PREFIX;

/// Route table: provider gateway (behind the API key check), health/version,
/// and either the static web root or the not-found envelope as fallback.
pub fn router(state: Arc<AppState>, web_root: Option<&Path>) -> Router {
    // The catch-all needs a non-empty segment, so the bare prefix is routed on its own
    let provider_routes = Router::new()
        .route(&format!("{PROVIDER_ROUTE_PREFIX}/"), any(gateway::forward))
        .route(
            &format!("{PROVIDER_ROUTE_PREFIX}/{{*path}}"),
            any(gateway::forward),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::api_key_middleware,
        ));

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .merge(provider_routes);

    let app = match web_root {
        Some(root) => app.route("/", get(health::root_redirect)).fallback_service(
            ServeDir::new(root).not_found_service(health::not_found.into_service()),
        ),
        None => app.fallback(health::not_found),
    };

    app.with_state(state)
}
