//! Route tables for the coordinator and specialist servers.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::HttpConfig;
use crate::handlers::{
    get_agent, health, host_health, list_agents, list_hosted, process_envelope, query_sync,
};
use crate::state::{AppState, SpecialistHost};
use crate::streaming::query_stream;

/// Coordinator routes, optionally serving hosted specialists on the same port.
///
/// - `GET /health`
/// - `GET /agents`, `GET /agents/{id}`
/// - `POST /query` (SSE), `POST /query/sync`
/// - `GET /specialists`, `POST /specialists/{id}/process` when `host` is given
pub fn coordinator_router(
    state: AppState,
    host: Option<SpecialistHost>,
    config: &HttpConfig,
) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/agents", get(list_agents))
        .route("/agents/{id}", get(get_agent))
        .route("/query", post(query_stream))
        .route("/query/sync", post(query_sync))
        .with_state(state);

    if let Some(host) = host {
        router = router.merge(specialist_routes().with_state(host));
    }

    apply_layers(router, config)
}

/// Standalone server for one or more hosted specialists.
pub fn specialist_router(host: SpecialistHost, config: &HttpConfig) -> Router {
    let router = specialist_routes()
        .route("/health", get(host_health))
        .with_state(host);
    apply_layers(router, config)
}

fn specialist_routes() -> Router<SpecialistHost> {
    Router::new()
        .route("/specialists", get(list_hosted))
        .route("/specialists/{id}/process", post(process_envelope))
}

fn apply_layers(router: Router, config: &HttpConfig) -> Router {
    let mut router = router
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}
