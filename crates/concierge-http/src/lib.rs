//! # Concierge HTTP - Network Surface for the Coordination Engine
//!
//! Exposes the coordinator and the built-in specialists over HTTP.
//!
//! ## Coordinator endpoints
//!
//! - `GET /health` - Liveness, version and registered specialist count
//! - `GET /agents` - Discovery listing of every registry entry
//! - `GET /agents/{id}` - One registry entry, 404 when unknown
//! - `POST /query` - `{"query": "..."}`, answered as a server-sent event stream
//! - `POST /query/sync` - Same request, answered with the full outcome as JSON
//!
//! ## Specialist endpoints
//!
//! - `POST /specialists/{id}/process` - Envelope in, reply envelope out
//!
//! Remote proxies post to these, so a coordinator running with remote
//! transport behaves the same as one calling the specialists in process.
//!
//! ## Example
//!
//! ```rust,ignore
//! use concierge_coordinator::{Coordinator, CoordinatorConfigBuilder};
//! use concierge_http::{AppState, HttpConfigBuilder, coordinator_router, serve};
//!
//! let config = CoordinatorConfigBuilder::from_env()?.build()?;
//! let http = HttpConfigBuilder::from_env()?.build()?;
//! let state = AppState::new(Coordinator::from_config(&config)?);
//! serve(http.bind_addr, coordinator_router(state, None, &http)).await?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod shutdown;
pub mod state;
pub mod streaming;

pub use config::{DEFAULT_BIND_ADDR, HttpConfig, HttpConfigBuilder};
pub use error::{ApiError, ErrorResponse, ServeError};
pub use handlers::QueryRequest;
pub use router::{coordinator_router, specialist_router};
pub use shutdown::shutdown_signal;
pub use state::{AppState, SpecialistHost};

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

/// Bind `addr` and serve `router` until SIGINT or SIGTERM.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<(), ServeError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    serve_listener(listener, router).await
}

/// Serve `router` on an already bound listener until SIGINT or SIGTERM.
pub async fn serve_listener(listener: TcpListener, router: Router) -> Result<(), ServeError> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}
