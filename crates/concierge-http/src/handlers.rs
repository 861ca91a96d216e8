//! Request handlers for the coordinator and hosted specialists.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use concierge_agent::{DispatchError, Envelope, RegistryEntry, SpecialistId};
use concierge_coordinator::CoordinationOutcome;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::{AppState, SpecialistHost};

/// Body of `POST /query` and `POST /query/sync`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

impl QueryRequest {
    pub(crate) fn into_query(self) -> Result<String, ApiError> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(ApiError::BadRequest("query must not be empty".to_string()));
        }
        Ok(query.to_string())
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "concierge",
            "version": env!("CARGO_PKG_VERSION"),
            "specialists": state.coordinator.registry().len(),
            "uptime_seconds": state.uptime_seconds(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// GET /agents
pub async fn list_agents(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "agents": state.coordinator.registry().list() }))
}

/// GET /agents/{id}
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RegistryEntry>, ApiError> {
    let entry = state
        .coordinator
        .registry()
        .describe(&SpecialistId::new(id))?;
    Ok(Json(entry.clone()))
}

/// POST /query/sync
pub async fn query_sync(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<CoordinationOutcome>, ApiError> {
    let query = request.into_query()?;
    Ok(Json(state.coordinator.handle(&query).await))
}

// ============================================================================
// Hosted specialists
// ============================================================================

/// GET /health on a specialist-only server
pub async fn host_health(State(host): State<SpecialistHost>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "concierge-specialist",
            "version": env!("CARGO_PKG_VERSION"),
            "specialists": host.ids(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// GET /specialists
pub async fn list_hosted(State(host): State<SpecialistHost>) -> impl IntoResponse {
    Json(json!({ "specialists": host.ids() }))
}

/// POST /specialists/{id}/process
///
/// Takes a request or query envelope and answers with the specialist's reply
/// envelope. Failures come back as `{error, code}` with 404 for an unknown
/// specialist, 422 for a rejected task and 502 for a failed one.
pub async fn process_envelope(
    State(host): State<SpecialistHost>,
    Path(id): Path<String>,
    Json(envelope): Json<Envelope>,
) -> Result<Json<Envelope>, ApiError> {
    let id = SpecialistId::new(id);
    let Some(proxy) = host.get(&id) else {
        return Err(ApiError::NotFound(format!("Specialist not found: {id}")));
    };
    if !envelope.kind.is_outbound() {
        return Err(DispatchError::InvalidEnvelope(format!(
            "a {} envelope cannot be processed",
            envelope.kind
        ))
        .into());
    }

    debug!(
        specialist = %id,
        correlation_id = %envelope.correlation_id,
        task = envelope.task_name(),
        "Processing envelope"
    );

    match proxy.invoke(&envelope).await {
        Ok(reply) => Ok(Json(reply)),
        Err(err) => {
            warn!(
                specialist = %id,
                correlation_id = %envelope.correlation_id,
                task = envelope.task_name(),
                code = err.error_code(),
                error = %err,
                "Envelope processing failed"
            );
            Err(err.into())
        }
    }
}
