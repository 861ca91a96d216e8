//! Server-sent event stream for `POST /query`.
//!
//! Events, in order:
//!
//! - `status` `{"status": "processing", "pattern", "plan"}`
//! - `coordination` `{"correlation_id", "pattern", "trail"}`
//! - `response` `{"answer", "status", "failure", "statistics"}`
//! - `status` `{"status": "complete", "correlation_id"}`
//!
//! Dropping the stream drops the in-flight coordination with it.

use std::time::Duration;

use axum::{
    extract::State,
    response::{
        Json,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::Stream;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::handlers::QueryRequest;
use crate::state::AppState;

/// POST /query
pub async fn query_stream(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let query = request.into_query()?;
    let coordinator = state.coordinator.clone();

    let stream = async_stream::stream! {
        let mut guard = StreamGuard::default();
        let classification = coordinator.classify(&query);
        yield event("status", &json!({
            "status": "processing",
            "pattern": classification.pattern(),
            "plan": classification.plan,
        }));

        let outcome = coordinator.handle(&query).await;

        yield event("coordination", &json!({
            "correlation_id": outcome.correlation_id,
            "pattern": outcome.pattern,
            "trail": outcome.trail,
        }));
        yield event("response", &json!({
            "answer": outcome.answer,
            "status": outcome.status,
            "failure": outcome.failure,
            "statistics": outcome.statistics,
        }));
        yield event("status", &json!({
            "status": "complete",
            "correlation_id": outcome.correlation_id,
        }));
        guard.finished = true;
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(10))
            .text("keep-alive"),
    ))
}

fn event<T: Serialize>(name: &str, data: &T) -> Result<Event, axum::Error> {
    Event::default().event(name).json_data(data)
}

#[derive(Default)]
struct StreamGuard {
    finished: bool,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if !self.finished {
            info!("Query stream closed before completion, coordination cancelled");
        }
    }
}
