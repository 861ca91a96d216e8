//! Integration tests for the coordinator and specialist HTTP surfaces
//!
//! Router tests drive the app through `tower::ServiceExt::oneshot`; the
//! remote transport test binds a real listener and points remote proxies at it.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use concierge_agent::{
    CapabilityRegistry, CorrelationId, Envelope, InMemoryBackend, MessageKind, SpecialistId,
    ToolBackend, Transport, builtin_entries, build_proxies, payload,
};
use concierge_coordinator::{
    Classifier, CoordinationOutcome, Coordinator, CoordinatorConfig, DispatchPolicy,
};
use concierge_http::{
    AppState, ErrorResponse, HttpConfig, SpecialistHost, coordinator_router, specialist_router,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn host() -> SpecialistHost {
    SpecialistHost::new(
        &CapabilityRegistry::builtin(),
        Arc::new(InMemoryBackend::seeded()),
    )
    .unwrap()
}

fn app() -> Router {
    let coordinator = Coordinator::from_config(&CoordinatorConfig::default()).unwrap();
    coordinator_router(AppState::new(coordinator), Some(host()), &HttpConfig::default())
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn request_envelope(recipient: &str, task: &str, content: Value) -> Envelope {
    Envelope::outbound(
        &CorrelationId::generate(),
        &SpecialistId::new(recipient),
        MessageKind::Request,
        task,
        payload(content),
    )
    .unwrap()
}

// ============================================================================
// Health and discovery
// ============================================================================

#[tokio::test]
async fn test_health_reports_specialists() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "concierge");
    assert_eq!(json["specialists"], 2);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_agents_listing() {
    let response = app()
        .oneshot(Request::builder().uri("/agents").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let agents = json["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0]["id"], "customer_data");
    assert_eq!(agents[1]["id"], "support");
}

#[tokio::test]
async fn test_agent_card_and_unknown_agent() {
    let response = app()
        .oneshot(Request::builder().uri("/agents/support").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "support");
    assert!(json["tasks"].as_array().unwrap().len() >= 3);

    let response = app()
        .oneshot(Request::builder().uri("/agents/billing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: ErrorResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(error.code, "UNKNOWN_SPECIALIST");
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_sync_query_returns_outcome() {
    let response = app()
        .oneshot(post_json(
            "/query/sync",
            &json!({"query": "Get customer information for ID 5"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let outcome: CoordinationOutcome = serde_json::from_value(body_json(response).await).unwrap();
    assert!(outcome.is_completed());
    assert!(outcome.answer.contains("Eve Davis"));
    assert_eq!(outcome.trail.len(), 2);
}

#[tokio::test]
async fn test_blank_query_rejected() {
    let response = app()
        .oneshot(post_json("/query/sync", &json!({"query": "   "})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_streamed_query_emits_events_in_order() {
    let response = app()
        .oneshot(post_json(
            "/query",
            &json!({"query": "Show me all active customers who have open tickets"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    let processing = text.find("\"processing\"").unwrap();
    let coordination = text.find("event: coordination").unwrap();
    let answer = text.find("event: response").unwrap();
    let complete = text.find("\"complete\"").unwrap();
    assert!(processing < coordination);
    assert!(coordination < answer);
    assert!(answer < complete);
    assert!(text.contains("multi_step"));
}

// ============================================================================
// Hosted specialists
// ============================================================================

#[tokio::test]
async fn test_process_envelope() {
    let request = request_envelope("customer_data", "get_customer", json!({"customer_id": 1}));
    let response = app()
        .oneshot(post_json(
            "/specialists/customer_data/process",
            &serde_json::to_value(&request).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let reply: Envelope = serde_json::from_value(body_json(response).await).unwrap();
    reply.validate_reply(&request).unwrap();
    assert_eq!(reply.kind, MessageKind::Response);
    assert_eq!(reply.content["customer"]["name"], "Alice Johnson");
}

#[tokio::test]
async fn test_process_error_statuses() {
    let cases = [
        (
            "/specialists/billing/process",
            request_envelope("billing", "get_customer", json!({"customer_id": 1})),
            StatusCode::NOT_FOUND,
        ),
        (
            "/specialists/customer_data/process",
            request_envelope("customer_data", "check_can_handle", json!({"query": "x"})),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (
            "/specialists/customer_data/process",
            request_envelope(
                "customer_data",
                "update_customer",
                json!({"customer_id": 1, "data": {}}),
            ),
            StatusCode::BAD_GATEWAY,
        ),
        (
            "/specialists/support/process",
            request_envelope("customer_data", "get_customer", json!({"customer_id": 1})),
            StatusCode::BAD_REQUEST,
        ),
    ];

    for (uri, envelope, expected) in cases {
        let response = app()
            .oneshot(post_json(uri, &serde_json::to_value(&envelope).unwrap()))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "{uri} {}", envelope.task_name());
        let error: ErrorResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert!(!error.error.is_empty());
    }
}

/// Coordinator and hosted specialists over one backend, as `concierge serve` wires them.
fn shared_app() -> (Router, Arc<dyn ToolBackend>) {
    let config = CoordinatorConfig::default();
    let backend: Arc<dyn ToolBackend> = Arc::new(InMemoryBackend::seeded());
    let coordinator = Coordinator::with_backend(&config, backend.clone()).unwrap();
    let host = SpecialistHost::with_backend(&config, backend.clone()).unwrap();
    let router = coordinator_router(
        AppState::new(coordinator),
        Some(host),
        &HttpConfig::default(),
    );
    (router, backend)
}

#[tokio::test]
async fn test_inbound_envelope_rejected_without_side_effects() {
    let (app, backend) = shared_app();
    let mut envelope = request_envelope(
        "customer_data",
        "update_customer",
        json!({"customer_id": 1, "data": {"email": "someone-else@example.com"}}),
    );
    envelope.kind = MessageKind::Response;

    let response = app
        .oneshot(post_json(
            "/specialists/customer_data/process",
            &serde_json::to_value(&envelope).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(error.code, "INVALID_ENVELOPE");

    let record = backend.get_record(1).await.unwrap().unwrap();
    assert_eq!(record.email.as_deref(), Some("alice@example.com"));
}

#[tokio::test]
async fn test_query_writes_visible_to_hosted_specialists() {
    let (app, _backend) = shared_app();
    let query = "Update my email to new@email.com and show my ticket history, id 1";

    let response = app
        .clone()
        .oneshot(post_json("/query/sync", &json!({ "query": query })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome: CoordinationOutcome = serde_json::from_value(body_json(response).await).unwrap();
    assert!(outcome.is_completed(), "{}", outcome.answer);

    let lookup = request_envelope("customer_data", "get_customer", json!({"customer_id": 1}));
    let response = app
        .oneshot(post_json(
            "/specialists/customer_data/process",
            &serde_json::to_value(&lookup).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply: Envelope = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(reply.content["customer"]["email"], "new@email.com");
}

#[tokio::test]
async fn test_specialist_only_server() {
    let host = host().only(&SpecialistId::new("support")).unwrap();
    let app = specialist_router(host, &HttpConfig::default());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["specialists"], json!(["support"]));

    let request = request_envelope("customer_data", "get_customer", json!({"customer_id": 1}));
    let response = app
        .oneshot(post_json(
            "/specialists/customer_data/process",
            &serde_json::to_value(&request).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Remote transport
// ============================================================================

#[tokio::test]
async fn test_remote_transport_matches_local() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = specialist_router(host(), &HttpConfig::default());
    tokio::spawn(async move {
        axum::serve(listener, server).await.unwrap();
    });

    let entries = builtin_entries()
        .into_iter()
        .map(|mut entry| {
            entry.endpoint = format!("http://{addr}/specialists/{}", entry.id);
            entry
        })
        .collect();
    let registry = CapabilityRegistry::new(entries).unwrap();
    let proxies = build_proxies(
        &registry,
        Transport::Remote,
        Arc::new(InMemoryBackend::new()),
        Duration::from_secs(5),
    )
    .unwrap();
    let remote = Coordinator::new(
        registry,
        proxies,
        Classifier::builtin().unwrap(),
        DispatchPolicy::default(),
    )
    .unwrap();
    let local = Coordinator::from_config(&CoordinatorConfig::default()).unwrap();

    for query in [
        "Get customer information for ID 1",
        "Show me all active customers who have open tickets",
        "I need help with upgrading my account",
        "I want a refund immediately, customer 12345",
    ] {
        let remote_outcome = remote.handle(query).await;
        let local_outcome = local.handle(query).await;
        assert_eq!(remote_outcome.answer, local_outcome.answer, "{query}");
        assert_eq!(remote_outcome.status, local_outcome.status);
        assert_eq!(remote_outcome.trail.len(), local_outcome.trail.len());
    }
}
