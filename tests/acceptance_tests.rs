//! # Acceptance Tests
//!
//! End-to-end requests against the built-in specialists and the seeded
//! in-memory data store, driven through the public facade.

use concierge::{
    CoordinationOutcome, Coordinator, CoordinatorConfig, MessageKind, OutcomeStatus, Pattern,
    Plan, SpecialistId,
};
use futures::future::join_all;
use rstest::{fixture, rstest};
use std::collections::HashSet;

#[fixture]
fn coordinator() -> Coordinator {
    Coordinator::from_config(&CoordinatorConfig::default()).unwrap()
}

fn assert_well_formed(outcome: &CoordinationOutcome) {
    assert!(!outcome.answer.trim().is_empty());
    assert!(outcome.trail.check_alternation().is_ok());
    assert_eq!(outcome.trail.correlation_id(), &outcome.correlation_id);
    for envelope in outcome.trail.iter() {
        assert_eq!(envelope.correlation_id, outcome.correlation_id);
        if envelope.kind.is_outbound() {
            assert!(envelope.sender.is_router());
        } else {
            assert!(envelope.recipient.is_router());
        }
    }
}

#[rstest]
#[case::lookup(
    "Get customer information for ID 5",
    Pattern::TaskAllocation,
    Plan::LookupCustomer,
    2
)]
#[case::history(
    "Show ticket history for customer 1",
    Pattern::TaskAllocation,
    Plan::CustomerHistory,
    2
)]
#[case::upgrade(
    "I'm customer 12345 and need help upgrading my account",
    Pattern::TaskAllocation,
    Plan::SupportAnswer,
    2
)]
#[case::refund(
    "I've been charged twice, please refund immediately",
    Pattern::Negotiation,
    Plan::Escalation,
    4
)]
#[case::cancel(
    "I want to cancel my subscription",
    Pattern::Negotiation,
    Plan::Escalation,
    4
)]
#[case::refund_with_context(
    "Please refund the duplicate charge, customer 3",
    Pattern::Negotiation,
    Plan::Escalation,
    6
)]
#[case::open_tickets(
    "Show me all active customers who have open tickets",
    Pattern::MultiStep,
    Plan::OpenTicketsForActive,
    4
)]
#[case::premium(
    "What's the status of all high-priority tickets for premium customers?",
    Pattern::MultiStep,
    Plan::PriorityTicketsForSegment,
    4
)]
#[case::update(
    "Update my email to new@email.com and show my ticket history, id 1",
    Pattern::MultiStep,
    Plan::UpdateThenHistory,
    4
)]
#[tokio::test]
async fn test_request_runs_expected_pattern(
    coordinator: Coordinator,
    #[case] query: &str,
    #[case] pattern: Pattern,
    #[case] plan: Plan,
    #[case] envelopes: usize,
) {
    let outcome = coordinator.handle(query).await;

    assert_eq!(outcome.status, OutcomeStatus::Completed, "{}", outcome.answer);
    assert_eq!(outcome.pattern, pattern);
    assert_eq!(outcome.plan, plan);
    assert_eq!(outcome.trail.len(), envelopes);
    assert_well_formed(&outcome);
}

#[rstest]
#[tokio::test]
async fn test_lookup_answer(coordinator: Coordinator) {
    let outcome = coordinator.handle("Get customer information for ID 5").await;
    assert!(outcome.answer.starts_with("Customer Information:"));
    assert!(outcome.answer.contains("Eve Davis"));

    let outcome = coordinator.handle("Get customer information for ID 999").await;
    assert!(outcome.is_completed());
    assert_eq!(outcome.answer, "Customer 999 not found.");
}

#[rstest]
#[tokio::test]
async fn test_escalation_declines_then_answers(coordinator: Coordinator) {
    let outcome = coordinator
        .handle("I've been charged twice, please refund immediately")
        .await;

    let kinds: Vec<_> = outcome.trail.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MessageKind::Query,
            MessageKind::Escalation,
            MessageKind::Request,
            MessageKind::Response,
        ]
    );
    assert!(outcome.answer.contains("refund"));
}

#[rstest]
#[tokio::test]
async fn test_premium_priority_report(coordinator: Coordinator) {
    let outcome = coordinator
        .handle("What's the status of all high-priority tickets for premium customers?")
        .await;

    assert!(outcome.answer.starts_with("Found 2 high-priority ticket(s)"));
    let first = &outcome.trail.envelopes()[0];
    assert_eq!(first.recipient, SpecialistId::new("customer_data"));
    assert_eq!(first.task_name(), "list_customers");
    let third = &outcome.trail.envelopes()[2];
    assert_eq!(third.recipient, SpecialistId::new("support"));
    assert_eq!(third.task_name(), "get_tickets_by_priority");
}

#[rstest]
#[tokio::test]
async fn test_unreferenced_update_falls_back_to_support(coordinator: Coordinator) {
    let outcome = coordinator
        .handle("Please update my email to someone@example.com and show my history")
        .await;

    assert_eq!(outcome.plan, Plan::SupportAnswer);
    assert_eq!(outcome.trail.len(), 2);
    assert_eq!(outcome.trail.envelopes()[0].task_name(), "handle_support");
}

#[rstest]
#[tokio::test]
async fn test_concurrent_requests_have_separate_trails(coordinator: Coordinator) {
    let queries = [
        "Get customer information for ID 1",
        "Get customer information for ID 2",
        "Show me all active customers who have open tickets",
        "I want a refund immediately, customer 12345",
        "I need help with my account",
    ];

    let outcomes = join_all(queries.iter().map(|q| coordinator.handle(q))).await;

    let ids: HashSet<_> = outcomes.iter().map(|o| o.correlation_id.clone()).collect();
    assert_eq!(ids.len(), queries.len());
    for outcome in &outcomes {
        assert_well_formed(outcome);
    }
    assert!(outcomes[0].answer.contains("Alice Johnson"));
    assert!(outcomes[1].answer.contains("Bob Smith"));
}
