//! Property-Based Tests for Trail Integrity and Classification
//!
//! Arbitrary request text is run end to end against the built-in
//! specialists; whatever pattern is chosen, the resulting trail must stay
//! well formed and the answer must never be empty.

use concierge::{Coordinator, CoordinatorConfig, Pattern};
use concierge_agent::testing::{StubBehavior, StubProxy};
use concierge_agent::{CapabilityRegistry, ProxyMap, SpecialistProxy};
use concierge_coordinator::{Classifier, DispatchPolicy, OutcomeStatus};
use proptest::prelude::*;
use std::sync::Arc;

// Strategy mixing trigger words with noise so every plan gets exercised
fn request_strategy() -> impl Strategy<Value = String> {
    let words = prop::sample::select(vec![
        "customer", "id", "refund", "immediately", "history", "tickets", "open", "active",
        "customers", "who", "have", "premium", "high-priority", "and", "update", "email",
        "help", "upgrade", "show", "all", "1", "2", "12345", "new@email.com", "the", "my",
    ]);
    prop::collection::vec(words, 0..12).prop_map(|words| words.join(" "))
}

fn local() -> Coordinator {
    Coordinator::from_config(&CoordinatorConfig::default()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: every trail alternates outbound and inbound envelopes under one correlation id
    #[test]
    fn prop_trail_alternates(query in request_strategy()) {
        let outcome = tokio_test::block_on(local().handle(&query));

        prop_assert!(outcome.trail.check_alternation().is_ok());
        prop_assert_eq!(outcome.trail.len() % 2, 0);
        for envelope in outcome.trail.iter() {
            prop_assert_eq!(&envelope.correlation_id, &outcome.correlation_id);
        }
        prop_assert!(!outcome.answer.trim().is_empty());
    }

    /// Property: the executed pattern is the one classification predicts
    #[test]
    fn prop_outcome_matches_classification(query in request_strategy()) {
        let coordinator = local();
        let classification = coordinator.classify(&query);
        let outcome = tokio_test::block_on(coordinator.handle(&query));

        prop_assert_eq!(outcome.pattern, classification.pattern());
        prop_assert_eq!(outcome.plan, classification.plan);
    }

    /// Property: an always-unavailable specialist costs exactly two attempts per call
    /// and still yields a degraded answer
    #[test]
    fn prop_unavailable_specialists_degrade(query in request_strategy()) {
        let data = Arc::new(StubProxy::new("customer_data").otherwise(StubBehavior::Unavailable));
        let support = Arc::new(StubProxy::new("support").otherwise(StubBehavior::Unavailable));
        let mut proxies = ProxyMap::new();
        proxies.insert(data.specialist().clone(), data.clone() as Arc<dyn SpecialistProxy>);
        proxies.insert(support.specialist().clone(), support.clone() as Arc<dyn SpecialistProxy>);

        let coordinator = Coordinator::new(
            CapabilityRegistry::builtin(),
            proxies,
            Classifier::builtin().unwrap(),
            DispatchPolicy::default(),
        )
        .unwrap();

        let outcome = tokio_test::block_on(coordinator.handle(&query));

        prop_assert_eq!(outcome.status, OutcomeStatus::Failed);
        prop_assert_eq!(data.total_attempts() + support.total_attempts(), 2);
        prop_assert_eq!(outcome.trail.len(), 4);
        let failure = outcome.failure.unwrap();
        prop_assert_eq!(failure.attempts, 2);
        prop_assert_eq!(failure.code.as_str(), "SPECIALIST_UNAVAILABLE");
        prop_assert!(!outcome.answer.is_empty());
    }

    /// Property: escalation words always win regardless of surrounding text
    #[test]
    fn prop_escalation_wins(query in request_strategy()) {
        let coordinator = local();
        let escalated = format!("{query} refund");
        prop_assert_eq!(coordinator.classify(&escalated).pattern(), Pattern::Negotiation);
    }
}
