//! # Concierge
//!
//! Routes one free-text customer request to the right specialist agents,
//! coordinates them through one of three interaction patterns and returns a
//! single synthesized answer together with the trail of messages exchanged.
//!
//! ## Crates
//!
//! - [`agent`]: registry, message envelopes, coordination trail, specialists and proxies
//! - [`coordinator`]: classification, dispatch with timeout and retry, patterns, synthesis
//! - [`http`]: HTTP surface for queries, discovery and hosted specialists
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use concierge::{Coordinator, CoordinatorConfig};
//!
//! let coordinator = Coordinator::from_config(&CoordinatorConfig::default())?;
//! let outcome = coordinator
//!     .handle("Show me all active customers who have open tickets")
//!     .await;
//!
//! println!("{}", outcome.answer);
//! assert!(outcome.trail.check_alternation().is_ok());
//! ```

pub use concierge_agent as agent;
pub use concierge_coordinator as coordinator;
pub use concierge_http as http;

pub use concierge_agent::{
    CapabilityRegistry, CoordinationTrail, CorrelationId, DispatchError, Envelope, MessageKind,
    RegistryEntry, SpecialistId, Transport,
};
pub use concierge_coordinator::{
    CoordinationOutcome, Coordinator, CoordinatorConfig, CoordinatorConfigBuilder,
    CoordinatorError, OutcomeStatus, Pattern, Plan,
};
