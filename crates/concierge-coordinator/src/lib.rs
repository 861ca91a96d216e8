//! # Concierge Coordinator - Routing Free Text to Specialists
//!
//! Turns one free-text request into a coordinated set of specialist calls
//! and a single synthesized answer.
//!
//! ## Features
//!
//! - **Classifier**: Ordered keyword trigger table with a fixed tie-break order
//! - **Dispatcher**: Envelope wrapping, per-call timeout and retry of unavailable specialists
//! - **Patterns**: Task Allocation, Negotiation/Escalation and Multi-Step state machines
//! - **Synthesis**: Template answers with "not found" substitution and degraded failure answers
//! - **Configuration**: Environment variables plus an optional YAML file
//!
//! ## Example
//!
//! ```rust,ignore
//! use concierge_coordinator::{Coordinator, CoordinatorConfigBuilder};
//!
//! let config = CoordinatorConfigBuilder::from_env()?.build()?;
//! let coordinator = Coordinator::from_config(&config)?;
//!
//! let outcome = coordinator.handle("Get customer information for ID 5").await;
//! println!("{}", outcome.answer);
//! for envelope in outcome.trail.iter() {
//!     println!("{} {} -> {}", envelope.kind, envelope.sender, envelope.recipient);
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod outcome;
pub mod patterns;
pub mod synthesis;

pub use classifier::{
    Classification, Classifier, Parameters, Pattern, Plan, TriggerClass, TriggerRule,
    default_triggers,
};
pub use config::{CoordinatorConfig, CoordinatorConfigBuilder, DEFAULT_MAX_ATTEMPTS, StaticConfig};
pub use coordinator::Coordinator;
pub use dispatch::{CallFailure, CallSpec, DispatchPolicy, Dispatcher};
pub use error::{ConfigError, CoordinatorError, CoordinatorResult};
pub use outcome::{CoordinationOutcome, FailureDescriptor, OutcomeStatus};
pub use synthesis::{Findings, NOT_FOUND, Synthesis};
