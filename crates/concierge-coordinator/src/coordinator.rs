//! The router: classify, drive one pattern, synthesize.

use concierge_agent::{
    CapabilityRegistry, CoordinationTrail, CorrelationId, DispatchError, ProxyMap, ToolBackend,
    build_proxies,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::classifier::{Classification, Classifier};
use crate::config::CoordinatorConfig;
use crate::dispatch::{DispatchPolicy, Dispatcher};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::outcome::{CoordinationOutcome, FailureDescriptor, OutcomeStatus};
use crate::patterns::{self, Conclusion};

/// Coordination engine entry point.
///
/// Cloning is cheap; clones share the read-only registry, proxies and
/// classifier. Each request owns its own trail.
#[derive(Clone)]
pub struct Coordinator {
    classifier: Arc<Classifier>,
    dispatcher: Arc<Dispatcher>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("specialists", &self.dispatcher.registry().len())
            .field("policy", &self.dispatcher.policy())
            .finish()
    }
}

impl Coordinator {
    /// Assemble a coordinator, validating the wiring.
    ///
    /// Fails when a registered specialist has no proxy, a proxy serves an
    /// unregistered specialist, a specialist declares a task its kind does not
    /// implement, or a plan the classifier can select needs an unregistered task.
    pub fn new(
        registry: CapabilityRegistry,
        proxies: ProxyMap,
        classifier: Classifier,
        policy: DispatchPolicy,
    ) -> CoordinatorResult<Self> {
        validate(&registry, &proxies, &classifier)?;
        let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(proxies), policy);
        Ok(Self {
            classifier: Arc::new(classifier),
            dispatcher: Arc::new(dispatcher),
        })
    }

    /// Build everything from configuration.
    pub fn from_config(config: &CoordinatorConfig) -> CoordinatorResult<Self> {
        Self::with_backend(config, config.tool_backend()?)
    }

    /// Build from configuration around an existing tool backend, so local
    /// specialists hosted elsewhere in the process see the same data.
    pub fn with_backend(
        config: &CoordinatorConfig,
        backend: Arc<dyn ToolBackend>,
    ) -> CoordinatorResult<Self> {
        let static_config = config.load_static()?;
        let registry = static_config.registry()?;
        let classifier = match static_config.triggers {
            Some(triggers) => Classifier::new(triggers)?,
            None => Classifier::builtin()?,
        };
        let proxies = build_proxies(&registry, config.transport, backend, config.call_timeout)?;

        info!(
            specialists = registry.len(),
            transport = %config.transport,
            call_timeout = %humantime::format_duration(config.call_timeout),
            max_attempts = config.max_attempts,
            "Coordinator configured"
        );
        Self::new(registry, proxies, classifier, DispatchPolicy::from(config))
    }

    /// Registry shared by every request.
    pub fn registry(&self) -> &CapabilityRegistry {
        self.dispatcher.registry()
    }

    /// Classify without executing.
    pub fn classify(&self, query: &str) -> Classification {
        self.classifier.classify(query)
    }

    /// Run one coordination pass to completion.
    ///
    /// Specialist failures never surface as errors: they end the pattern in
    /// its failed state and are described in the outcome.
    pub async fn handle(&self, query: &str) -> CoordinationOutcome {
        let classification = self.classifier.classify(query);
        let mut trail = CoordinationTrail::new(CorrelationId::generate());
        let pattern = classification.pattern();

        info!(
            correlation_id = %trail.correlation_id(),
            pattern = %pattern,
            plan = %classification.plan,
            "Coordination started"
        );

        let conclusion = patterns::execute(&self.dispatcher, &mut trail, &classification).await;
        let (status, synthesis, failure) = match conclusion {
            Conclusion::Done(synthesis) => (OutcomeStatus::Completed, synthesis, None),
            Conclusion::Failed { failure, synthesis } => (
                OutcomeStatus::Failed,
                synthesis,
                Some(FailureDescriptor::from(&failure)),
            ),
        };

        match &failure {
            None => info!(
                correlation_id = %trail.correlation_id(),
                pattern = %pattern,
                envelopes = trail.len(),
                "Coordination completed"
            ),
            Some(failure) => warn!(
                correlation_id = %trail.correlation_id(),
                pattern = %pattern,
                task = %failure.task,
                code = %failure.code,
                envelopes = trail.len(),
                "Coordination failed"
            ),
        }

        CoordinationOutcome {
            correlation_id: trail.correlation_id().clone(),
            pattern,
            plan: classification.plan,
            status,
            answer: synthesis.answer,
            failure,
            trail,
            statistics: synthesis.statistics,
        }
    }

    /// Run one coordination pass unless `cancelled` resolves first.
    ///
    /// On cancellation the in-flight call is dropped together with the
    /// partial trail; no answer is produced.
    pub async fn handle_with_cancel<C>(
        &self,
        query: &str,
        cancelled: C,
    ) -> CoordinatorResult<CoordinationOutcome>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancelled => {
                info!("Coordination cancelled by caller");
                Err(CoordinatorError::Cancelled)
            }
            outcome = self.handle(query) => Ok(outcome),
        }
    }
}

fn validate(
    registry: &CapabilityRegistry,
    proxies: &ProxyMap,
    classifier: &Classifier,
) -> Result<(), DispatchError> {
    for entry in registry.list() {
        let Some(proxy) = proxies.get(&entry.id) else {
            return Err(DispatchError::InvalidRegistry(format!(
                "specialist '{}' has no proxy",
                entry.id
            )));
        };
        if proxy.specialist() != &entry.id {
            return Err(DispatchError::InvalidRegistry(format!(
                "proxy registered for '{}' serves '{}'",
                entry.id,
                proxy.specialist()
            )));
        }
        if let Some(task) = entry.unimplemented_tasks().first() {
            return Err(DispatchError::rejected(
                &entry.id,
                *task,
                format!("a {} specialist does not implement it", entry.kind),
            ));
        }
    }

    if let Some(stray) = proxies.keys().find(|id| !registry.contains(id)) {
        return Err(DispatchError::unknown_specialist(stray.as_str()));
    }

    for plan in classifier.plans() {
        for task in plan.required_tasks() {
            registry.resolve(task)?;
        }
    }
    Ok(())
}
