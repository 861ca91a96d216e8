//! Specialist calls as the coordinator sees them.
//!
//! The [`Dispatcher`] resolves a task through the capability registry, wraps
//! the call in envelopes, bounds it with the call timeout and retries it while
//! the specialist is unavailable. Every attempt lands in the request's trail as
//! an outbound envelope followed by its reply, or by a failure receipt when no
//! reply arrived.

use concierge_agent::{
    CapabilityRegistry, CoordinationTrail, DispatchError, Envelope, MessageKind, Payload,
    ProxyMap, SpecialistId, payload,
};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::{CoordinatorConfig, DEFAULT_MAX_ATTEMPTS};

/// Timeout and retry settings for specialist calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub call_timeout: Duration,
    pub max_attempts: u32,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            call_timeout: concierge_agent::DEFAULT_CALL_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl From<&CoordinatorConfig> for DispatchPolicy {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            call_timeout: config.call_timeout,
            max_attempts: config.max_attempts,
        }
    }
}

/// A specialist call that did not produce a usable reply.
#[derive(Debug, Error)]
#[error("{task} failed after {attempts} attempt(s): {error}")]
pub struct CallFailure {
    /// Addressed specialist, if the task resolved
    pub specialist: Option<SpecialistId>,
    pub task: String,
    pub error: DispatchError,
    pub attempts: u32,
}

impl CallFailure {
    fn before_delivery(
        task: &str,
        specialist: Option<&SpecialistId>,
        error: DispatchError,
    ) -> Self {
        Self {
            specialist: specialist.cloned(),
            task: task.to_string(),
            error,
            attempts: 0,
        }
    }
}

/// One call in a concurrent batch.
#[derive(Debug, Clone)]
pub struct CallSpec {
    pub kind: MessageKind,
    pub task: String,
    pub content: Payload,
}

impl CallSpec {
    pub fn request(task: impl Into<String>, content: Payload) -> Self {
        Self {
            kind: MessageKind::Request,
            task: task.into(),
            content,
        }
    }
}

/// Resolves, wraps, bounds and retries specialist calls.
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    proxies: Arc<ProxyMap>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        proxies: Arc<ProxyMap>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            registry,
            proxies,
            policy,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Specialist serving `task`.
    pub fn resolve(&self, task: &str) -> Result<SpecialistId, CallFailure> {
        self.registry.resolve(task).cloned().map_err(|e| {
            error!(task, error = %e, "Task does not resolve to any specialist");
            CallFailure::before_delivery(task, None, e)
        })
    }

    /// Resolve `task` and invoke it.
    pub async fn invoke(
        &self,
        trail: &mut CoordinationTrail,
        kind: MessageKind,
        task: &str,
        content: Payload,
    ) -> Result<Envelope, CallFailure> {
        let specialist = self.resolve(task)?;
        self.invoke_on(trail, &specialist, kind, task, content).await
    }

    /// Invoke `task` on an already resolved specialist.
    ///
    /// Only `SpecialistUnavailable` (including timeouts) is retried, with the
    /// same payload. Application errors and rejections end the call at once.
    pub async fn invoke_on(
        &self,
        trail: &mut CoordinationTrail,
        specialist: &SpecialistId,
        kind: MessageKind,
        task: &str,
        content: Payload,
    ) -> Result<Envelope, CallFailure> {
        let Some(proxy) = self.proxies.get(specialist) else {
            let err = DispatchError::unknown_specialist(specialist.as_str());
            error!(specialist = %specialist, task, "No proxy for specialist");
            return Err(CallFailure::before_delivery(task, Some(specialist), err));
        };

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = Envelope::outbound(
                trail.correlation_id(),
                specialist,
                kind,
                task,
                content.clone(),
            )
            .and_then(|request| {
                self.registry.check_envelope(&request)?;
                Ok(request)
            })
            .map_err(|e| CallFailure::before_delivery(task, Some(specialist), e))?;

            debug!(
                correlation_id = %trail.correlation_id(),
                specialist = %specialist,
                task,
                attempt,
                transport = %proxy.transport(),
                "Invoking specialist"
            );

            let delivery = tokio::time::timeout(self.policy.call_timeout, proxy.invoke(&request));
            let result = match delivery.await {
                Ok(Ok(reply)) => reply.validate_reply(&request).map(|_| reply),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(DispatchError::unavailable(
                    specialist,
                    format!(
                        "no reply within {}",
                        humantime::format_duration(self.policy.call_timeout)
                    ),
                )),
            };

            let err = match result {
                Ok(reply) => {
                    record_pair(trail, request, reply.clone(), task, specialist, attempt)?;
                    return Ok(reply);
                }
                Err(e) => e,
            };

            let receipt = failure_receipt(&request, &err).map_err(|error| CallFailure {
                specialist: Some(specialist.clone()),
                task: task.to_string(),
                error,
                attempts: attempt,
            })?;
            record_pair(trail, request, receipt, task, specialist, attempt)?;

            if err.is_retryable() && attempt < max_attempts {
                warn!(
                    correlation_id = %trail.correlation_id(),
                    specialist = %specialist,
                    task,
                    attempt,
                    error = %err,
                    "Specialist unavailable, retrying"
                );
                continue;
            }

            if err.is_configuration_fault() {
                error!(
                    correlation_id = %trail.correlation_id(),
                    specialist = %specialist,
                    task,
                    attempt,
                    error = %err,
                    "Specialist call rejected"
                );
            } else {
                warn!(
                    correlation_id = %trail.correlation_id(),
                    specialist = %specialist,
                    task,
                    attempt,
                    error = %err,
                    "Specialist call failed"
                );
            }
            return Err(CallFailure {
                specialist: Some(specialist.clone()),
                task: task.to_string(),
                error: err,
                attempts: attempt,
            });
        }
    }

    /// Run independent calls concurrently.
    ///
    /// Each call's envelopes are appended to `trail` as one contiguous block,
    /// in the order the calls were given. Results come back in the same order.
    pub async fn invoke_all(
        &self,
        trail: &mut CoordinationTrail,
        calls: Vec<CallSpec>,
    ) -> Vec<Result<Envelope, CallFailure>> {
        let correlation_id = trail.correlation_id().clone();
        let runs = calls.into_iter().map(|call| {
            let mut local = CoordinationTrail::new(correlation_id.clone());
            async move {
                let result = self.invoke(&mut local, call.kind, &call.task, call.content).await;
                (local, result)
            }
        });

        let mut results = Vec::new();
        for (local, result) in join_all(runs).await {
            let merged = local
                .into_envelopes()
                .into_iter()
                .try_for_each(|envelope| trail.record(envelope));
            match merged {
                Ok(()) => results.push(result),
                Err(e) => results.push(Err(CallFailure::before_delivery("", None, e))),
            }
        }
        results
    }
}

/// Stand-in reply recorded when an attempt produced no usable envelope.
fn failure_receipt(request: &Envelope, err: &DispatchError) -> Result<Envelope, DispatchError> {
    let content = payload(json!({
        "delivered": false,
        "error": err.to_string(),
        "error_code": err.error_code(),
    }));
    Envelope::reply_to(request, MessageKind::Response, content)
}

fn record_pair(
    trail: &mut CoordinationTrail,
    request: Envelope,
    reply: Envelope,
    task: &str,
    specialist: &SpecialistId,
    attempt: u32,
) -> Result<(), CallFailure> {
    trail
        .record_exchange(request, reply)
        .map_err(|error| CallFailure {
            specialist: Some(specialist.clone()),
            task: task.to_string(),
            error,
            attempts: attempt,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_agent::CorrelationId;
    use concierge_agent::testing::{StubBehavior, StubProxy};
    use concierge_agent::SpecialistProxy;
    use std::collections::HashMap;

    fn dispatcher(stubs: Vec<Arc<StubProxy>>, policy: DispatchPolicy) -> Dispatcher {
        let proxies: ProxyMap = stubs
            .into_iter()
            .map(|stub| (stub.specialist().clone(), stub as Arc<dyn SpecialistProxy>))
            .collect::<HashMap<_, _>>();
        Dispatcher::new(Arc::new(CapabilityRegistry::builtin()), Arc::new(proxies), policy)
    }

    fn trail() -> CoordinationTrail {
        CoordinationTrail::new(CorrelationId::generate())
    }

    #[tokio::test]
    async fn test_successful_call_records_pair() {
        let stub = Arc::new(
            StubProxy::new("customer_data").reply("get_customer", json!({"customer": {"id": 1}})),
        );
        let dispatcher = dispatcher(vec![stub.clone()], DispatchPolicy::default());
        let mut trail = trail();

        let reply = dispatcher
            .invoke(
                &mut trail,
                MessageKind::Request,
                "get_customer",
                payload(json!({"customer_id": 1})),
            )
            .await
            .unwrap();

        assert_eq!(reply.content["customer"]["id"], 1);
        assert_eq!(trail.len(), 2);
        assert!(trail.check_alternation().is_ok());
        assert_eq!(stub.attempts("get_customer"), 1);
    }

    #[tokio::test]
    async fn test_unavailable_is_retried_once() {
        let stub = Arc::new(StubProxy::new("customer_data").otherwise(StubBehavior::Unavailable));
        let dispatcher = dispatcher(vec![stub.clone()], DispatchPolicy::default());
        let mut trail = trail();

        let failure = dispatcher
            .invoke(
                &mut trail,
                MessageKind::Request,
                "get_customer",
                payload(json!({"customer_id": 1})),
            )
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 2);
        assert_eq!(failure.error.error_code(), "SPECIALIST_UNAVAILABLE");
        assert_eq!(stub.attempts("get_customer"), 2);
        assert_eq!(trail.len(), 4);
        assert!(trail.check_alternation().is_ok());
        assert!(
            trail
                .iter()
                .filter(|e| e.kind == MessageKind::Response)
                .all(|e| e.content["delivered"] == false)
        );
    }

    #[tokio::test]
    async fn test_flaky_specialist_recovers_on_retry() {
        let stub = Arc::new(StubProxy::new("support").on(
            "handle_support",
            StubBehavior::Flaky {
                failures: 1,
                reply: payload(json!({"response": "ok"})),
            },
        ));
        let dispatcher = dispatcher(vec![stub.clone()], DispatchPolicy::default());
        let mut trail = trail();

        let reply = dispatcher
            .invoke(
                &mut trail,
                MessageKind::Request,
                "handle_support",
                payload(json!({"query": "hi"})),
            )
            .await
            .unwrap();

        assert_eq!(reply.content["response"], "ok");
        assert_eq!(stub.attempts("handle_support"), 2);
        assert_eq!(trail.len(), 4);
    }

    #[tokio::test]
    async fn test_specialist_error_is_not_retried() {
        let stub = Arc::new(
            StubProxy::new("customer_data")
                .otherwise(StubBehavior::Error("database locked".into())),
        );
        let dispatcher = dispatcher(vec![stub.clone()], DispatchPolicy::default());
        let mut trail = trail();

        let failure = dispatcher
            .invoke(
                &mut trail,
                MessageKind::Request,
                "get_customer",
                payload(json!({"customer_id": 1})),
            )
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.error.error_code(), "SPECIALIST_ERROR");
        assert_eq!(stub.total_attempts(), 1);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let stub = Arc::new(
            StubProxy::new("support").otherwise(StubBehavior::Reject("missing query".into())),
        );
        let dispatcher = dispatcher(vec![stub.clone()], DispatchPolicy::default());
        let mut trail = trail();

        let failure = dispatcher
            .invoke(&mut trail, MessageKind::Request, "handle_support", Payload::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error.error_code(), "TASK_REJECTED");
        assert_eq!(stub.total_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_unavailable() {
        let stub = Arc::new(StubProxy::new("customer_data").otherwise(StubBehavior::Hang));
        let dispatcher = dispatcher(vec![stub.clone()], DispatchPolicy::default());
        let mut trail = trail();

        let failure = dispatcher
            .invoke(
                &mut trail,
                MessageKind::Request,
                "get_customer",
                payload(json!({"customer_id": 1})),
            )
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 2);
        assert!(failure.error.is_retryable());
        assert!(failure.error.to_string().contains("no reply within 5s"));
    }

    #[tokio::test]
    async fn test_unknown_task_never_dispatched() {
        let stub = Arc::new(StubProxy::new("customer_data"));
        let dispatcher = dispatcher(vec![stub.clone()], DispatchPolicy::default());
        let mut trail = trail();

        let failure = dispatcher
            .invoke(&mut trail, MessageKind::Request, "launch_rocket", Payload::new())
            .await
            .unwrap_err();

        assert!(failure.specialist.is_none());
        assert_eq!(failure.attempts, 0);
        assert!(trail.is_empty());
        assert_eq!(stub.total_attempts(), 0);
    }

    #[tokio::test]
    async fn test_missing_proxy_is_unknown_specialist() {
        let dispatcher = dispatcher(vec![], DispatchPolicy::default());
        let mut trail = trail();

        let failure = dispatcher
            .invoke(&mut trail, MessageKind::Request, "get_customer", Payload::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error.error_code(), "UNKNOWN_SPECIALIST");
        assert!(trail.is_empty());
    }

    #[tokio::test]
    async fn test_invoke_all_keeps_pairs_contiguous() {
        let data = Arc::new(
            StubProxy::new("customer_data")
                .reply("get_customer", json!({"customer": null}))
                .with_delay(Duration::from_millis(20)),
        );
        let support = Arc::new(
            StubProxy::new("support").reply("handle_support", json!({"response": "hi"})),
        );
        let dispatcher = dispatcher(vec![data, support], DispatchPolicy::default());
        let mut trail = trail();

        let results = dispatcher
            .invoke_all(
                &mut trail,
                vec![
                    CallSpec::request("get_customer", payload(json!({"customer_id": 9}))),
                    CallSpec::request("handle_support", payload(json!({"query": "hi"}))),
                ],
            )
            .await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(trail.len(), 4);
        assert!(trail.check_alternation().is_ok());
        let tasks: Vec<_> = trail.iter().map(|e| e.task_name().to_string()).collect();
        assert_eq!(tasks, ["get_customer", "get_customer", "handle_support", "handle_support"]);
    }
}
