//! Negotiation/Escalation
//!
//! The support specialist is first asked whether it can answer on its own.
//! If it declines, customer context is gathered from the data specialist and
//! the support specialist is invoked again with that context.

use concierge_agent::{MessageKind, Payload, payload};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{Conclusion, Run, record_field};
use crate::dispatch::CallFailure;
use crate::synthesis::{Findings, synthesize};

enum State {
    Start,
    ProbeCapability,
    CanHandle,
    CannotHandle,
    InvokeDirect,
    GatherContext,
    InvokeWithContext { customer_info: Option<Value> },
    Synthesize(Findings),
    Done(Conclusion),
    Failed(CallFailure),
}

pub(crate) async fn run(mut run: Run<'_>) -> Conclusion {
    let query = run.classification.query.clone();
    let customer_id = run.classification.params.customer_id;
    let mut state = State::Start;

    loop {
        state = match state {
            State::Start => State::ProbeCapability,

            State::ProbeCapability => {
                let probe = payload(json!({ "query": query }));
                match run.call(MessageKind::Query, "check_can_handle", probe).await {
                    Ok(answer) => {
                        let can_handle = answer
                            .get("can_handle")
                            .and_then(Value::as_bool)
                            .unwrap_or(false);
                        let reason = answer
                            .get("reason")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        debug!(can_handle, reason, "Capability probe answered");
                        if can_handle {
                            State::CanHandle
                        } else {
                            State::CannotHandle
                        }
                    }
                    Err(failure) => State::Failed(failure),
                }
            }

            State::CanHandle => State::InvokeDirect,

            State::CannotHandle => State::GatherContext,

            State::InvokeDirect => {
                let request = payload(json!({ "query": query }));
                match run.call(MessageKind::Request, "handle_support", request).await {
                    Ok(reply) => State::Synthesize(Findings::Escalation {
                        can_handle: true,
                        context_provided: false,
                        reply,
                    }),
                    Err(failure) => State::Failed(failure),
                }
            }

            State::GatherContext => match customer_id {
                Some(id) => {
                    let lookup = payload(json!({ "customer_id": id }));
                    match run.call(MessageKind::Request, "get_customer", lookup).await {
                        Ok(result) => State::InvokeWithContext {
                            customer_info: record_field(&result, "customer"),
                        },
                        Err(failure) => State::Failed(failure),
                    }
                }
                None => {
                    info!("No customer reference in request, escalating without context");
                    State::InvokeWithContext {
                        customer_info: None,
                    }
                }
            },

            State::InvokeWithContext { customer_info } => {
                let context_provided = customer_info.is_some();
                let mut request: Payload = payload(json!({ "query": query }));
                if let Some(info) = customer_info {
                    request.insert("customer_info".to_string(), info);
                }
                match run.call(MessageKind::Request, "handle_support", request).await {
                    Ok(reply) => State::Synthesize(Findings::Escalation {
                        can_handle: false,
                        context_provided,
                        reply,
                    }),
                    Err(failure) => State::Failed(failure),
                }
            }

            State::Synthesize(findings) => State::Done(Conclusion::Done(synthesize(&findings))),

            State::Done(conclusion) => return conclusion,

            State::Failed(failure) => return run.fail(failure),
        };
    }
}
