//! Task Allocation: one specialist, one task.

use concierge_agent::{MessageKind, Payload, SpecialistId, payload};
use serde_json::json;
use tracing::debug;

use super::{Conclusion, Run, list_field, record_field};
use crate::classifier::Plan;
use crate::dispatch::CallFailure;
use crate::synthesis::{Findings, synthesize};

enum State {
    Start,
    ResolveSpecialist { task: &'static str, content: Payload },
    Invoke { specialist: SpecialistId, task: &'static str, content: Payload },
    Synthesize(Findings),
    Done(Conclusion),
    Failed(CallFailure),
}

pub(crate) async fn run(mut run: Run<'_>) -> Conclusion {
    let plan = run.classification.plan;
    let customer_id = run.classification.params.customer_id;
    let mut state = State::Start;

    loop {
        state = match state {
            State::Start => match (plan, customer_id) {
                (Plan::LookupCustomer, Some(id)) => State::ResolveSpecialist {
                    task: "get_customer",
                    content: payload(json!({ "customer_id": id })),
                },
                (Plan::CustomerHistory, Some(id)) => State::ResolveSpecialist {
                    task: "get_customer_history",
                    content: payload(json!({ "customer_id": id })),
                },
                (Plan::LookupCustomer | Plan::CustomerHistory, None) => {
                    State::Synthesize(Findings::MissingCustomerReference { plan })
                }
                _ => State::ResolveSpecialist {
                    task: "handle_support",
                    content: payload(json!({ "query": run.classification.query })),
                },
            },

            State::ResolveSpecialist { task, content } => match run.dispatcher.resolve(task) {
                Ok(specialist) => State::Invoke {
                    specialist,
                    task,
                    content,
                },
                Err(failure) => State::Failed(failure),
            },

            State::Invoke {
                specialist,
                task,
                content,
            } => {
                debug!(specialist = %specialist, task, "Task allocated");
                match run.call_on(&specialist, MessageKind::Request, task, content).await {
                    Ok(result) => State::Synthesize(findings(plan, customer_id, result)),
                    Err(failure) => State::Failed(failure),
                }
            }

            State::Synthesize(findings) => State::Done(Conclusion::Done(synthesize(&findings))),

            State::Done(conclusion) => return conclusion,

            State::Failed(failure) => return run.fail(failure),
        };
    }
}

fn findings(plan: Plan, customer_id: Option<i64>, result: Payload) -> Findings {
    let customer_id = customer_id.unwrap_or_default();
    match plan {
        Plan::LookupCustomer => Findings::Customer {
            customer_id,
            record: record_field(&result, "customer"),
        },
        Plan::CustomerHistory => Findings::History {
            customer_id,
            history: list_field(&result, "history"),
        },
        _ => Findings::Support { reply: result },
    }
}
