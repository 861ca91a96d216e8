//! Multi-Step Coordination
//!
//! Two strictly ordered calls: keys extracted from the first result form the
//! payload of the second. When the first call yields no keys the second call
//! is skipped and the merge sees an empty result.

use concierge_agent::{MessageKind, Payload, payload};
use serde_json::{Value, json};
use tracing::debug;

use super::{Conclusion, Run, list_field};
use crate::classifier::Plan;
use crate::dispatch::CallFailure;
use crate::synthesis::{Findings, synthesize};

/// Customers pulled for a segment.
const SEGMENT_LIMIT: i64 = 1000;
const DEFAULT_PRIORITY: &str = "high";

/// Keys carried from the first call into the second.
#[derive(Debug, Clone, PartialEq)]
enum Keys {
    CustomerIds(Vec<i64>),
    Customer(i64),
}

impl Keys {
    fn is_empty(&self) -> bool {
        matches!(self, Keys::CustomerIds(ids) if ids.is_empty())
    }
}

enum State {
    Start,
    InvokeFirst { task: &'static str, content: Payload },
    ExtractKeys { first: Payload },
    InvokeSecond { first: Payload, keys: Keys },
    Merge { first: Payload, second: Option<Payload> },
    Synthesize(Findings),
    Done(Conclusion),
    Failed(CallFailure),
}

pub(crate) async fn run(mut run: Run<'_>) -> Conclusion {
    let plan = run.classification.plan;
    let params = run.classification.params.clone();
    let priority = params
        .priority
        .clone()
        .unwrap_or_else(|| DEFAULT_PRIORITY.to_string());
    let mut state = State::Start;

    loop {
        state = match state {
            State::Start => match plan {
                Plan::UpdateThenHistory => match params.customer_id {
                    Some(id) => {
                        let mut data = Payload::new();
                        if let Some(email) = &params.email {
                            data.insert("email".to_string(), json!(email));
                        }
                        State::InvokeFirst {
                            task: "update_customer",
                            content: payload(json!({ "customer_id": id, "data": data })),
                        }
                    }
                    None => State::Synthesize(Findings::MissingCustomerReference { plan }),
                },
                _ => State::InvokeFirst {
                    task: "list_customers",
                    content: payload(json!({ "status": "active", "limit": SEGMENT_LIMIT })),
                },
            },

            State::InvokeFirst { task, content } => {
                match run.call(MessageKind::Request, task, content).await {
                    Ok(first) => State::ExtractKeys { first },
                    Err(failure) => State::Failed(failure),
                }
            }

            State::ExtractKeys { first } => {
                let keys = match plan {
                    Plan::UpdateThenHistory => Keys::Customer(
                        first
                            .get("customer_id")
                            .and_then(Value::as_i64)
                            .or(params.customer_id)
                            .unwrap_or_default(),
                    ),
                    _ => Keys::CustomerIds(
                        list_field(&first, "customers")
                            .iter()
                            .filter_map(|c| c.get("id").and_then(Value::as_i64))
                            .collect(),
                    ),
                };
                if keys.is_empty() {
                    debug!(plan = %plan, "First step produced no keys, skipping second call");
                    State::Merge {
                        first,
                        second: None,
                    }
                } else {
                    State::InvokeSecond { first, keys }
                }
            }

            State::InvokeSecond { first, keys } => {
                let (task, content) = match (plan, keys) {
                    (Plan::UpdateThenHistory, Keys::Customer(id)) => (
                        "get_customer_history",
                        payload(json!({ "customer_id": id })),
                    ),
                    (Plan::PriorityTicketsForSegment, Keys::CustomerIds(ids)) => (
                        "get_tickets_by_priority",
                        payload(json!({ "priority": priority, "customer_ids": ids })),
                    ),
                    (_, Keys::CustomerIds(ids)) => (
                        "get_open_tickets_for_customers",
                        payload(json!({ "customer_ids": ids })),
                    ),
                    (_, Keys::Customer(id)) => (
                        "get_customer_history",
                        payload(json!({ "customer_id": id })),
                    ),
                };
                match run.call(MessageKind::Request, task, content).await {
                    Ok(second) => State::Merge {
                        first,
                        second: Some(second),
                    },
                    Err(failure) => State::Failed(failure),
                }
            }

            State::Merge { first, second } => {
                let second = second.unwrap_or_default();
                State::Synthesize(merge(plan, &params, &priority, &first, &second))
            }

            State::Synthesize(findings) => State::Done(Conclusion::Done(synthesize(&findings))),

            State::Done(conclusion) => return conclusion,

            State::Failed(failure) => return run.fail(failure),
        };
    }
}

fn merge(
    plan: Plan,
    params: &crate::classifier::Parameters,
    priority: &str,
    first: &Payload,
    second: &Payload,
) -> Findings {
    match plan {
        Plan::UpdateThenHistory => {
            let mut changes = Payload::new();
            if let Some(email) = &params.email {
                changes.insert("email".to_string(), json!(email));
            }
            Findings::UpdateHistory {
                customer_id: first
                    .get("customer_id")
                    .and_then(Value::as_i64)
                    .or(params.customer_id)
                    .unwrap_or_default(),
                changes,
                updated: first.get("updated").and_then(Value::as_bool).unwrap_or(false),
                history: list_field(second, "history"),
            }
        }
        Plan::PriorityTicketsForSegment => {
            let customers = list_field(first, "customers");
            let matches = list_field(second, "tickets")
                .into_iter()
                .map(|ticket| {
                    let owner = owner_of(&customers, &ticket).cloned();
                    (ticket, owner)
                })
                .collect();
            Findings::PriorityTickets {
                priority: priority.to_string(),
                customers_found: customers.len(),
                matches,
            }
        }
        _ => {
            let customers = list_field(first, "customers");
            let tickets = list_field(second, "tickets");
            let groups = customers
                .iter()
                .filter_map(|customer| {
                    let id = customer.get("id").and_then(Value::as_i64)?;
                    let own: Vec<Value> = tickets
                        .iter()
                        .filter(|t| t.get("customer_id").and_then(Value::as_i64) == Some(id))
                        .cloned()
                        .collect();
                    (!own.is_empty()).then(|| (customer.clone(), own))
                })
                .collect();
            Findings::OpenTickets {
                active_customers: customers.len(),
                groups,
            }
        }
    }
}

fn owner_of<'a>(customers: &'a [Value], ticket: &Value) -> Option<&'a Value> {
    let owner_id = ticket.get("customer_id").and_then(Value::as_i64)?;
    customers
        .iter()
        .find(|c| c.get("id").and_then(Value::as_i64) == Some(owner_id))
}
