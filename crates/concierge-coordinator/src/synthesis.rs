//! Template-driven answers.
//!
//! Synthesis only looks at the terminal payloads a pattern collected, never at
//! the trail, and never calls a specialist. Missing fields are rendered with a
//! fixed "not found" phrase instead of failing the answer.

use concierge_agent::Payload;
use serde_json::{Map, Value, json};
use std::fmt::Write;

use crate::classifier::Plan;
use crate::dispatch::CallFailure;

/// Phrase substituted for absent result fields.
pub const NOT_FOUND: &str = "not found";

/// Results a pattern gathered before reaching `Synthesize`.
#[derive(Debug, Clone, PartialEq)]
pub enum Findings {
    Customer {
        customer_id: i64,
        record: Option<Value>,
    },
    History {
        customer_id: i64,
        history: Vec<Value>,
    },
    Support {
        reply: Payload,
    },
    Escalation {
        can_handle: bool,
        context_provided: bool,
        reply: Payload,
    },
    PriorityTickets {
        priority: String,
        customers_found: usize,
        /// Each matching ticket with its owner, if the owner was listed
        matches: Vec<(Value, Option<Value>)>,
    },
    OpenTickets {
        active_customers: usize,
        /// Customers with at least one open ticket
        groups: Vec<(Value, Vec<Value>)>,
    },
    UpdateHistory {
        customer_id: i64,
        changes: Payload,
        updated: bool,
        history: Vec<Value>,
    },
    /// The plan needs a customer reference the request did not contain
    MissingCustomerReference {
        plan: Plan,
    },
}

/// Final answer text plus counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub answer: String,
    pub statistics: Map<String, Value>,
}

impl Synthesis {
    fn new(answer: String) -> Self {
        Self {
            answer,
            statistics: Map::new(),
        }
    }

    fn stat(mut self, key: &str, value: Value) -> Self {
        self.statistics.insert(key.to_string(), value);
        self
    }
}

fn text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => NOT_FOUND.to_string(),
    }
}

fn reply_text(reply: &Payload) -> String {
    match reply.get("response").and_then(Value::as_str) {
        Some(response) if !response.is_empty() => response.to_string(),
        _ => format!("Support response {NOT_FOUND}."),
    }
}

/// Render a completed pattern.
pub fn synthesize(findings: &Findings) -> Synthesis {
    match findings {
        Findings::Customer {
            customer_id,
            record: Some(record),
        } => Synthesis::new(format!(
            "Customer Information:\n  ID: {}\n  Name: {}\n  Email: {}\n  Phone: {}\n  Status: {}",
            text(record, "id"),
            text(record, "name"),
            text(record, "email"),
            text(record, "phone"),
            text(record, "status"),
        ))
        .stat("customer_id", json!(customer_id))
        .stat("customer_found", json!(true)),

        Findings::Customer {
            customer_id,
            record: None,
        } => Synthesis::new(format!("Customer {customer_id} {NOT_FOUND}."))
            .stat("customer_id", json!(customer_id))
            .stat("customer_found", json!(false)),

        Findings::History {
            customer_id,
            history,
        } => {
            let mut answer = format!(
                "Ticket History for customer {customer_id} ({} tickets):",
                history.len()
            );
            push_history(&mut answer, history);
            Synthesis::new(answer)
                .stat("customer_id", json!(customer_id))
                .stat("tickets_found", json!(history.len()))
        }

        Findings::Support { reply } => Synthesis::new(reply_text(reply)).stat(
            "customer_tier",
            reply.get("customer_tier").cloned().unwrap_or(Value::Null),
        ),

        Findings::Escalation {
            can_handle,
            context_provided,
            reply,
        } => Synthesis::new(reply_text(reply))
            .stat("support_can_handle", json!(can_handle))
            .stat("context_provided", json!(context_provided)),

        Findings::PriorityTickets {
            priority,
            customers_found,
            matches,
        } => {
            let mut answer = if matches.is_empty() {
                format!("No {priority}-priority tickets found for premium customers.")
            } else {
                format!(
                    "Found {} {priority}-priority ticket(s) for premium customers:",
                    matches.len()
                )
            };
            for (ticket, owner) in matches {
                let _ = write!(
                    answer,
                    "\n- Ticket #{}: {}",
                    text(ticket, "id"),
                    text(ticket, "issue")
                );
                match owner {
                    Some(customer) => {
                        let _ = write!(
                            answer,
                            "\n  Customer: {} (ID: {})",
                            text(customer, "name"),
                            text(customer, "id")
                        );
                    }
                    None => {
                        let _ = write!(
                            answer,
                            "\n  Customer: {NOT_FOUND} (ID: {})",
                            text(ticket, "customer_id")
                        );
                    }
                }
                let _ = write!(
                    answer,
                    "\n  Status: {}, Priority: {}",
                    text(ticket, "status"),
                    text(ticket, "priority")
                );
            }
            Synthesis::new(answer)
                .stat("customers_found", json!(customers_found))
                .stat("tickets_found", json!(matches.len()))
        }

        Findings::OpenTickets {
            active_customers,
            groups,
        } => {
            let total: usize = groups.iter().map(|(_, tickets)| tickets.len()).sum();
            let mut answer = if groups.is_empty() {
                "No active customers with open tickets.".to_string()
            } else {
                format!("Found {} active customer(s) with open tickets:", groups.len())
            };
            for (customer, tickets) in groups {
                let _ = write!(
                    answer,
                    "\n- {} (ID: {}, Email: {})\n  Open Tickets: {}",
                    text(customer, "name"),
                    text(customer, "id"),
                    text(customer, "email"),
                    tickets.len()
                );
                for ticket in tickets {
                    let _ = write!(
                        answer,
                        "\n    • Ticket #{}: {} (Priority: {})",
                        text(ticket, "id"),
                        text(ticket, "issue"),
                        text(ticket, "priority")
                    );
                }
            }
            Synthesis::new(answer)
                .stat("active_customers", json!(active_customers))
                .stat("customers_with_open_tickets", json!(groups.len()))
                .stat("total_open_tickets", json!(total))
        }

        Findings::UpdateHistory {
            customer_id,
            changes,
            updated,
            history,
        } => {
            let mut answer = String::from("Updates completed:");
            if *updated {
                let _ = write!(
                    answer,
                    "\n  ✓ Updated customer {customer_id}: {}",
                    Value::Object(changes.clone())
                );
            } else {
                let _ = write!(
                    answer,
                    "\n  ✗ Customer {customer_id} {NOT_FOUND}, nothing updated"
                );
            }
            let _ = write!(answer, "\n\nTicket History ({} tickets):", history.len());
            push_history(&mut answer, history);
            Synthesis::new(answer)
                .stat("customer_id", json!(customer_id))
                .stat("updated", json!(updated))
                .stat("tickets_found", json!(history.len()))
        }

        Findings::MissingCustomerReference { plan } => Synthesis::new(
            "Please include a customer ID in your request, for example \"customer 42\"."
                .to_string(),
        )
        .stat("missing_parameter", json!("customer_id"))
        .stat("plan", json!(plan.to_string())),
    }
}

fn push_history(answer: &mut String, history: &[Value]) {
    if history.is_empty() {
        answer.push_str("\n  No tickets found.");
        return;
    }
    for ticket in history {
        let _ = write!(
            answer,
            "\n  • Ticket #{}: {}\n    Status: {}, Priority: {}",
            text(ticket, "id"),
            text(ticket, "issue"),
            text(ticket, "status"),
            text(ticket, "priority")
        );
    }
}

/// Render a pattern that ended in `Failed`.
///
/// `completed` lists the tasks that succeeded before the failure.
pub fn synthesize_failure(failure: &CallFailure, completed: &[String]) -> Synthesis {
    let mut answer = String::from("I could only partially complete your request. ");
    match &failure.specialist {
        Some(specialist) => {
            let _ = write!(
                answer,
                "The {} call to the {specialist} specialist failed after {} attempt(s): {}.",
                failure.task, failure.attempts, failure.error
            );
        }
        None => {
            let _ = write!(
                answer,
                "No specialist is available for the {} task: {}.",
                failure.task, failure.error
            );
        }
    }
    if !completed.is_empty() {
        let _ = write!(answer, "\nCompleted before the failure: {}.", completed.join(", "));
    }

    Synthesis::new(answer)
        .stat("failed_task", json!(failure.task))
        .stat("attempts", json!(failure.attempts))
        .stat("completed_calls", json!(completed.len()))
}
