//! Support specialist
//!
//! Answers free-text support questions, decides whether a request can be
//! handled without customer context, and manages tickets.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::backend::{TICKET_PRIORITIES, Ticket, ToolBackend};
use crate::error::{DispatchError, DispatchResult};
use crate::specialist::{Specialist, TaskInput};
use crate::types::{Payload, SpecialistId, SpecialistKind, payload};

/// Customer id served with the premium tier.
pub const PREMIUM_CUSTOMER_ID: i64 = 12345;

/// Topics the support desk hands back for more context.
const NEEDS_CONTEXT: &[&str] = &["refund", "billing", "charge"];

const SEGMENT_LIMIT: usize = 1000;

/// Answers support questions and manages tickets.
pub struct SupportSpecialist {
    id: SpecialistId,
    backend: Arc<dyn ToolBackend>,
}

struct Reply {
    text: &'static str,
    action: Option<&'static str>,
}

fn compose_reply(query: &str) -> Reply {
    let query = query.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| query.contains(w));

    if mentions(&["upgrade", "premium"]) {
        Reply {
            text: "I can help you upgrade your account! Our premium tier includes priority \
                support, advanced features, and exclusive benefits.",
            action: Some("Account upgrade assistance provided"),
        }
    } else if mentions(&["cancel"]) {
        Reply {
            text: "I understand you'd like to cancel your subscription. Before we proceed, let me \
                address any concerns you might have. What's the main reason for cancellation?",
            action: Some("Cancellation inquiry handled"),
        }
    } else if mentions(&["refund", "charge"]) {
        Reply {
            text: "I'm sorry about the trouble with your charges. I've reviewed your account and \
                started a refund review; you'll hear back from our billing team shortly.",
            action: Some("Refund review requested"),
        }
    } else if mentions(&["billing"]) {
        Reply {
            text: "I can help with billing questions. Let me look into your account details to \
                provide accurate information.",
            action: Some("Billing inquiry routed"),
        }
    } else if mentions(&["help", "support"]) {
        Reply {
            text: "I'm here to help! What specific issue are you experiencing? I can assist with \
                account management, technical problems, billing questions, and more.",
            action: None,
        }
    } else {
        Reply {
            text: "I'm here to assist you. How can I help today?",
            action: None,
        }
    }
}

impl SupportSpecialist {
    pub fn new(id: SpecialistId, backend: Arc<dyn ToolBackend>) -> Self {
        Self { id, backend }
    }

    fn check_can_handle(&self, input: TaskInput<'_>) -> DispatchResult<Payload> {
        let query = input.str("query")?.to_lowercase();
        let blocked = NEEDS_CONTEXT.iter().find(|w| query.contains(*w));
        Ok(match blocked {
            Some(topic) => payload(json!({
                "can_handle": false,
                "reason": format!("May need billing context ({topic})"),
            })),
            None => payload(json!({ "can_handle": true, "reason": "I can handle this" })),
        })
    }

    fn handle_support(&self, input: TaskInput<'_>) -> DispatchResult<Payload> {
        let query = input.str("query")?;
        let customer_info = input.opt_object("customer_info")?;
        let reply = compose_reply(query);

        let customer_tier = match customer_info.and_then(|info| info.get("id")) {
            Some(id) if id.as_i64() == Some(PREMIUM_CUSTOMER_ID) => "premium",
            Some(_) => "standard",
            None if customer_info.is_some() => "standard",
            None => "",
        };

        let mut result = payload(json!({
            "response": reply.text,
            "customer_tier": customer_tier,
            "actions": reply.action.into_iter().collect::<Vec<_>>(),
        }));
        if let Some(info) = customer_info {
            result.insert("customer_info".to_string(), json!(info));
        }
        Ok(result)
    }

    async fn create_ticket(&self, input: TaskInput<'_>) -> DispatchResult<Payload> {
        let customer_id = input.int("customer_id")?;
        let issue = input.str("issue")?;
        let priority = input.opt_str("priority")?.unwrap_or("medium");
        let ticket = self
            .backend
            .create_ticket(customer_id, issue, priority)
            .await
            .map_err(|e| e.into_dispatch(&self.id))?;
        Ok(payload(json!({ "ticket": ticket })))
    }

    async fn history_of(&self, customer_ids: &[i64]) -> DispatchResult<Vec<Ticket>> {
        let mut tickets = Vec::new();
        for &customer_id in customer_ids {
            let history = self
                .backend
                .get_history(customer_id)
                .await
                .map_err(|e| e.into_dispatch(&self.id))?;
            tickets.extend(history);
        }
        Ok(tickets)
    }

    async fn get_tickets_by_priority(&self, input: TaskInput<'_>) -> DispatchResult<Payload> {
        let priority = input.str("priority")?;
        if !TICKET_PRIORITIES.contains(&priority) {
            return Err(DispatchError::specialist(
                &self.id,
                format!("Unknown priority '{priority}'"),
            ));
        }
        let customer_ids = match input.opt_int_list("customer_ids")? {
            Some(ids) => ids,
            None => self
                .backend
                .list_records("active", SEGMENT_LIMIT)
                .await
                .map_err(|e| e.into_dispatch(&self.id))?
                .into_iter()
                .map(|c| c.id)
                .collect(),
        };
        let tickets: Vec<Ticket> = self
            .history_of(&customer_ids)
            .await?
            .into_iter()
            .filter(|t| t.priority == priority)
            .collect();
        Ok(payload(json!({ "count": tickets.len(), "tickets": tickets })))
    }

    async fn get_open_tickets_for_customers(
        &self,
        input: TaskInput<'_>,
    ) -> DispatchResult<Payload> {
        let customer_ids = input.int_list("customer_ids")?;
        let tickets: Vec<Ticket> = self
            .history_of(&customer_ids)
            .await?
            .into_iter()
            .filter(Ticket::is_open)
            .collect();
        Ok(payload(json!({ "count": tickets.len(), "tickets": tickets })))
    }
}

#[async_trait]
impl Specialist for SupportSpecialist {
    fn id(&self) -> &SpecialistId {
        &self.id
    }

    fn kind(&self) -> SpecialistKind {
        SpecialistKind::Support
    }

    async fn handle(&self, task: &str, input: &Payload) -> DispatchResult<Payload> {
        debug!(specialist = %self.id, task, "Handling task");
        let args = TaskInput::new(&self.id, task, input);
        match task {
            "check_can_handle" => self.check_can_handle(args),
            "handle_support" => self.handle_support(args),
            "create_ticket" => self.create_ticket(args).await,
            "get_tickets_by_priority" => self.get_tickets_by_priority(args).await,
            "get_open_tickets_for_customers" => self.get_open_tickets_for_customers(args).await,
            _ => Err(args.reject("task not implemented by the support specialist")),
        }
    }
}
