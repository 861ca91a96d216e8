//! Customer data specialist: record lookup, listing, updates and ticket history.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

use crate::backend::{CUSTOMER_STATUSES, CustomerUpdate, ToolBackend};
use crate::error::{DispatchError, DispatchResult};
use crate::specialist::{Specialist, TaskInput};
use crate::types::{Payload, SpecialistId, SpecialistKind, payload};

const DEFAULT_LIST_LIMIT: i64 = 100;

/// Reads and updates customer records.
pub struct CustomerDataSpecialist {
    id: SpecialistId,
    backend: Arc<dyn ToolBackend>,
}

impl CustomerDataSpecialist {
    pub fn new(id: SpecialistId, backend: Arc<dyn ToolBackend>) -> Self {
        Self { id, backend }
    }

    async fn get_customer(&self, input: TaskInput<'_>) -> DispatchResult<Payload> {
        let customer_id = input.int("customer_id")?;
        let customer = self
            .backend
            .get_record(customer_id)
            .await
            .map_err(|e| e.into_dispatch(&self.id))?;
        Ok(payload(json!({ "customer": customer })))
    }

    async fn list_customers(&self, input: TaskInput<'_>) -> DispatchResult<Payload> {
        let status = input.str("status")?;
        if !CUSTOMER_STATUSES.contains(&status) {
            return Err(DispatchError::specialist(
                &self.id,
                format!("Unknown customer status '{status}'"),
            ));
        }
        let limit = input.opt_int("limit")?.unwrap_or(DEFAULT_LIST_LIMIT).max(0) as usize;
        let customers = self
            .backend
            .list_records(status, limit)
            .await
            .map_err(|e| e.into_dispatch(&self.id))?;
        Ok(payload(json!({ "count": customers.len(), "customers": customers })))
    }

    async fn update_customer(&self, input: TaskInput<'_>) -> DispatchResult<Payload> {
        let customer_id = input.int("customer_id")?;
        let data = input.object("data")?;
        let update: CustomerUpdate = serde_json::from_value(Value::Object(data.clone()))
            .map_err(|e| input.reject(format!("invalid update data: {e}")))?;
        let updated = self
            .backend
            .update_record(customer_id, &update)
            .await
            .map_err(|e| e.into_dispatch(&self.id))?;
        Ok(payload(json!({ "customer_id": customer_id, "updated": updated })))
    }

    async fn get_customer_history(&self, input: TaskInput<'_>) -> DispatchResult<Payload> {
        let customer_id = input.int("customer_id")?;
        let history = self
            .backend
            .get_history(customer_id)
            .await
            .map_err(|e| e.into_dispatch(&self.id))?;
        Ok(payload(json!({ "count": history.len(), "history": history })))
    }
}

#[async_trait]
impl Specialist for CustomerDataSpecialist {
    fn id(&self) -> &SpecialistId {
        &self.id
    }

    fn kind(&self) -> SpecialistKind {
        SpecialistKind::CustomerData
    }

    async fn handle(&self, task: &str, input: &Payload) -> DispatchResult<Payload> {
        debug!(specialist = %self.id, task, "Handling task");
        let args = TaskInput::new(&self.id, task, input);
        match task {
            "get_customer" => self.get_customer(args).await,
            "list_customers" => self.list_customers(args).await,
            "update_customer" => self.update_customer(args).await,
            "get_customer_history" => self.get_customer_history(args).await,
            _ => Err(args.reject("task not implemented by the customer data specialist")),
        }
    }
}
