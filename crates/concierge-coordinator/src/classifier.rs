//! Intent classification
//!
//! Free text is mapped to a coordination plan by an ordered trigger table.
//! Rules are grouped in three classes that are always tried in the same
//! order, regardless of how the table was written:
//!
//! | Priority | Class | Default plans |
//! |----------|-------|---------------|
//! | 1 | `escalation` | negotiation |
//! | 2 | `multi_field` | update then history, open tickets, priority tickets |
//! | 3 | `single_capability` | customer history, support answer, customer lookup |
//! | - | none matched | support answer |
//!
//! Within a class, rules keep their table order. Classification is pure and
//! never fails: unmatched text falls back to the support answer plan.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::ConfigError;

/// The three fixed coordination sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// One specialist, one task
    TaskAllocation,
    /// Probe, then either invoke directly or gather context first
    Negotiation,
    /// Two strictly ordered calls, the second fed by the first
    MultiStep,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::TaskAllocation => f.write_str("task_allocation"),
            Pattern::Negotiation => f.write_str("negotiation"),
            Pattern::MultiStep => f.write_str("multi_step"),
        }
    }
}

/// Concrete plan selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// `get_customer` for the referenced customer
    LookupCustomer,
    /// `get_customer_history` for the referenced customer
    CustomerHistory,
    /// `handle_support` with the request text
    SupportAnswer,
    /// Capability probe with optional context gathering
    Escalation,
    /// Active customers, then their tickets of one priority
    PriorityTicketsForSegment,
    /// Active customers, then their open tickets
    OpenTicketsForActive,
    /// Update a customer, then show their ticket history
    UpdateThenHistory,
}

impl Plan {
    /// Pattern this plan executes.
    pub fn pattern(&self) -> Pattern {
        match self {
            Plan::LookupCustomer | Plan::CustomerHistory | Plan::SupportAnswer => {
                Pattern::TaskAllocation
            }
            Plan::Escalation => Pattern::Negotiation,
            Plan::PriorityTicketsForSegment
            | Plan::OpenTicketsForActive
            | Plan::UpdateThenHistory => {
                Pattern::MultiStep
            }
        }
    }

    /// Tasks the plan may invoke.
    pub fn required_tasks(&self) -> &'static [&'static str] {
        match self {
            Plan::LookupCustomer => &["get_customer"],
            Plan::CustomerHistory => &["get_customer_history"],
            Plan::SupportAnswer => &["handle_support"],
            Plan::Escalation => &["check_can_handle", "get_customer", "handle_support"],
            Plan::PriorityTicketsForSegment => &["list_customers", "get_tickets_by_priority"],
            Plan::OpenTicketsForActive => &["list_customers", "get_open_tickets_for_customers"],
            Plan::UpdateThenHistory => &["update_customer", "get_customer_history"],
        }
    }

    /// Every plan, for startup validation.
    pub const ALL: [Plan; 7] = [
        Plan::LookupCustomer,
        Plan::CustomerHistory,
        Plan::SupportAnswer,
        Plan::Escalation,
        Plan::PriorityTicketsForSegment,
        Plan::OpenTicketsForActive,
        Plan::UpdateThenHistory,
    ];
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Plan::LookupCustomer => "lookup_customer",
            Plan::CustomerHistory => "customer_history",
            Plan::SupportAnswer => "support_answer",
            Plan::Escalation => "escalation",
            Plan::PriorityTicketsForSegment => "priority_tickets_for_segment",
            Plan::OpenTicketsForActive => "open_tickets_for_active",
            Plan::UpdateThenHistory => "update_then_history",
        };
        f.write_str(name)
    }
}

/// Rule classes in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerClass {
    Escalation,
    MultiField,
    SingleCapability,
}

/// One row of the trigger table.
///
/// A rule matches when any `any_of` keyword appears (or `any_of` is empty),
/// every `all_of` group has at least one keyword present, and a customer
/// reference was found if `requires_customer` is set. Keywords match whole
/// words, case-insensitively; multi-word keywords match as phrases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub class: TriggerClass,
    pub plan: Plan,
    #[serde(default)]
    pub any_of: Vec<String>,
    #[serde(default)]
    pub all_of: Vec<Vec<String>>,
    #[serde(default)]
    pub requires_customer: bool,
}

impl TriggerRule {
    pub fn new(class: TriggerClass, plan: Plan) -> Self {
        Self {
            class,
            plan,
            any_of: Vec::new(),
            all_of: Vec::new(),
            requires_customer: false,
        }
    }

    /// Match when any of these keywords appears.
    pub fn any_of(mut self, keywords: &[&str]) -> Self {
        self.any_of = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Additionally require one keyword from this group.
    pub fn and_one_of(mut self, keywords: &[&str]) -> Self {
        self.all_of
            .push(keywords.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Only match when a customer reference was extracted.
    pub fn requiring_customer(mut self) -> Self {
        self.requires_customer = true;
        self
    }
}

/// Default trigger table.
pub fn default_triggers() -> Vec<TriggerRule> {
    vec![
        TriggerRule::new(TriggerClass::Escalation, Plan::Escalation).any_of(&[
            "refund",
            "refunds",
            "immediately",
            "urgent",
            "urgently",
            "cancel",
            "cancellation",
            "billing",
            "charge",
            "charged",
            "charges",
        ]),
        TriggerRule::new(TriggerClass::MultiField, Plan::UpdateThenHistory)
            .and_one_of(&["update", "change", "modify"])
            .and_one_of(&["history"])
            .requiring_customer(),
        TriggerRule::new(TriggerClass::MultiField, Plan::OpenTicketsForActive)
            .and_one_of(&["active customers"])
            .and_one_of(&["open tickets", "open ticket"]),
        TriggerRule::new(TriggerClass::MultiField, Plan::PriorityTicketsForSegment)
            .and_one_of(&["and", "with", "who have", "for"])
            .and_one_of(&["premium", "high-priority", "high priority"])
            .and_one_of(&["ticket", "tickets"]),
        TriggerRule::new(TriggerClass::SingleCapability, Plan::CustomerHistory)
            .any_of(&["history", "tickets", "ticket"])
            .requiring_customer(),
        TriggerRule::new(TriggerClass::SingleCapability, Plan::SupportAnswer)
            .any_of(&["help", "support", "issue", "problem", "upgrade", "upgrading"]),
        TriggerRule::new(TriggerClass::SingleCapability, Plan::LookupCustomer)
            .any_of(&["customer", "record", "account", "info", "information", "id"])
            .requiring_customer(),
    ]
}

/// Parameters extracted from the request text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    /// Referenced customer id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    /// E-mail address mentioned, used for updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Ticket priority mentioned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

/// Result of classifying one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Selected plan
    pub plan: Plan,
    /// Class of the rule that fired; `None` for the fallback
    pub trigger: Option<TriggerClass>,
    /// Extracted parameters
    pub params: Parameters,
    /// Original request text
    pub query: String,
}

impl Classification {
    /// Pattern of the selected plan.
    pub fn pattern(&self) -> Pattern {
        self.plan.pattern()
    }
}

struct CompiledRule {
    rule: TriggerRule,
    any_of: Vec<Regex>,
    all_of: Vec<Vec<Regex>>,
}

impl CompiledRule {
    fn matches(&self, text: &str, has_customer: bool) -> bool {
        if self.rule.requires_customer && !has_customer {
            return false;
        }
        let any = self.any_of.is_empty() || self.any_of.iter().any(|re| re.is_match(text));
        any && self
            .all_of
            .iter()
            .all(|group| group.iter().any(|re| re.is_match(text)))
    }
}

fn keyword_regex(keyword: &str) -> Result<Regex, ConfigError> {
    let phrase = keyword
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    if phrase.is_empty() {
        return Err(ConfigError::ValidationError(
            "trigger keywords cannot be empty".to_string(),
        ));
    }
    Regex::new(&format!(r"(?i)\b{phrase}\b"))
        .map_err(|e| {
            ConfigError::ValidationError(format!("invalid trigger keyword '{keyword}': {e}"))
        })
}

fn fixed_regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::ValidationError(e.to_string()))
}

/// Deterministic keyword classifier.
pub struct Classifier {
    rules: Vec<CompiledRule>,
    customer_ref: Regex,
    bare_number: Regex,
    email: Regex,
    priority: Regex,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Classifier {
    /// Compile a trigger table.
    pub fn new(triggers: Vec<TriggerRule>) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(triggers.len());
        for rule in triggers {
            if rule.any_of.is_empty() && rule.all_of.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "trigger for plan '{}' has no keywords",
                    rule.plan
                )));
            }
            let any_of = rule
                .any_of
                .iter()
                .map(|k| keyword_regex(k))
                .collect::<Result<Vec<_>, _>>()?;
            let all_of = rule
                .all_of
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|k| keyword_regex(k))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            rules.push(CompiledRule {
                rule,
                any_of,
                all_of,
            });
        }
        // Stable: table order is kept within a class.
        rules.sort_by_key(|r| r.rule.class);

        Ok(Self {
            rules,
            customer_ref: fixed_regex(r"(?i)\b(?:id|customer|record|account)\s*#?\s*(\d+)\b")?,
            bare_number: fixed_regex(r"\b(\d+)\b")?,
            email: fixed_regex(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            priority: fixed_regex(r"(?i)\b(high|medium|low)\b")?,
        })
    }

    /// Classifier with the default trigger table.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new(default_triggers())
    }

    /// Plans this classifier can select, the fallback included.
    pub fn plans(&self) -> Vec<Plan> {
        let mut plans = vec![Plan::SupportAnswer];
        for compiled in &self.rules {
            if !plans.contains(&compiled.rule.plan) {
                plans.push(compiled.rule.plan);
            }
        }
        plans
    }

    /// Extract parameters from the text.
    pub fn extract(&self, text: &str) -> Parameters {
        let customer_id = self
            .customer_ref
            .captures(text)
            .or_else(|| self.bare_number.captures(text))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
        let email = self.email.find(text).map(|m| m.as_str().to_string());
        let priority = self
            .priority
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase());

        Parameters {
            customer_id,
            email,
            priority,
        }
    }

    /// Classify a request. Never fails.
    pub fn classify(&self, text: &str) -> Classification {
        let params = self.extract(text);
        let has_customer = params.customer_id.is_some();

        let fired = self
            .rules
            .iter()
            .find(|compiled| compiled.matches(text, has_customer));
        let (plan, trigger) = match fired {
            Some(compiled) => (compiled.rule.plan, Some(compiled.rule.class)),
            None => (Plan::SupportAnswer, None),
        };

        debug!(
            plan = %plan,
            pattern = %plan.pattern(),
            trigger = ?trigger,
            customer_id = ?params.customer_id,
            "Request classified"
        );

        Classification {
            plan,
            trigger,
            params,
            query: text.to_string(),
        }
    }
}
