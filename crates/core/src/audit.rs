use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::intent::Intent;
use crate::domain::product::ProductId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Conversation,
    Calculator,
    Catalog,
    Persistence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub user_id: String,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        user_id: impl Into<String>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self { user_id: user_id.into(), correlation_id: correlation_id.into(), actor: actor.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub user_id: String,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        user_id: impl Into<String>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// One completed conversational turn, written to the chat log store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnLogEntry {
    pub event_id: String,
    pub user_id: String,
    pub correlation_id: String,
    pub user_message: String,
    pub bot_response: Option<String>,
    pub intent: Intent,
    pub confidence: f64,
    pub products: Vec<ProductId>,
    pub occurred_at: DateTime<Utc>,
}

impl TurnLogEntry {
    pub fn new(
        user_id: impl Into<String>,
        correlation_id: impl Into<String>,
        user_message: impl Into<String>,
        bot_response: Option<String>,
        intent: Intent,
        confidence: f64,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            correlation_id: correlation_id.into(),
            user_message: user_message.into(),
            bot_response,
            intent,
            confidence,
            products: Vec::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_products(mut self, products: Vec<ProductId>) -> Self {
        self.products = products;
        self
    }
}

/// Receives completed turns. Implementations must return immediately; any
/// storage work happens off the reply path.
pub trait TurnLogSink: Send + Sync {
    fn record(&self, entry: TurnLogEntry);
}

#[derive(Clone, Default)]
pub struct InMemoryTurnLogSink {
    entries: Arc<Mutex<Vec<TurnLogEntry>>>,
}

impl InMemoryTurnLogSink {
    pub fn entries(&self) -> Vec<TurnLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TurnLogSink for InMemoryTurnLogSink {
    fn record(&self, entry: TurnLogEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
