use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use construkt_core::audit::{AuditContext, AuditSink, TurnLogEntry, TurnLogSink};
use construkt_core::config::AppConfig;
use construkt_core::domain::calculator::CalculationReport;
use construkt_core::domain::conversation::{MemoryMutation, MessageRecord};
use construkt_core::domain::intent::Intent;
use construkt_core::domain::product::ProductRecord;
use construkt_core::errors::{ApplicationError, InterfaceError};
use construkt_core::intent::IntentRouter;

use crate::catalog_cache::CatalogCache;
use crate::conversation::{route, HandlerOutcome, TurnContext};
use crate::llm::{CategoryFallback, FallbackResponder};
use crate::replies;
use crate::state_store::ConversationStateStore;
use crate::store_info::{StaticStoreDirectory, StoreInfoProvider};
use crate::turn_log::TracingAuditSink;

/// Outcome of one message, as handed back to the transport layer.
#[derive(Clone, Debug, Serialize)]
pub struct TurnResult {
    pub correlation_id: String,
    pub intent: Intent,
    pub confidence: f64,
    /// `None` when the caller should use the generative fallback.
    pub response: Option<String>,
    pub products: Vec<ProductRecord>,
    pub primary_product: Option<ProductRecord>,
    pub calculation: Option<CalculationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnResult {
    fn failed(error: &InterfaceError) -> Self {
        Self {
            correlation_id: error.correlation_id().to_owned(),
            intent: Intent::Unknown,
            confidence: 0.0,
            response: Some(error.user_message().to_owned()),
            products: Vec::new(),
            primary_product: None,
            calculation: None,
            suggestions: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Entry point for inbound messages: route, handle, remember, log.
pub struct DialogueOrchestrator {
    config: Arc<AppConfig>,
    router: IntentRouter,
    catalog: Arc<CatalogCache>,
    state: Arc<ConversationStateStore>,
    store_info: Arc<dyn StoreInfoProvider>,
    fallback: Arc<dyn FallbackResponder>,
    audit: Arc<dyn AuditSink>,
    turn_log: Option<Arc<dyn TurnLogSink>>,
}

impl DialogueOrchestrator {
    pub fn new(
        config: Arc<AppConfig>,
        catalog: Arc<CatalogCache>,
        state: Arc<ConversationStateStore>,
    ) -> Self {
        Self {
            config,
            router: IntentRouter::new(),
            catalog,
            state,
            store_info: Arc::new(StaticStoreDirectory::default()),
            fallback: Arc::new(CategoryFallback),
            audit: Arc::new(TracingAuditSink),
            turn_log: None,
        }
    }

    pub fn with_store_info(mut self, store_info: Arc<dyn StoreInfoProvider>) -> Self {
        self.store_info = store_info;
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackResponder>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_turn_log(mut self, turn_log: Arc<dyn TurnLogSink>) -> Self {
        self.turn_log = Some(turn_log);
        self
    }

    pub fn state(&self) -> &Arc<ConversationStateStore> {
        &self.state
    }

    pub fn catalog(&self) -> &Arc<CatalogCache> {
        &self.catalog
    }

    /// Handles one message for `user_id`. Never fails: an internal error
    /// yields the generic apology with the diagnostic in `error`.
    pub async fn handle_message(&self, user_id: &str, message: &str) -> TurnResult {
        let correlation_id = Uuid::new_v4().to_string();
        match self.run_turn(user_id, message, &correlation_id).await {
            Ok(result) => result,
            Err(failure) => {
                error!(
                    event_name = "conversation.turn.failed",
                    correlation_id = %correlation_id,
                    user_id,
                    error = %failure,
                    "turn failed"
                );
                TurnResult::failed(&failure.into_interface(correlation_id))
            }
        }
    }

    /// Final text for a turn, consulting the fallback responder when the
    /// handler left the response empty.
    pub async fn reply_text(&self, user_id: &str, message: &str, result: &TurnResult) -> String {
        if let Some(response) = &result.response {
            return response.clone();
        }
        if !self.config.fallback.enabled {
            return replies::unknown(&result.suggestions);
        }
        match self.fallback.respond(user_id, message, &result.suggestions).await {
            Ok(reply) => reply,
            Err(failure) => {
                warn!(
                    event_name = "fallback.failed",
                    correlation_id = %result.correlation_id,
                    error = %failure,
                    "fallback responder failed, using category hints"
                );
                replies::unknown(&result.suggestions)
            }
        }
    }

    async fn run_turn(
        &self,
        user_id: &str,
        message: &str,
        correlation_id: &str,
    ) -> Result<TurnResult, ApplicationError> {
        let catalog = self.catalog.current().await;
        let mut guard = self.state.begin_turn(user_id).await;

        let classification = route(&self.router, message, guard.memory());
        let audit_context = AuditContext::new(user_id, correlation_id, "dialogue");
        let HandlerOutcome { response, products, primary, calculation, suggestions, mutations, reset } =
            TurnContext {
                message,
                memory: guard.memory(),
                catalog: &catalog,
                classification: &classification,
                config: &self.config,
                store_info: self.store_info.as_ref(),
                audit: self.audit.as_ref(),
                audit_context: &audit_context,
            }
            .handle();

        if reset {
            guard.reset();
        }

        let product_ids: Vec<_> = products.iter().map(|product| product.id).collect();
        let mut turn_mutations = Vec::with_capacity(mutations.len() + 3);
        turn_mutations.push(MemoryMutation::AppendMessage(MessageRecord::user(
            message,
            classification.intent,
        )));
        turn_mutations.push(MemoryMutation::RecordIntent {
            intent: classification.intent,
            confidence: classification.confidence,
        });
        turn_mutations.extend(mutations);
        if let Some(response) = &response {
            turn_mutations.push(MemoryMutation::AppendMessage(MessageRecord::assistant(
                response.clone(),
                product_ids.clone(),
            )));
        }
        self.state.commit(guard, turn_mutations).await?;

        if let Some(turn_log) = &self.turn_log {
            turn_log.record(
                TurnLogEntry::new(
                    user_id,
                    correlation_id,
                    message,
                    response.clone(),
                    classification.intent,
                    classification.confidence,
                )
                .with_products(product_ids),
            );
        }

        info!(
            event_name = "conversation.turn.completed",
            correlation_id,
            user_id,
            intent = classification.intent.as_str(),
            confidence = classification.confidence,
            products = products.len(),
            answered = response.is_some(),
            "turn completed"
        );

        Ok(TurnResult {
            correlation_id: correlation_id.to_owned(),
            intent: classification.intent,
            confidence: classification.confidence,
            response,
            products,
            primary_product: primary,
            calculation,
            suggestions,
            error: None,
        })
    }
}
