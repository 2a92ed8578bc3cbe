use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::calculator::CalculatorSession;
use crate::domain::intent::Intent;
use crate::domain::product::{ProductId, ProductRecord};

pub const DEFAULT_INTENT_HISTORY_LIMIT: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Product,
    Calculator,
    StoreInfo,
    #[default]
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwaitingKind {
    MoreInfo,
    Dimensions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub intent: Option<Intent>,
    #[serde(default)]
    pub products: Vec<ProductId>,
}

impl MessageRecord {
    pub fn user(text: impl Into<String>, intent: Intent) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
            intent: Some(intent),
            products: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>, products: Vec<ProductId>) -> Self {
        Self { role: Role::Assistant, text: text.into(), timestamp: Utc::now(), intent: None, products }
    }
}

/// Per-user durable conversation state.
///
/// The message log has no length cap. `mentioned_products` only grows and is
/// de-duplicated by id in first-mention order; `current_product`, when set, is
/// always one of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMemory {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub mentioned_products: Vec<ProductRecord>,
    pub current_product: Option<ProductRecord>,
    #[serde(default)]
    pub comparison_products: Vec<ProductRecord>,
    pub last_intent: Option<Intent>,
    #[serde(default)]
    pub last_confidence: f64,
    #[serde(default)]
    pub intent_history: Vec<Intent>,
    #[serde(default)]
    pub calculator: CalculatorSession,
    #[serde(default)]
    pub topic: Topic,
    #[serde(default)]
    pub awaiting_response: bool,
    pub awaiting: Option<AwaitingKind>,
}

/// Named change to a [`ConversationMemory`]. Handlers return these instead of
/// writing to memory directly; the orchestrator applies them in order under the
/// user's lock.
#[derive(Clone, Debug, PartialEq)]
pub enum MemoryMutation {
    AppendMessage(MessageRecord),
    MentionProducts(Vec<ProductRecord>),
    SetCurrentProduct(ProductRecord),
    SetComparison(Vec<ProductRecord>),
    RecordIntent { intent: Intent, confidence: f64 },
    SetTopic(Topic),
    SetAwaiting(Option<AwaitingKind>),
    ReplaceCalculator(CalculatorSession),
}

impl ConversationMemory {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            created_at: now,
            last_access: now,
            messages: Vec::new(),
            mentioned_products: Vec::new(),
            current_product: None,
            comparison_products: Vec::new(),
            last_intent: None,
            last_confidence: 0.0,
            intent_history: Vec::new(),
            calculator: CalculatorSession::default(),
            topic: Topic::None,
            awaiting_response: false,
            awaiting: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_access = Utc::now();
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now.signed_duration_since(self.last_access) > timeout
    }

    pub fn has_mentioned(&self, id: ProductId) -> bool {
        self.mentioned_products.iter().any(|product| product.id == id)
    }

    pub fn mentioned_ids(&self) -> Vec<ProductId> {
        self.mentioned_products.iter().map(|product| product.id).collect()
    }

    pub fn apply(&mut self, mutation: MemoryMutation, history_limit: usize) {
        match mutation {
            MemoryMutation::AppendMessage(message) => self.messages.push(message),
            MemoryMutation::MentionProducts(products) => {
                for product in products {
                    self.mention(product);
                }
            }
            MemoryMutation::SetCurrentProduct(product) => {
                self.mention(product.clone());
                self.current_product = Some(product);
            }
            MemoryMutation::SetComparison(products) => {
                for product in &products {
                    self.mention(product.clone());
                }
                self.comparison_products = products;
            }
            MemoryMutation::RecordIntent { intent, confidence } => {
                self.last_intent = Some(intent);
                self.last_confidence = confidence;
                self.intent_history.push(intent);
                if self.intent_history.len() > history_limit {
                    let overflow = self.intent_history.len() - history_limit;
                    self.intent_history.drain(..overflow);
                }
            }
            MemoryMutation::SetTopic(topic) => self.topic = topic,
            MemoryMutation::SetAwaiting(kind) => {
                self.awaiting_response = kind.is_some();
                self.awaiting = kind;
            }
            MemoryMutation::ReplaceCalculator(session) => self.calculator = session,
        }
    }

    pub fn apply_all(
        &mut self,
        mutations: impl IntoIterator<Item = MemoryMutation>,
        history_limit: usize,
    ) {
        for mutation in mutations {
            self.apply(mutation, history_limit);
        }
    }

    fn mention(&mut self, product: ProductRecord) {
        match self.mentioned_products.iter_mut().find(|existing| existing.id == product.id) {
            Some(existing) => *existing = product,
            None => self.mentioned_products.push(product),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{ConversationMemory, MemoryMutation, MessageRecord, Topic};
    use crate::domain::intent::Intent;
    use crate::domain::product::{Attributes, CategoryId, ProductId, ProductRecord};

    fn product(id: i64, name: &str) -> ProductRecord {
        ProductRecord {
            id: ProductId(id),
            name: name.to_owned(),
            description: String::new(),
            price: Decimal::new(1250, 2),
            unit: "bag".to_owned(),
            stock_quantity: 10,
            category_id: CategoryId(1),
            category_name: "Concrete & Cement".to_owned(),
            supplier_id: None,
            supplier_name: None,
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn current_product_is_always_mentioned() {
        let mut memory = ConversationMemory::new("u-1");
        memory.apply(MemoryMutation::SetCurrentProduct(product(1, "Portland Cement")), 20);

        assert_eq!(memory.mentioned_ids(), vec![ProductId(1)]);
        assert_eq!(memory.current_product.as_ref().map(|p| p.id), Some(ProductId(1)));
    }

    #[test]
    fn mentioned_products_are_deduplicated_in_first_mention_order() {
        let mut memory = ConversationMemory::new("u-1");
        memory.apply_all(
            [
                MemoryMutation::MentionProducts(vec![product(2, "Red Brick"), product(1, "Cement")]),
                MemoryMutation::MentionProducts(vec![product(1, "Cement"), product(3, "Sand")]),
            ],
            20,
        );

        assert_eq!(memory.mentioned_ids(), vec![ProductId(2), ProductId(1), ProductId(3)]);
    }

    #[test]
    fn intent_history_is_bounded() {
        let mut memory = ConversationMemory::new("u-1");
        for _ in 0..25 {
            memory.apply(MemoryMutation::RecordIntent { intent: Intent::Greeting, confidence: 0.9 }, 20);
        }
        memory.apply(MemoryMutation::RecordIntent { intent: Intent::Help, confidence: 0.9 }, 20);

        assert_eq!(memory.intent_history.len(), 20);
        assert_eq!(memory.intent_history.last(), Some(&Intent::Help));
        assert_eq!(memory.last_intent, Some(Intent::Help));
    }

    #[test]
    fn message_log_is_append_only() {
        let mut memory = ConversationMemory::new("u-1");
        for turn in 0..60 {
            memory.apply(
                MemoryMutation::AppendMessage(MessageRecord::user(format!("msg {turn}"), Intent::Unknown)),
                20,
            );
        }
        memory.apply(MemoryMutation::SetTopic(Topic::Calculator), 20);

        assert_eq!(memory.messages.len(), 60);
        assert_eq!(memory.messages[0].text, "msg 0");
    }

    #[test]
    fn expiry_uses_last_access() {
        let mut memory = ConversationMemory::new("u-1");
        memory.last_access = Utc::now() - Duration::seconds(7200);

        assert!(memory.is_expired(Utc::now(), Duration::seconds(3600)));
        memory.touch();
        assert!(!memory.is_expired(Utc::now(), Duration::seconds(3600)));
    }

    #[test]
    fn memory_round_trips_through_json_with_float_prices() {
        let mut memory = ConversationMemory::new("u-7");
        memory.apply(MemoryMutation::SetCurrentProduct(product(1, "Portland Cement")), 20);

        let encoded = serde_json::to_value(&memory).expect("serialize");
        assert_eq!(encoded["current_product"]["price"], serde_json::json!(12.5));

        let decoded: ConversationMemory = serde_json::from_value(encoded).expect("deserialize");
        assert_eq!(decoded, memory);
    }
}
