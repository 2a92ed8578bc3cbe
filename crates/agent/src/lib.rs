//! Dialogue runtime for the Construkt assistant.
//!
//! Wires the deterministic core to its collaborators:
//! - `state_store` keeps per-user conversation memory, serialized per user
//!   and persisted through a `ConversationRepository`.
//! - `catalog_cache` serves a TTL-bounded catalog snapshot.
//! - `conversation` routes a message in context and runs the intent handler.
//! - `runtime` drives a whole turn and records it.
//!
//! # Safety Principle
//!
//! The generative fallback (`llm`) only phrases replies for unrecognized
//! messages. Prices, stock and quantities always come from the catalog and
//! the calculator.

pub mod catalog_cache;
pub mod conversation;
pub mod llm;
pub mod replies;
pub mod runtime;
pub mod state_store;
pub mod store_info;
pub mod turn_log;

pub use catalog_cache::CatalogCache;
pub use llm::{CategoryFallback, FallbackResponder};
pub use runtime::{DialogueOrchestrator, TurnResult};
pub use state_store::ConversationStateStore;
pub use store_info::{StaticStoreDirectory, StoreInfoProvider};
pub use turn_log::{RepositoryTurnLogSink, TracingAuditSink};
