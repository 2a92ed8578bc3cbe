pub mod audit;
pub mod calculator;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod intent;
pub mod recommend;

pub use audit::{AuditContext, AuditSink, TurnLogEntry, TurnLogSink};
pub use calculator::{CalculatorDialogue, CalculatorTurn};
pub use catalog::{CatalogSnapshot, ComparisonCheck, ProductMatcher};
pub use config::AppConfig;
pub use domain::calculator::{
    CalculationReport, CalculatorSession, DimensionKey, Dimensions, MaterialType,
};
pub use domain::conversation::{ConversationMemory, MemoryMutation, Topic};
pub use domain::intent::{AttributeTopic, Intent, IntentClassification};
pub use domain::product::{CategoryId, CategoryRecord, ProductId, ProductMatch, ProductRecord};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use intent::IntentRouter;
pub use recommend::{ComparisonReport, PriceGap, StockSuggestion};
