use async_trait::async_trait;
use thiserror::Error;

use construkt_core::audit::TurnLogEntry;
use construkt_core::domain::conversation::ConversationMemory;
use construkt_core::domain::product::{CategoryRecord, ProductFilter, ProductRecord};

pub mod catalog;
pub mod chat_log;
pub mod conversation;
pub mod memory;

pub use catalog::SqlCatalogRepository;
pub use chat_log::SqlChatLogRepository;
pub use conversation::FileConversationRepository;
pub use memory::{
    InMemoryCatalogRepository, InMemoryChatLogRepository, InMemoryConversationRepository,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the storefront catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductRecord>, RepositoryError>;

    /// Active categories with their active product counts, ordered by name.
    async fn get_categories(&self) -> Result<Vec<CategoryRecord>, RepositoryError>;
}

/// Durable per-user conversation memory.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<ConversationMemory>, RepositoryError>;

    async fn save(&self, memory: &ConversationMemory) -> Result<(), RepositoryError>;

    /// Returns whether a stored conversation existed.
    async fn delete(&self, user_id: &str) -> Result<bool, RepositoryError>;

    async fn list_user_ids(&self) -> Result<Vec<String>, RepositoryError>;
}

#[async_trait]
pub trait ChatLogRepository: Send + Sync {
    async fn record(&self, entry: &TurnLogEntry) -> Result<(), RepositoryError>;

    /// Most recent turns for `user_id`, newest first.
    async fn recent_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<TurnLogEntry>, RepositoryError>;
}
