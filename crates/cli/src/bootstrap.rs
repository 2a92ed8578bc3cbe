use std::sync::Arc;

use construkt_agent::{
    CatalogCache, ConversationStateStore, DialogueOrchestrator, RepositoryTurnLogSink,
};
use construkt_core::config::AppConfig;
use construkt_db::repositories::{
    FileConversationRepository, SqlCatalogRepository, SqlChatLogRepository,
};
use construkt_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: Arc<AppConfig>,
    pub db_pool: DbPool,
    pub orchestrator: DialogueOrchestrator,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

impl BootstrapError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::DatabaseConnect(_) => "db_connectivity",
            Self::Migration(_) => "migration",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::DatabaseConnect(_) => 4,
            Self::Migration(_) => 5,
        }
    }
}

/// Conversation store backed by the configured JSON file directory.
pub fn conversation_store(config: &AppConfig) -> ConversationStateStore {
    ConversationStateStore::new(
        Arc::new(FileConversationRepository::new(config.conversation.storage_dir.clone())),
        &config.conversation,
    )
}

/// Connects, migrates and wires the orchestrator over the SQL catalog, the
/// file conversation store and the SQL chat log.
pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let catalog = CatalogCache::new(
        Arc::new(SqlCatalogRepository::new(db_pool.clone())),
        &config.catalog,
    );
    let state = conversation_store(&config);
    let turn_log = RepositoryTurnLogSink::new(Arc::new(SqlChatLogRepository::new(db_pool.clone())));

    let config = Arc::new(config);
    let orchestrator =
        DialogueOrchestrator::new(Arc::clone(&config), Arc::new(catalog), Arc::new(state))
            .with_turn_log(Arc::new(turn_log));

    Ok(Application { config, db_pool, orchestrator })
}
