use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;

use construkt_core::audit::TurnLogEntry;
use construkt_core::domain::intent::Intent;
use construkt_core::domain::product::ProductId;

use super::{ChatLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlChatLogRepository {
    pool: DbPool,
}

impl SqlChatLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_intent(value: &str) -> Result<Intent, RepositoryError> {
    serde_json::from_value(Value::String(value.to_owned()))
        .map_err(|e| RepositoryError::Decode(format!("intent `{value}`: {e}")))
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<TurnLogEntry, RepositoryError> {
    let get_err = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
    let intent: String = row.try_get("intent").map_err(get_err)?;
    let product_ids: String = row.try_get("product_ids").map_err(get_err)?;
    let created_at: String = row.try_get("created_at").map_err(get_err)?;

    let products: Vec<i64> = serde_json::from_str(&product_ids)
        .map_err(|e| RepositoryError::Decode(format!("product_ids: {e}")))?;
    let occurred_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at: {e}")))?;

    Ok(TurnLogEntry {
        event_id: row.try_get("event_id").map_err(get_err)?,
        user_id: row.try_get("user_id").map_err(get_err)?,
        correlation_id: row.try_get("correlation_id").map_err(get_err)?,
        user_message: row.try_get("user_message").map_err(get_err)?,
        bot_response: row.try_get("bot_response").map_err(get_err)?,
        intent: parse_intent(&intent)?,
        confidence: row.try_get("confidence").map_err(get_err)?,
        products: products.into_iter().map(ProductId).collect(),
        occurred_at,
    })
}

#[async_trait::async_trait]
impl ChatLogRepository for SqlChatLogRepository {
    async fn record(&self, entry: &TurnLogEntry) -> Result<(), RepositoryError> {
        let product_ids = serde_json::to_string(
            &entry.products.iter().map(|id| id.0).collect::<Vec<_>>(),
        )
        .map_err(|e| RepositoryError::Encode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO conversation_logs (event_id, user_id, correlation_id, user_message,
                                            bot_response, intent, confidence, product_ids, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(event_id) DO NOTHING",
        )
        .bind(&entry.event_id)
        .bind(&entry.user_id)
        .bind(&entry.correlation_id)
        .bind(&entry.user_message)
        .bind(&entry.bot_response)
        .bind(entry.intent.as_str())
        .bind(entry.confidence)
        .bind(product_ids)
        .bind(entry.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<TurnLogEntry>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT event_id, user_id, correlation_id, user_message, bot_response, intent,
                    confidence, product_ids, created_at
             FROM conversation_logs
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use construkt_core::audit::TurnLogEntry;
    use construkt_core::domain::intent::Intent;
    use construkt_core::domain::product::ProductId;

    use super::SqlChatLogRepository;
    use crate::repositories::ChatLogRepository;
    use crate::{connect_with_settings, migrations};

    async fn repo() -> SqlChatLogRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlChatLogRepository::new(pool)
    }

    #[tokio::test]
    async fn recorded_turns_come_back_newest_first() {
        let repo = repo().await;
        let first = TurnLogEntry::new("u-1", "c-1", "hi", Some("Hello!".to_owned()), Intent::Greeting, 0.95);
        let mut second = TurnLogEntry::new("u-1", "c-2", "cement", None, Intent::ProductSearch, 0.6)
            .with_products(vec![ProductId(1), ProductId(2)]);
        second.occurred_at = first.occurred_at + chrono::Duration::seconds(1);
        let other_user = TurnLogEntry::new("u-2", "c-3", "help", None, Intent::Help, 0.95);

        for entry in [&first, &second, &other_user] {
            repo.record(entry).await.expect("record turn");
        }

        let recent = repo.recent_for_user("u-1", 10).await.expect("recent turns");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].correlation_id, "c-2");
        assert_eq!(recent[0].intent, Intent::ProductSearch);
        assert_eq!(recent[0].products, vec![ProductId(1), ProductId(2)]);
        assert_eq!(recent[0].bot_response, None);
        assert_eq!(recent[1].bot_response.as_deref(), Some("Hello!"));

        let limited = repo.recent_for_user("u-1", 1).await.expect("limited");
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn recording_the_same_event_twice_is_idempotent() {
        let repo = repo().await;
        let entry = TurnLogEntry::new("u-1", "c-1", "hi", None, Intent::Greeting, 0.95);

        repo.record(&entry).await.expect("first insert");
        repo.record(&entry).await.expect("duplicate insert");

        assert_eq!(repo.recent_for_user("u-1", 10).await.expect("recent").len(), 1);
    }
}
