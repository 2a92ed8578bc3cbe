use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{run_pending, MIGRATOR};
    use crate::connect_with_settings;

    const MANAGED_TABLES: &[&str] = &["categories", "suppliers", "products", "conversation_logs"];

    async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
        let mut names: Vec<String> = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await
            .expect("list tables")
            .into_iter()
            .map(|row| row.get::<String, _>("name"))
            .filter(|name| MANAGED_TABLES.contains(&name.as_str()))
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn migrations_create_catalog_and_log_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        assert_eq!(
            table_names(&pool).await,
            vec!["categories", "conversation_logs", "products", "suppliers"]
        );
    }

    #[tokio::test]
    async fn migrations_undo_and_reapply_cleanly() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        assert!(table_names(&pool).await.is_empty());

        run_pending(&pool).await.expect("re-run migrations");
        assert_eq!(table_names(&pool).await.len(), MANAGED_TABLES.len());
    }
}
