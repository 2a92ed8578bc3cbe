use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use construkt_core::catalog::CatalogSnapshot;
use construkt_core::config::CatalogConfig;
use construkt_core::domain::product::ProductFilter;
use construkt_core::errors::ApplicationError;
use construkt_db::repositories::{CatalogRepository, RepositoryError};

/// Time-boxed catalog snapshot shared by every turn.
///
/// Readers get an `Arc` to an immutable snapshot. A refresh builds a new one
/// and swaps it in; on failure the last good snapshot stays in place.
pub struct CatalogCache {
    repository: Arc<dyn CatalogRepository>,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    refresh_gate: Mutex<()>,
    ttl: Duration,
}

impl CatalogCache {
    pub fn new(repository: Arc<dyn CatalogRepository>, config: &CatalogConfig) -> Self {
        Self {
            repository,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::empty())),
            refresh_gate: Mutex::new(()),
            ttl: Duration::seconds(i64::try_from(config.ttl_secs).unwrap_or(i64::MAX)),
        }
    }

    /// Current snapshot, refreshed first when older than the TTL.
    pub async fn current(&self) -> Arc<CatalogSnapshot> {
        let snapshot = self.snapshot.read().await.clone();
        if !snapshot.is_stale(Utc::now(), self.ttl) {
            return snapshot;
        }

        let _gate = self.refresh_gate.lock().await;
        let snapshot = self.snapshot.read().await.clone();
        if !snapshot.is_stale(Utc::now(), self.ttl) {
            return snapshot;
        }

        match self.refresh().await {
            Ok(fresh) => fresh,
            Err(error) => {
                warn!(
                    event_name = "catalog.refresh.failed",
                    error = %error,
                    products = snapshot.products().len(),
                    "serving the last loaded catalog"
                );
                snapshot
            }
        }
    }

    /// Reloads products and categories and swaps the snapshot in.
    pub async fn refresh(&self) -> Result<Arc<CatalogSnapshot>, ApplicationError> {
        let unavailable = |error: RepositoryError| {
            ApplicationError::Collaborator(format!("catalog: {error}"))
        };
        let products =
            self.repository.get_products(&ProductFilter::default()).await.map_err(unavailable)?;
        let categories = self.repository.get_categories().await.map_err(unavailable)?;

        let fresh = Arc::new(CatalogSnapshot::new(products, categories, Utc::now()));
        debug!(
            event_name = "catalog.refresh.completed",
            products = fresh.products().len(),
            categories = fresh.categories().len(),
            "catalog snapshot refreshed"
        );
        *self.snapshot.write().await = fresh.clone();
        Ok(fresh)
    }
}
