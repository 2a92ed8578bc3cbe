use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use construkt_core::audit::TurnLogEntry;
use construkt_core::domain::conversation::ConversationMemory;
use construkt_core::domain::product::{CategoryRecord, ProductFilter, ProductRecord};

use super::{CatalogRepository, ChatLogRepository, ConversationRepository, RepositoryError};

/// Catalog fake with the same filter semantics as the SQL repository.
#[derive(Default)]
pub struct InMemoryCatalogRepository {
    products: RwLock<Vec<ProductRecord>>,
    categories: RwLock<Vec<CategoryRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryCatalogRepository {
    pub fn new(products: Vec<ProductRecord>, categories: Vec<CategoryRecord>) -> Self {
        Self {
            products: RwLock::new(products),
            categories: RwLock::new(categories),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent read fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn replace_products(&self, products: Vec<ProductRecord>) {
        *self.products.write().await = products;
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("catalog store is offline".to_owned()));
        }
        Ok(())
    }
}

fn matches_filter(product: &ProductRecord, filter: &ProductFilter, search: Option<&str>) -> bool {
    if filter.category_id.is_some_and(|id| id != product.category_id) {
        return false;
    }
    if filter.product_id.is_some_and(|id| id != product.id) {
        return false;
    }
    if filter.in_stock_only && !product.in_stock() {
        return false;
    }
    match search {
        Some(needle) => {
            product.name.to_lowercase().contains(needle)
                || product.description.to_lowercase().contains(needle)
        }
        None => true,
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn get_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductRecord>, RepositoryError> {
        self.check_available()?;
        let search = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut products: Vec<ProductRecord> = self
            .products
            .read()
            .await
            .iter()
            .filter(|product| matches_filter(product, filter, search.as_deref()))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(limit) = filter.limit {
            products.truncate(limit as usize);
        }
        Ok(products)
    }

    async fn get_categories(&self) -> Result<Vec<CategoryRecord>, RepositoryError> {
        self.check_available()?;
        let products = self.products.read().await;
        let mut categories: Vec<CategoryRecord> = self
            .categories
            .read()
            .await
            .iter()
            .map(|category| {
                let count = products.iter().filter(|p| p.category_id == category.id).count();
                CategoryRecord {
                    product_count: u32::try_from(count).ok(),
                    ..category.clone()
                }
            })
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    memories: RwLock<HashMap<String, ConversationMemory>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn load(&self, user_id: &str) -> Result<Option<ConversationMemory>, RepositoryError> {
        Ok(self.memories.read().await.get(user_id).cloned())
    }

    async fn save(&self, memory: &ConversationMemory) -> Result<(), RepositoryError> {
        self.memories.write().await.insert(memory.user_id.clone(), memory.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.memories.write().await.remove(user_id).is_some())
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, RepositoryError> {
        let mut ids: Vec<String> = self.memories.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Default)]
pub struct InMemoryChatLogRepository {
    entries: RwLock<Vec<TurnLogEntry>>,
}

impl InMemoryChatLogRepository {
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait::async_trait]
impl ChatLogRepository for InMemoryChatLogRepository {
    async fn record(&self, entry: &TurnLogEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        if !entries.iter().any(|existing| existing.event_id == entry.event_id) {
            entries.push(entry.clone());
        }
        Ok(())
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<TurnLogEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        let mut recent: Vec<TurnLogEntry> =
            entries.iter().filter(|entry| entry.user_id == user_id).cloned().collect();
        recent.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use construkt_core::audit::TurnLogEntry;
    use construkt_core::domain::conversation::ConversationMemory;
    use construkt_core::domain::intent::Intent;
    use construkt_core::domain::product::{
        CategoryId, CategoryRecord, ProductFilter, ProductId, ProductRecord,
    };

    use super::{InMemoryCatalogRepository, InMemoryChatLogRepository, InMemoryConversationRepository};
    use crate::repositories::{
        CatalogRepository, ChatLogRepository, ConversationRepository, RepositoryError,
    };

    fn product(id: i64, name: &str, category: i64, stock: i64) -> ProductRecord {
        ProductRecord {
            id: ProductId(id),
            name: name.to_owned(),
            description: String::new(),
            price: Decimal::new(1000, 2),
            unit: "each".to_owned(),
            stock_quantity: stock,
            category_id: CategoryId(category),
            category_name: format!("Category {category}"),
            supplier_id: None,
            supplier_name: None,
            attributes: BTreeMap::new(),
        }
    }

    fn category(id: i64, name: &str) -> CategoryRecord {
        CategoryRecord {
            id: CategoryId(id),
            name: name.to_owned(),
            description: String::new(),
            product_count: None,
        }
    }

    fn catalog() -> InMemoryCatalogRepository {
        InMemoryCatalogRepository::new(
            vec![
                product(1, "Wood Screws", 2, 10),
                product(2, "Roofing Nails", 2, 0),
                product(3, "Portland Cement", 1, 5),
            ],
            vec![category(2, "Fasteners"), category(1, "Cement")],
        )
    }

    #[tokio::test]
    async fn product_filters_mirror_the_sql_repository() {
        let repo = catalog();

        let fasteners = repo
            .get_products(&ProductFilter { category_id: Some(CategoryId(2)), ..ProductFilter::default() })
            .await
            .expect("fasteners");
        assert_eq!(
            fasteners.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["Roofing Nails", "Wood Screws"]
        );

        let in_stock = repo
            .get_products(&ProductFilter {
                category_id: Some(CategoryId(2)),
                in_stock_only: true,
                ..ProductFilter::default()
            })
            .await
            .expect("in stock");
        assert_eq!(in_stock.len(), 1);

        let search = repo
            .get_products(&ProductFilter { search: Some("  CEMENT ".to_owned()), ..ProductFilter::default() })
            .await
            .expect("search");
        assert_eq!(search[0].id, ProductId(3));
    }

    #[tokio::test]
    async fn categories_count_products_and_sort_by_name() {
        let categories = catalog().get_categories().await.expect("categories");

        assert_eq!(categories[0].name, "Cement");
        assert_eq!(categories[0].product_count, Some(1));
        assert_eq!(categories[1].product_count, Some(2));
    }

    #[tokio::test]
    async fn unavailable_catalog_fails_reads() {
        let repo = catalog();
        repo.set_unavailable(true);

        let error = repo.get_categories().await.expect_err("offline catalog must fail");
        assert!(matches!(error, RepositoryError::Unavailable(_)));

        repo.set_unavailable(false);
        assert!(repo.get_categories().await.is_ok());
    }

    #[tokio::test]
    async fn conversations_save_load_and_delete() {
        let repo = InMemoryConversationRepository::default();
        repo.save(&ConversationMemory::new("b")).await.expect("save b");
        repo.save(&ConversationMemory::new("a")).await.expect("save a");

        assert_eq!(repo.list_user_ids().await.expect("list"), vec!["a", "b"]);
        assert!(repo.delete("a").await.expect("delete"));
        assert!(repo.load("a").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn chat_log_returns_newest_first_without_duplicates() {
        let repo = InMemoryChatLogRepository::default();
        let older = TurnLogEntry::new("u", "c-1", "hi", None, Intent::Greeting, 0.95);
        let mut newer = TurnLogEntry::new("u", "c-2", "help", None, Intent::Help, 0.95);
        newer.occurred_at = older.occurred_at + chrono::Duration::seconds(5);

        repo.record(&older).await.expect("record");
        repo.record(&older).await.expect("record duplicate");
        repo.record(&newer).await.expect("record newer");

        assert_eq!(repo.len().await, 2);
        let recent = repo.recent_for_user("u", 5).await.expect("recent");
        assert_eq!(recent[0].correlation_id, "c-2");
    }
}
