//! In-memory view of the product catalog.
//!
//! A [`CatalogSnapshot`] is immutable once built; refreshing means building a
//! new snapshot and swapping it in. Readers holding an older snapshot keep a
//! consistent, if stale, view.

pub mod matcher;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};

use crate::domain::product::{CategoryId, CategoryRecord, ProductId, ProductRecord};

pub use matcher::{ComparisonCheck, ProductMatcher};

#[derive(Clone, Debug)]
pub struct CatalogSnapshot {
    products: Vec<ProductRecord>,
    categories: Vec<CategoryRecord>,
    by_id: HashMap<ProductId, usize>,
    by_category: BTreeMap<CategoryId, Vec<usize>>,
    loaded_at: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    pub fn new(
        products: Vec<ProductRecord>,
        categories: Vec<CategoryRecord>,
        loaded_at: DateTime<Utc>,
    ) -> Self {
        let mut by_id = HashMap::with_capacity(products.len());
        let mut by_category: BTreeMap<CategoryId, Vec<usize>> = BTreeMap::new();
        for (index, product) in products.iter().enumerate() {
            by_id.insert(product.id, index);
            by_category.entry(product.category_id).or_default().push(index);
        }

        Self { products, categories, by_id, by_category, loaded_at: Some(loaded_at) }
    }

    /// A snapshot that has never been loaded. Always stale.
    pub fn empty() -> Self {
        Self {
            products: Vec::new(),
            categories: Vec::new(),
            by_id: HashMap::new(),
            by_category: BTreeMap::new(),
            loaded_at: None,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.loaded_at {
            Some(loaded_at) => now.signed_duration_since(loaded_at) >= ttl,
            None => true,
        }
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn products(&self) -> &[ProductRecord] {
        &self.products
    }

    pub fn categories(&self) -> &[CategoryRecord] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn product(&self, id: ProductId) -> Option<&ProductRecord> {
        self.by_id.get(&id).and_then(|index| self.products.get(*index))
    }

    pub fn products_in_category(
        &self,
        category_id: CategoryId,
    ) -> impl Iterator<Item = &ProductRecord> + '_ {
        self.by_category
            .get(&category_id)
            .into_iter()
            .flatten()
            .filter_map(|index| self.products.get(*index))
    }

    pub fn category_named(&self, name: &str) -> Option<&CategoryRecord> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.categories.iter().find(|category| {
            let candidate = category.name.to_lowercase();
            candidate == needle || candidate.contains(&needle)
        })
    }
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
