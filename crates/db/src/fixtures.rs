use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Spot checks the demo catalog must satisfy after loading: `(label, query, expected)`.
const CATALOG_CONTRACT: &[(&str, &str, i64)] = &[
    ("categories", "SELECT COUNT(1) FROM categories WHERE is_active = 1", 10),
    ("products", "SELECT COUNT(1) FROM products WHERE is_active = 1", 23),
    ("out-of-stock", "SELECT COUNT(1) FROM products WHERE stock_quantity = 0", 2),
    (
        "tile-coverage",
        "SELECT COUNT(1) FROM products WHERE id = 15 AND json_extract(dimensions, '$.coverage') = 1.5",
        1,
    ),
];

/// Demo storefront catalog used by `construkt seed` and the integration tests.
pub struct DemoCatalogSeed;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub categories: i64,
    pub products: i64,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub checks: Vec<(&'static str, bool)>,
}

impl VerificationResult {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|(_, passed)| *passed)
    }

    pub fn failed(&self) -> Vec<&'static str> {
        self.checks.iter().filter(|(_, passed)| !passed).map(|(label, _)| *label).collect()
    }
}

impl DemoCatalogSeed {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_catalog.sql");

    /// Loads the demo catalog. Re-running replaces the seeded rows in place.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let categories: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM categories")
            .fetch_one(pool)
            .await?;
        let products: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM products").fetch_one(pool).await?;

        Ok(SeedResult { categories, products })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(CATALOG_CONTRACT.len());
        for (label, query, expected) in CATALOG_CONTRACT {
            let actual: i64 = sqlx::query_scalar(query).fetch_one(pool).await?;
            checks.push((*label, actual == *expected));
        }
        Ok(VerificationResult { checks })
    }
}
