use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use construkt_core::domain::product::{
    parse_attributes, CategoryId, CategoryRecord, ProductFilter, ProductId, ProductRecord,
    SupplierId,
};

use super::{CatalogRepository, RepositoryError};
use crate::DbPool;

const UNCATEGORISED: &str = "General";

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<ProductRecord, RepositoryError> {
    let id: i64 = decode(row, "id")?;
    let price_text: String = decode(row, "price")?;
    let price = Decimal::from_str(price_text.trim())
        .map_err(|e| RepositoryError::Decode(format!("price of product {id}: {e}")))?;
    let category_id: Option<i64> = decode(row, "category_id")?;
    let category_name: Option<String> = decode(row, "category_name")?;
    let supplier_id: Option<i64> = decode(row, "supplier_id")?;
    let dimensions: Option<String> = decode(row, "dimensions")?;

    Ok(ProductRecord {
        id: ProductId(id),
        name: decode(row, "name")?,
        description: decode(row, "description")?,
        price,
        unit: decode(row, "unit")?,
        stock_quantity: decode(row, "stock_quantity")?,
        category_id: CategoryId(category_id.unwrap_or_default()),
        category_name: category_name.unwrap_or_else(|| UNCATEGORISED.to_owned()),
        supplier_id: supplier_id.map(SupplierId),
        supplier_name: decode(row, "supplier_name")?,
        attributes: parse_attributes(dimensions.as_deref()),
    })
}

fn row_to_category(row: &sqlx::sqlite::SqliteRow) -> Result<CategoryRecord, RepositoryError> {
    let product_count: i64 = decode(row, "product_count")?;
    Ok(CategoryRecord {
        id: CategoryId(decode(row, "id")?),
        name: decode(row, "name")?,
        description: decode(row, "description")?,
        product_count: u32::try_from(product_count).ok(),
    })
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn get_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductRecord>, RepositoryError> {
        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let limit = filter.limit.map(i64::from).unwrap_or(-1);

        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT p.id, p.name, p.description, p.price, p.unit, p.stock_quantity,
                    p.category_id, c.name AS category_name,
                    p.supplier_id, s.company_name AS supplier_name, p.dimensions
             FROM products p
             LEFT JOIN categories c ON c.id = p.category_id
             LEFT JOIN suppliers s ON s.id = p.supplier_id
             WHERE p.is_active = 1
               AND (?1 IS NULL OR p.category_id = ?1)
               AND (?2 IS NULL OR p.id = ?2)
               AND (?3 IS NULL OR p.name LIKE '%' || ?3 || '%' OR p.description LIKE '%' || ?3 || '%')
               AND (?4 = 0 OR p.stock_quantity > 0)
             ORDER BY p.name ASC
             LIMIT ?5",
        )
        .bind(filter.category_id.map(|id| id.0))
        .bind(filter.product_id.map(|id| id.0))
        .bind(search)
        .bind(filter.in_stock_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()
    }

    async fn get_categories(&self) -> Result<Vec<CategoryRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT c.id, c.name, c.description, COUNT(p.id) AS product_count
             FROM categories c
             LEFT JOIN products p ON p.category_id = c.id AND p.is_active = 1
             WHERE c.is_active = 1
             GROUP BY c.id, c.name, c.description
             ORDER BY c.name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_category).collect::<Result<Vec<_>, _>>()
    }
}
