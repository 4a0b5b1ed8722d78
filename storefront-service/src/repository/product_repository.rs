use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use std::str::FromStr;

use crate::domain::money::{Currency, Money};
use crate::error::StoreError;
use crate::models::enums::ProductStatus;
use crate::models::product::Product;

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    pub limit: u32,
    pub offset: u32,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert(&self, product: &Product) -> Result<(), StoreError>;
    async fn find_by_id(&self, product_id: &str) -> Result<Option<Product>, StoreError>;
    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;
    async fn update(&self, product: &Product) -> Result<(), StoreError>;
    /// 返回 false 表示记录不存在
    async fn set_status(&self, product_id: &str, status: ProductStatus) -> Result<bool, StoreError>;
    /// 硬删除，仅用于创建失败时的补偿回滚
    async fn delete(&self, product_id: &str) -> Result<(), StoreError>;
}

pub struct MySqlProductRepository {
    pool: MySqlPool,
}

impl MySqlProductRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    product_id: String,
    name: String,
    price: i64,
    currency: String,
    category: String,
    brand: String,
    specifications: Option<serde_json::Value>,
    images: Option<serde_json::Value>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const PRODUCT_COLUMNS: &str = "product_id, name, price, currency, category, brand, \
     specifications, images, status, created_at, updated_at";

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            product_id: row.product_id,
            name: row.name,
            price: Money::new(
                row.price,
                Currency::from_code(&row.currency).unwrap_or(Currency::USD),
            ),
            category: row.category,
            brand: row.brand,
            specifications: row.specifications.unwrap_or_else(|| serde_json::json!({})),
            images: row
                .images
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            status: ProductStatus::from_str(&row.status).unwrap_or(ProductStatus::Active),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ProductRepository for MySqlProductRepository {
    async fn insert(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products
            (product_id, name, price, currency, category, brand,
             specifications, images, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.product_id)
        .bind(&product.name)
        .bind(product.price.amount)
        .bind(product.price.currency.code())
        .bind(&product.category)
        .bind(&product.brand)
        .bind(serde_json::to_string(&product.specifications).unwrap_or_else(|_| "{}".to_string()))
        .bind(serde_json::to_string(&product.images).unwrap_or_else(|_| "[]".to_string()))
        .bind(product.status.to_string())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(())
    }

    async fn find_by_id(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(row.map(Product::from))
    }

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE category = COALESCE(?, category)
              AND status = COALESCE(?, status)
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(filter.category.as_deref())
        .bind(filter.status.map(|s| s.to_string()))
        .bind(filter.limit as i64)
        .bind(filter.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn update(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE products
            SET name = ?, price = ?, currency = ?, category = ?, brand = ?,
                specifications = ?, images = ?, updated_at = ?
            WHERE product_id = ?
            "#,
        )
        .bind(&product.name)
        .bind(product.price.amount)
        .bind(product.price.currency.code())
        .bind(&product.category)
        .bind(&product.brand)
        .bind(serde_json::to_string(&product.specifications).unwrap_or_else(|_| "{}".to_string()))
        .bind(serde_json::to_string(&product.images).unwrap_or_else(|_| "[]".to_string()))
        .bind(Utc::now())
        .bind(&product.product_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(())
    }

    async fn set_status(&self, product_id: &str, status: ProductStatus) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products SET status = ?, updated_at = ? WHERE product_id = ?
            "#,
        )
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(product_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, product_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM products WHERE product_id = ?")
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        Ok(())
    }
}
