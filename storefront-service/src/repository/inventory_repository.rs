use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use std::str::FromStr;

use crate::error::StoreError;
use crate::models::enums::ProductStatus;
use crate::models::inventory::InventoryRecord;

/// 库存表访问接口。所有扣减/预留都必须走带条件的单行更新，
/// 由存储端保证原子性，调用方据 `true/false` 判断条件是否成立。
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn insert(&self, record: &InventoryRecord) -> Result<(), StoreError>;
    async fn find_by_product(&self, product_id: &str) -> Result<Option<InventoryRecord>, StoreError>;
    /// 条件: status=ACTIVE 且 stock - reserved >= qty
    async fn try_reserve(&self, product_id: &str, quantity: u32) -> Result<bool, StoreError>;
    /// 预留回收，clamp 到 0，不会变负
    async fn release(&self, product_id: &str, quantity: u32) -> Result<(), StoreError>;
    /// 条件: reserved >= qty 且 stock >= qty，同时扣减两边
    async fn try_commit(&self, product_id: &str, quantity: u32) -> Result<bool, StoreError>;
    /// 条件: stock + delta >= 0
    async fn try_adjust(&self, product_id: &str, delta: i64) -> Result<bool, StoreError>;
    async fn set_status(&self, product_id: &str, status: ProductStatus) -> Result<bool, StoreError>;
}

pub struct MySqlInventoryRepository {
    pool: MySqlPool,
}

impl MySqlInventoryRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    product_id: String,
    stock: i32,
    reserved: i32,
    low_stock_threshold: i32,
    reorder_point: i32,
    status: String,
    last_updated: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryRecord {
    fn from(row: InventoryRow) -> Self {
        InventoryRecord {
            product_id: row.product_id,
            stock: row.stock,
            reserved: row.reserved,
            low_stock_threshold: row.low_stock_threshold,
            reorder_point: row.reorder_point,
            status: ProductStatus::from_str(&row.status).unwrap_or(ProductStatus::Active),
            last_updated: row.last_updated,
        }
    }
}

#[async_trait]
impl InventoryRepository for MySqlInventoryRepository {
    async fn insert(&self, record: &InventoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory
            (product_id, stock, reserved, low_stock_threshold, reorder_point, status, last_updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.product_id)
        .bind(record.stock)
        .bind(record.reserved)
        .bind(record.low_stock_threshold)
        .bind(record.reorder_point)
        .bind(record.status.to_string())
        .bind(record.last_updated)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(())
    }

    async fn find_by_product(&self, product_id: &str) -> Result<Option<InventoryRecord>, StoreError> {
        let row = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT product_id, stock, reserved, low_stock_threshold, reorder_point,
                   status, last_updated
            FROM inventory WHERE product_id = ?
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(row.map(InventoryRecord::from))
    }

    async fn try_reserve(&self, product_id: &str, quantity: u32) -> Result<bool, StoreError> {
        // 条件写在 WHERE 里，读-改-写竞态交给存储端裁决
        let result = sqlx::query(
            r#"
            UPDATE inventory
            SET reserved = reserved + ?, last_updated = ?
            WHERE product_id = ? AND status = 'ACTIVE' AND stock - reserved >= ?
            "#,
        )
        .bind(quantity as i32)
        .bind(Utc::now())
        .bind(product_id)
        .bind(quantity as i32)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, product_id: &str, quantity: u32) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE inventory
            SET reserved = reserved - LEAST(reserved, ?), last_updated = ?
            WHERE product_id = ?
            "#,
        )
        .bind(quantity as i32)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(())
    }

    async fn try_commit(&self, product_id: &str, quantity: u32) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE inventory
            SET stock = stock - ?, reserved = reserved - ?, last_updated = ?
            WHERE product_id = ? AND reserved >= ? AND stock >= ?
            "#,
        )
        .bind(quantity as i32)
        .bind(quantity as i32)
        .bind(Utc::now())
        .bind(product_id)
        .bind(quantity as i32)
        .bind(quantity as i32)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_adjust(&self, product_id: &str, delta: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE inventory
            SET stock = stock + ?, last_updated = ?
            WHERE product_id = ? AND stock + ? >= 0
            "#,
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(product_id)
        .bind(delta)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_status(&self, product_id: &str, status: ProductStatus) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE inventory SET status = ?, last_updated = ? WHERE product_id = ?
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
}
