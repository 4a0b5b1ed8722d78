use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use std::str::FromStr;

use crate::domain::money::{Currency, Money};
use crate::domain::order::{Order, OrderLine};
use crate::error::StoreError;
use crate::models::enums::OrderStatus;

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub customer_email: Option<String>,
    pub status: Option<OrderStatus>,
    pub limit: u32,
    pub offset: u32,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save(&self, order: &mut Order) -> Result<(), StoreError>;
    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, StoreError>;
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;
    /// 过期扫描: 状态仍为 RESERVED 且 updated_at 早于截止时间的订单
    async fn find_stale_reserved(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;
}

pub struct MySqlOrderRepository {
    pool: MySqlPool,
}

impl MySqlOrderRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_id: String,
    customer_email: String,
    items: serde_json::Value,
    subtotal: i64,
    total: i64,
    currency: String,
    status: String,
    shipping_address: Option<serde_json::Value>,
    payment_session_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const ORDER_COLUMNS: &str = "id, order_id, customer_email, items, subtotal, total, currency, \
     status, shipping_address, payment_session_id, created_at, updated_at";

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let items: Vec<OrderLine> = serde_json::from_value(row.items).map_err(|e| {
            StoreError::InvariantViolation(format!("order {} has malformed items: {}", row.order_id, e))
        })?;

        let currency = Currency::from_code(&row.currency).unwrap_or(Currency::USD);
        let status = OrderStatus::from_str(&row.status).map_err(|_| {
            StoreError::InvariantViolation(format!(
                "order {} has unknown status {}",
                row.order_id, row.status
            ))
        })?;

        Ok(Order {
            id: Some(row.id),
            order_id: row.order_id,
            customer_email: row.customer_email,
            items,
            subtotal: Money::new(row.subtotal, currency),
            total: Money::new(row.total, currency),
            status,
            shipping_address: row
                .shipping_address
                .and_then(|v| serde_json::from_value(v).ok()),
            payment_session_id: row.payment_session_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            events: Vec::new(),
        })
    }
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn save(&self, order: &mut Order) -> Result<(), StoreError> {
        // 新订单插入，已有订单只更新可变列，行项目落库后不再改动
        if order.id.is_none() {
            let result = sqlx::query(
                r#"
                INSERT INTO orders
                (order_id, customer_email, items, subtotal, total, currency, status,
                 shipping_address, payment_session_id, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&order.order_id)
            .bind(&order.customer_email)
            .bind(serde_json::to_string(&order.items).unwrap_or_else(|_| "[]".to_string()))
            .bind(order.subtotal.amount)
            .bind(order.total.amount)
            .bind(order.total.currency.code())
            .bind(order.status.to_string())
            .bind(
                order
                    .shipping_address
                    .as_ref()
                    .map(|a| serde_json::to_string(a).unwrap_or_else(|_| "{}".to_string())),
            )
            .bind(&order.payment_session_id)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;

            order.id = Some(result.last_insert_id() as i64);
        } else {
            sqlx::query(
                r#"
                UPDATE orders
                SET status = ?, payment_session_id = ?, updated_at = ?
                WHERE order_id = ?
                "#,
            )
            .bind(order.status.to_string())
            .bind(&order.payment_session_id)
            .bind(order.updated_at)
            .bind(&order.order_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        }

        order.clear_events();
        Ok(())
    }

    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        row.map(Order::try_from).transpose()
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE customer_email = COALESCE(?, customer_email)
              AND status = COALESCE(?, status)
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(filter.customer_email.as_deref())
        .bind(filter.status.map(|s| s.to_string()))
        .bind(filter.limit as i64)
        .bind(filter.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn find_stale_reserved(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE status = 'RESERVED' AND updated_at < ?
            ORDER BY updated_at ASC
            LIMIT 100
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        rows.into_iter().map(Order::try_from).collect()
    }
}
