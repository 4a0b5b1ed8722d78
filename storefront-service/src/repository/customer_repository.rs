use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::error::StoreError;
use crate::models::customer::Customer;

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// 支付确认后的机会式聚合更新，首单时插入客户记录
    async fn record_paid_order(
        &self,
        email: &str,
        name: Option<&str>,
        amount: i64,
    ) -> Result<(), StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError>;
}

pub struct MySqlCustomerRepository {
    pool: MySqlPool,
}

impl MySqlCustomerRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    email: String,
    name: Option<String>,
    total_orders: i32,
    total_spent: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            email: row.email,
            name: row.name,
            total_orders: row.total_orders,
            total_spent: row.total_spent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CustomerRepository for MySqlCustomerRepository {
    async fn record_paid_order(
        &self,
        email: &str,
        name: Option<&str>,
        amount: i64,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO customers (email, name, total_orders, total_spent, created_at, updated_at)
            VALUES (?, ?, 1, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                total_orders = total_orders + 1,
                total_spent = total_spent + VALUES(total_spent),
                updated_at = VALUES(updated_at)
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(amount)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT email, name, total_orders, total_spent, created_at, updated_at
            FROM customers WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(row.map(Customer::from))
    }
}
