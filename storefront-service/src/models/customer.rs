use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 反规范化的客户聚合，total_* 按最终一致维护
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    pub name: Option<String>,
    pub total_orders: i32,
    pub total_spent: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
