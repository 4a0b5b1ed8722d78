use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::enums::ProductStatus;

/// 库存账目，product_id 与商品一一对应
/// 不变量: 0 <= reserved <= stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: String,
    pub stock: i32,
    pub reserved: i32,
    pub low_stock_threshold: i32,
    pub reorder_point: i32,
    pub status: ProductStatus,
    pub last_updated: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn new(product_id: String, stock: i32, low_stock_threshold: i32, reorder_point: i32) -> Self {
        Self {
            product_id,
            stock,
            reserved: 0,
            low_stock_threshold,
            reorder_point,
            status: ProductStatus::Active,
            last_updated: Utc::now(),
        }
    }

    /// 当前可售数量 = 实际库存 - 在途预留
    pub fn available(&self) -> i64 {
        self.stock as i64 - self.reserved as i64
    }

    pub fn is_low_stock(&self) -> bool {
        self.available() <= self.low_stock_threshold as i64
    }
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InventoryView {
    pub product_id: String,
    pub stock: i32,
    pub reserved: i32,
    pub available: i64,
    pub low_stock_threshold: i32,
    pub reorder_point: i32,
    pub low_stock: bool,
    pub status: ProductStatus,
    pub last_updated: DateTime<Utc>,
}

impl From<InventoryRecord> for InventoryView {
    fn from(record: InventoryRecord) -> Self {
        let available = record.available();
        let low_stock = record.is_low_stock();
        Self {
            product_id: record.product_id,
            stock: record.stock,
            reserved: record.reserved,
            available,
            low_stock_threshold: record.low_stock_threshold,
            reorder_point: record.reorder_point,
            low_stock,
            status: record.status,
            last_updated: record.last_updated,
        }
    }
}
