use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::money::Money;
use crate::models::enums::ProductStatus;

/// 商品记录，Admin Product Lifecycle 独占写入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub price: Money,
    pub category: String,
    pub brand: String,
    pub specifications: serde_json::Value,
    pub images: Vec<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub product_id: Option<String>,
    pub name: String,
    /// 最小货币单位计价
    pub price: i64,
    pub currency: Option<String>,
    pub category: String,
    pub brand: String,
    pub specifications: Option<serde_json::Value>,
    pub images: Option<Vec<String>>,
    pub initial_stock: Option<u32>,
    pub low_stock_threshold: Option<i32>,
    pub reorder_point: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub specifications: Option<serde_json::Value>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// 商品详情响应，附带当前可售数量
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub available: i64,
    pub in_stock: bool,
}
