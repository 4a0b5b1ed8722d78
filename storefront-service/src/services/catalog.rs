use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::money::{Currency, Money};
use crate::error::StoreError;
use crate::models::enums::ProductStatus;
use crate::models::inventory::InventoryRecord;
use crate::models::product::{CreateProductRequest, Product, ProductDetail, ProductQuery, UpdateProductRequest};
use crate::repository::{InventoryRepository, ProductFilter, ProductRepository};

const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;
const DEFAULT_REORDER_POINT: i32 = 10;

/// 商品生命周期管理，商品与库存记录成对创建、成对软删
pub struct CatalogService {
    product_repo: Arc<dyn ProductRepository>,
    inventory_repo: Arc<dyn InventoryRepository>,
}

impl CatalogService {
    pub fn new(
        product_repo: Arc<dyn ProductRepository>,
        inventory_repo: Arc<dyn InventoryRepository>,
    ) -> Self {
        Self {
            product_repo,
            inventory_repo,
        }
    }

    pub async fn create(&self, request: CreateProductRequest) -> Result<Product, StoreError> {
        if request.name.trim().is_empty()
            || request.category.trim().is_empty()
            || request.brand.trim().is_empty()
        {
            return Err(StoreError::Validation(
                "name, category and brand are required".to_string(),
            ));
        }
        if request.price < 0 {
            return Err(StoreError::Validation(
                "price must be non-negative".to_string(),
            ));
        }

        let currency = match request.currency.as_deref() {
            None => Currency::USD,
            Some(code) => Currency::from_code(code)
                .ok_or_else(|| StoreError::Validation(format!("unsupported currency: {}", code)))?,
        };

        let product_id = request
            .product_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if self.product_repo.find_by_id(&product_id).await?.is_some() {
            return Err(StoreError::Validation(format!(
                "product already exists: {}",
                product_id
            )));
        }

        let now = Utc::now();
        let product = Product {
            product_id: product_id.clone(),
            name: request.name.trim().to_string(),
            price: Money::new(request.price, currency),
            category: request.category.trim().to_string(),
            brand: request.brand.trim().to_string(),
            specifications: request.specifications.unwrap_or_else(|| serde_json::json!({})),
            images: request.images.unwrap_or_default(),
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.product_repo.insert(&product).await?;

        let inventory = InventoryRecord::new(
            product_id.clone(),
            request.initial_stock.unwrap_or(0).min(i32::MAX as u32) as i32,
            request.low_stock_threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
            request.reorder_point.unwrap_or(DEFAULT_REORDER_POINT),
        );

        // 两次写没有共享事务，第二次失败时用补偿删除回滚第一次
        if let Err(err) = self.inventory_repo.insert(&inventory).await {
            warn!(
                "inventory write failed for {}, rolling back product: {}",
                product_id, err
            );
            if let Err(rollback_err) = self.product_repo.delete(&product_id).await {
                error!(
                    "compensating delete failed for {}: {}",
                    product_id, rollback_err
                );
            }
            return Err(err);
        }

        info!("product {} created ({})", product.product_id, product.name);
        Ok(product)
    }

    pub async fn update(
        &self,
        product_id: &str,
        patch: UpdateProductRequest,
    ) -> Result<Product, StoreError> {
        let mut product = self
            .product_repo
            .find_by_id(product_id)
            .await?
            .filter(Product::is_active)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.to_string()))?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(StoreError::Validation("name must not be empty".to_string()));
            }
            product.name = name.trim().to_string();
        }
        if let Some(price) = patch.price {
            if price < 0 {
                return Err(StoreError::Validation(
                    "price must be non-negative".to_string(),
                ));
            }
            product.price = Money::new(price, product.price.currency);
        }
        if let Some(category) = patch.category {
            product.category = category.trim().to_string();
        }
        if let Some(brand) = patch.brand {
            product.brand = brand.trim().to_string();
        }
        if let Some(specifications) = patch.specifications {
            product.specifications = specifications;
        }
        if let Some(images) = patch.images {
            product.images = images;
        }
        product.updated_at = Utc::now();

        self.product_repo.update(&product).await?;
        Ok(product)
    }

    /// 软删除：商品和库存都打 DELETED 标记，历史订单不受影响
    pub async fn soft_delete(&self, product_id: &str) -> Result<(), StoreError> {
        let found = self
            .product_repo
            .set_status(product_id, ProductStatus::Deleted)
            .await?;
        if !found {
            return Err(StoreError::ProductNotFound(product_id.to_string()));
        }

        if !self
            .inventory_repo
            .set_status(product_id, ProductStatus::Deleted)
            .await?
        {
            // 库存记录缺失本身就是异常，但不阻塞删除
            warn!("no inventory record to soft-delete for {}", product_id);
        }

        info!("product {} soft-deleted", product_id);
        Ok(())
    }

    pub async fn get(&self, product_id: &str) -> Result<ProductDetail, StoreError> {
        let product = self
            .product_repo
            .find_by_id(product_id)
            .await?
            .filter(Product::is_active)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.to_string()))?;

        let available = match self.inventory_repo.find_by_product(product_id).await? {
            Some(record) => record.available(),
            None => 0,
        };

        Ok(ProductDetail {
            product,
            available,
            in_stock: available > 0,
        })
    }

    pub async fn list(&self, query: ProductQuery) -> Result<Vec<Product>, StoreError> {
        let status = match query.status.as_deref() {
            None => Some(ProductStatus::Active),
            Some(raw) => Some(raw.parse().map_err(|_| {
                StoreError::Validation(format!("unknown product status: {}", raw))
            })?),
        };

        let filter = ProductFilter {
            category: query.category.clone().filter(|c| !c.trim().is_empty()),
            status,
            limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
            offset: query.offset.unwrap_or(0),
        };

        self.product_repo.list(&filter).await
    }
}
