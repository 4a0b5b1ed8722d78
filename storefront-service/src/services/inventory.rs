use std::sync::Arc;

use tracing::{error, warn};

use crate::error::StoreError;
use crate::models::enums::ProductStatus;
use crate::models::inventory::InventoryRecord;
use crate::repository::InventoryRepository;

/// 库存台账。预留/释放/扣减都委托给存储端的条件更新，
/// 本层负责把条件失败翻译成业务错误，并处理多行预留的回滚。
pub struct InventoryLedger {
    inventory_repo: Arc<dyn InventoryRepository>,
}

impl InventoryLedger {
    pub fn new(inventory_repo: Arc<dyn InventoryRepository>) -> Self {
        Self { inventory_repo }
    }

    /// 预留 quantity 件库存，可售量不足时整单失败
    pub async fn reserve(&self, product_id: &str, quantity: u32) -> Result<(), StoreError> {
        if quantity == 0 {
            return Err(StoreError::Validation(
                "reserve quantity must be at least 1".to_string(),
            ));
        }

        if self.inventory_repo.try_reserve(product_id, quantity).await? {
            return Ok(());
        }

        // 条件没满足，再读一次只是为了给出可读的错误信息
        match self.inventory_repo.find_by_product(product_id).await? {
            None => Err(StoreError::ProductNotFound(product_id.to_string())),
            Some(record) if record.status == ProductStatus::Deleted => {
                Err(StoreError::ProductNotFound(product_id.to_string()))
            }
            Some(record) => Err(StoreError::InsufficientStock {
                product_id: product_id.to_string(),
                requested: quantity,
                available: record.available(),
            }),
        }
    }

    /// 释放预留，多次调用安全，reserved 到 0 封顶
    pub async fn release(&self, product_id: &str, quantity: u32) -> Result<(), StoreError> {
        if quantity == 0 {
            return Ok(());
        }
        self.inventory_repo.release(product_id, quantity).await
    }

    /// 支付确认后把预留转成永久扣减
    pub async fn commit(&self, product_id: &str, quantity: u32) -> Result<(), StoreError> {
        if quantity == 0 {
            return Err(StoreError::Validation(
                "commit quantity must be at least 1".to_string(),
            ));
        }

        if self.inventory_repo.try_commit(product_id, quantity).await? {
            return Ok(());
        }

        // 预留量对不上说明上游有缺陷，不是用户错误
        Err(StoreError::InvariantViolation(format!(
            "commit of {} units for {} exceeds reservation",
            quantity, product_id
        )))
    }

    /// 管理端补货/纠错
    pub async fn adjust(&self, product_id: &str, delta: i64) -> Result<InventoryRecord, StoreError> {
        if delta == 0 {
            return Err(StoreError::Validation("delta must be non-zero".to_string()));
        }

        if self.inventory_repo.try_adjust(product_id, delta).await? {
            return self.view(product_id).await;
        }

        match self.inventory_repo.find_by_product(product_id).await? {
            None => Err(StoreError::ProductNotFound(product_id.to_string())),
            Some(record) => Err(StoreError::Validation(format!(
                "adjustment of {} would drive stock below zero (current {})",
                delta, record.stock
            ))),
        }
    }

    pub async fn view(&self, product_id: &str) -> Result<InventoryRecord, StoreError> {
        self.inventory_repo
            .find_by_product(product_id)
            .await?
            .ok_or_else(|| StoreError::ProductNotFound(product_id.to_string()))
    }

    /// 多行预留：要么全部成功，要么释放本次已预留的行后整体失败
    pub async fn reserve_lines(&self, lines: &[(String, u32)]) -> Result<(), StoreError> {
        for (index, (product_id, quantity)) in lines.iter().enumerate() {
            if let Err(err) = self.reserve(product_id, *quantity).await {
                warn!(
                    "reservation failed at {} ({} of {} lines reserved), rolling back",
                    product_id,
                    index,
                    lines.len()
                );
                self.release_lines(&lines[..index]).await;
                return Err(err);
            }
        }
        Ok(())
    }

    /// 尽力释放，单行失败只记日志，过期扫描最终会兜底
    pub async fn release_lines(&self, lines: &[(String, u32)]) {
        for (product_id, quantity) in lines {
            if let Err(err) = self.release(product_id, *quantity).await {
                error!("failed to release {} units of {}: {}", quantity, product_id, err);
            }
        }
    }
}
