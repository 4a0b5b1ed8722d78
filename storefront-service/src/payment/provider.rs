use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::order::Order;
use crate::error::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Confirmed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub order_id: String,
    pub outcome: PaymentOutcome,
}

/// 支付网关接口。创建结账会话走 HTTP，支付结果经由 webhook 异步送达。
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StoreError>;

    /// 解析并校验 webhook 载荷
    fn parse_callback(&self, payload: &serde_json::Value) -> Result<PaymentNotification, StoreError>;
}
