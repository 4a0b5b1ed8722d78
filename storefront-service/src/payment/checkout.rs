use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info};

use crate::config::settings::PaymentSettings;
use crate::domain::order::Order;
use crate::error::StoreError;
use crate::payment::provider::{CheckoutSession, PaymentNotification, PaymentOutcome, PaymentProvider};

/// 托管结账页网关客户端
pub struct HttpCheckoutProvider {
    client: reqwest::Client,
    settings: PaymentSettings,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session_id: String,
    checkout_url: Option<String>,
}

impl HttpCheckoutProvider {
    pub fn new(settings: PaymentSettings) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| StoreError::Configuration(format!("http client build failed: {}", e)))?;

        Ok(Self { client, settings })
    }
}

#[async_trait]
impl PaymentProvider for HttpCheckoutProvider {
    async fn create_checkout_session(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StoreError> {
        let url = format!(
            "{}/v1/checkout/sessions",
            self.settings.gateway_url.trim_end_matches('/')
        );

        let line_items: Vec<serde_json::Value> = order
            .items
            .iter()
            .map(|line| {
                json!({
                    "product_id": line.product_id,
                    "name": line.product_name,
                    "quantity": line.quantity,
                    "unit_amount": line.unit_price.amount,
                })
            })
            .collect();

        let body = json!({
            "amount": order.total.amount,
            "currency": order.total.currency.code(),
            "line_items": line_items,
            "success_url": success_url,
            "cancel_url": cancel_url,
            "metadata": { "order_id": order.order_id },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("checkout session request failed: {}", e);
                StoreError::PaymentProvider {
                    code: "network".to_string(),
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!("gateway rejected checkout session: {} {}", status, detail);
            return Err(StoreError::PaymentProvider {
                code: status.as_u16().to_string(),
                message: detail,
            });
        }

        let session: SessionResponse = response.json().await.map_err(|e| {
            StoreError::PaymentProvider {
                code: "decode".to_string(),
                message: e.to_string(),
            }
        })?;

        info!(
            "checkout session {} created for order {}",
            session.session_id, order.order_id
        );

        Ok(CheckoutSession {
            session_id: session.session_id,
            checkout_url: session.checkout_url,
        })
    }

    fn parse_callback(&self, payload: &serde_json::Value) -> Result<PaymentNotification, StoreError> {
        // 共享密钥校验，配置为空时跳过（本地联调）
        if !self.settings.webhook_secret.is_empty() {
            let secret = payload.get("secret").and_then(|v| v.as_str()).unwrap_or("");
            if secret != self.settings.webhook_secret {
                return Err(StoreError::Forbidden(
                    "webhook secret mismatch".to_string(),
                ));
            }
        }

        let order_id = payload
            .get("order_id")
            .and_then(|v| v.as_str())
            .or_else(|| {
                payload
                    .get("metadata")
                    .and_then(|m| m.get("order_id"))
                    .and_then(|v| v.as_str())
            })
            .ok_or_else(|| StoreError::Validation("callback is missing order_id".to_string()))?
            .to_string();

        let event = payload
            .get("event")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StoreError::Validation("callback is missing event".to_string()))?;

        let outcome = match event {
            "payment.confirmed" => PaymentOutcome::Confirmed,
            "payment.failed" => PaymentOutcome::Failed,
            other => {
                return Err(StoreError::Validation(format!(
                    "unsupported callback event: {}",
                    other
                )));
            }
        };

        Ok(PaymentNotification { order_id, outcome })
    }
}
