use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde_json::json;
use thiserror::Error;

use crate::models::enums::OrderStatus;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("product not found: {0}")]
    ProductNotFound(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: i64,
    },

    #[error("invalid order status: current {current}, expected {expected:?}")]
    InvalidOrderStatus {
        current: String,
        expected: Vec<String>,
    },

    #[error("invalid state transition: cannot apply {event} from {from:?}")]
    InvalidStateTransition { from: OrderStatus, event: String },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("payment provider error: {code} - {message}")]
    PaymentProvider { code: String, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let (status, error_type, error_message) = match &self {
            // 内部错误只返回笼统信息，细节进日志
            StoreError::Database(e) => {
                tracing::error!("database failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DatabaseError",
                    "internal storage error".to_string(),
                )
            }
            StoreError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "ValidationError",
                msg.clone(),
            ),
            StoreError::ProductNotFound(id) => (
                StatusCode::NOT_FOUND,
                "ProductNotFound",
                format!("product not found: {}", id),
            ),
            StoreError::OrderNotFound(id) => (
                StatusCode::NOT_FOUND,
                "OrderNotFound",
                format!("order not found: {}", id),
            ),
            StoreError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                msg.clone(),
            ),
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => (
                StatusCode::CONFLICT,
                "InsufficientStock",
                format!(
                    "insufficient stock for {}: requested {}, available {}",
                    product_id, requested, available
                ),
            ),
            StoreError::InvalidOrderStatus { current, expected } => (
                StatusCode::CONFLICT,
                "InvalidOrderStatus",
                format!("invalid order status: current {}, expected {:?}", current, expected),
            ),
            StoreError::InvalidStateTransition { from, event } => (
                StatusCode::CONFLICT,
                "InvalidStateTransition",
                format!("cannot apply {} from {:?}", event, from),
            ),
            // 不变量被破坏说明出了程序缺陷，按500处理并留痕
            StoreError::InvariantViolation(msg) => {
                tracing::error!("invariant violation: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InvariantViolation",
                    "internal consistency error".to_string(),
                )
            }
            StoreError::PaymentProvider { code, message } => (
                StatusCode::BAD_GATEWAY,
                "PaymentProviderError",
                format!("payment provider error {}: {}", code, message),
            ),
            StoreError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ConfigurationError",
                msg.clone(),
            ),
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "type": error_type,
                "message": error_message
            }
        }));

        (status, body).into_response()
    }
}
