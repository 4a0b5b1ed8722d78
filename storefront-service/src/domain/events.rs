use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::enums::OrderStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrderEvent {
    OrderCreated {
        order_id: String,
        created_at: DateTime<Utc>,
    },
    InventoryReserved {
        order_id: String,
        reserved_at: DateTime<Utc>,
    },
    PaymentConfirmed {
        order_id: String,
        session_id: Option<String>,
        confirmed_at: DateTime<Utc>,
    },
    OrderCompleted {
        order_id: String,
        completed_at: DateTime<Utc>,
    },
    OrderCancelled {
        order_id: String,
        reason: String,
        cancelled_at: DateTime<Utc>,
    },
}

impl OrderEvent {
    pub fn order_id(&self) -> &str {
        match self {
            Self::OrderCreated { order_id, .. } => order_id,
            Self::InventoryReserved { order_id, .. } => order_id,
            Self::PaymentConfirmed { order_id, .. } => order_id,
            Self::OrderCompleted { order_id, .. } => order_id,
            Self::OrderCancelled { order_id, .. } => order_id,
        }
    }

    pub fn event_time(&self) -> DateTime<Utc> {
        match self {
            Self::OrderCreated { created_at, .. } => *created_at,
            Self::InventoryReserved { reserved_at, .. } => *reserved_at,
            Self::PaymentConfirmed { confirmed_at, .. } => *confirmed_at,
            Self::OrderCompleted { completed_at, .. } => *completed_at,
            Self::OrderCancelled { cancelled_at, .. } => *cancelled_at,
        }
    }
}

// 订单状态机，只允许前进，支付前可取消
pub fn apply_event(current_status: OrderStatus, event: &OrderEvent) -> Result<OrderStatus, &'static str> {
    match (current_status, event) {
        (OrderStatus::Pending, OrderEvent::OrderCreated { .. }) => Ok(OrderStatus::Pending),
        (OrderStatus::Pending, OrderEvent::InventoryReserved { .. }) => Ok(OrderStatus::Reserved),
        (OrderStatus::Reserved, OrderEvent::PaymentConfirmed { .. }) => Ok(OrderStatus::Paid),
        (OrderStatus::Paid, OrderEvent::OrderCompleted { .. }) => Ok(OrderStatus::Completed),
        (OrderStatus::Pending, OrderEvent::OrderCancelled { .. }) => Ok(OrderStatus::Cancelled),
        (OrderStatus::Reserved, OrderEvent::OrderCancelled { .. }) => Ok(OrderStatus::Cancelled),
        _ => Err("Invalid state transition"),
    }
}
