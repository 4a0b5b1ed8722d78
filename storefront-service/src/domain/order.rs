use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{OrderEvent, apply_event};
use crate::domain::money::{Currency, Money};
use crate::error::StoreError;
use crate::models::enums::OrderStatus;
use crate::models::order::ShippingAddress;

/// 行项目携带下单时的价格快照，之后改价不影响已有订单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Option<i64>,
    pub order_id: String,
    pub customer_email: String,
    pub items: Vec<OrderLine>,
    pub subtotal: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // 未落库的事件
    #[serde(skip)]
    pub(crate) events: Vec<OrderEvent>,
}

impl Order {
    pub fn new(
        customer_email: String,
        items: Vec<OrderLine>,
        currency: Currency,
        shipping_address: Option<ShippingAddress>,
    ) -> Self {
        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();

        let mut subtotal = Money::zero(currency);
        for line in &items {
            // 货币一致性在进入聚合前校验过
            if let Ok(sum) = subtotal.add(&line.line_total()) {
                subtotal = sum;
            }
        }

        let mut order = Self {
            id: None,
            order_id,
            customer_email,
            items,
            subtotal,
            total: subtotal,
            status: OrderStatus::Pending,
            shipping_address,
            payment_session_id: None,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
        };

        let _ = order.apply_event(OrderEvent::OrderCreated {
            order_id: order.order_id.clone(),
            created_at: now,
        });

        order
    }

    pub fn apply_event(&mut self, event: OrderEvent) -> Result<(), StoreError> {
        // 事件必须属于当前订单
        if event.order_id() != self.order_id {
            return Err(StoreError::InvariantViolation(format!(
                "event for order {} applied to order {}",
                event.order_id(),
                self.order_id
            )));
        }

        match apply_event(self.status, &event) {
            Ok(new_status) => {
                self.status = new_status;
                self.updated_at = event.event_time();

                if let OrderEvent::PaymentConfirmed { session_id: Some(session_id), .. } = &event {
                    self.payment_session_id = Some(session_id.clone());
                }

                self.events.push(event);
                Ok(())
            }
            Err(_) => Err(StoreError::InvalidStateTransition {
                from: self.status,
                event: format!("{:?}", event),
            }),
        }
    }

    pub fn mark_reserved(&mut self) -> Result<(), StoreError> {
        self.apply_event(OrderEvent::InventoryReserved {
            order_id: self.order_id.clone(),
            reserved_at: Utc::now(),
        })
    }

    pub fn confirm_payment(&mut self, session_id: Option<String>) -> Result<(), StoreError> {
        self.apply_event(OrderEvent::PaymentConfirmed {
            order_id: self.order_id.clone(),
            session_id,
            confirmed_at: Utc::now(),
        })
    }

    pub fn complete(&mut self) -> Result<(), StoreError> {
        self.apply_event(OrderEvent::OrderCompleted {
            order_id: self.order_id.clone(),
            completed_at: Utc::now(),
        })
    }

    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), StoreError> {
        self.apply_event(OrderEvent::OrderCancelled {
            order_id: self.order_id.clone(),
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })
    }

    pub fn events(&self) -> &[OrderEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.events)
    }
}
