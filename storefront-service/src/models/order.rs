use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::money::Money;
use crate::domain::order::{Order, OrderLine};
use crate::models::enums::OrderStatus;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub items: Vec<CheckoutItem>,
    pub shipping_address: ShippingAddress,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub session_id: String,
    pub checkout_url: Option<String>,
    pub total: Money,
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub customer_email: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderLookupQuery {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
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
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            customer_email: order.customer_email,
            subtotal: order.subtotal,
            total: order.total,
            status: order.status,
            items: order.items,
            shipping_address: order.shipping_address,
            payment_session_id: order.payment_session_id,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
