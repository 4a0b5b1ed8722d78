use axum::{
    Extension,
    extract::{Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::inventory::{AdjustStockRequest, InventoryView};
use crate::models::order::{CheckoutRequest, OrderLookupQuery, OrderQuery, OrderResponse};
use crate::models::product::{CreateProductRequest, ProductQuery, UpdateProductRequest};
use crate::payment::PaymentProvider;
use crate::payment::provider::PaymentOutcome;
use crate::services::{CatalogService, InventoryLedger, OrderService};

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

// ---- 商品目录 ----

pub async fn list_products(
    Extension(catalog): Extension<Arc<CatalogService>>,
    Query(query): Query<ProductQuery>,
) -> Response {
    match catalog.list(query).await {
        Ok(products) => {
            (StatusCode::OK, Json(json!({ "success": true, "data": products }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn get_product(
    Extension(catalog): Extension<Arc<CatalogService>>,
    Path(product_id): Path<String>,
) -> Response {
    match catalog.get(&product_id).await {
        Ok(detail) => {
            (StatusCode::OK, Json(json!({ "success": true, "data": detail }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn create_product(
    Extension(catalog): Extension<Arc<CatalogService>>,
    Json(request): Json<CreateProductRequest>,
) -> Response {
    match catalog.create(request).await {
        Ok(product) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "data": product })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn update_product(
    Extension(catalog): Extension<Arc<CatalogService>>,
    Path(product_id): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> Response {
    match catalog.update(&product_id, request).await {
        Ok(product) => {
            (StatusCode::OK, Json(json!({ "success": true, "data": product }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn delete_product(
    Extension(catalog): Extension<Arc<CatalogService>>,
    Path(product_id): Path<String>,
) -> Response {
    match catalog.soft_delete(&product_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": { "product_id": product_id, "status": "DELETED" } })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

// ---- 库存管理 ----

pub async fn get_inventory(
    Extension(ledger): Extension<Arc<InventoryLedger>>,
    Path(product_id): Path<String>,
) -> Response {
    match ledger.view(&product_id).await {
        Ok(record) => {
            let view = InventoryView::from(record);
            (StatusCode::OK, Json(json!({ "success": true, "data": view }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn adjust_inventory(
    Extension(ledger): Extension<Arc<InventoryLedger>>,
    Path(product_id): Path<String>,
    Json(request): Json<AdjustStockRequest>,
) -> Response {
    if let Some(reason) = &request.reason {
        tracing::info!("stock adjustment for {} ({}): {}", product_id, request.delta, reason);
    }

    match ledger.adjust(&product_id, request.delta).await {
        Ok(record) => {
            let view = InventoryView::from(record);
            (StatusCode::OK, Json(json!({ "success": true, "data": view }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

// ---- 结账与订单 ----

pub async fn checkout(
    Extension(orders): Extension<Arc<OrderService>>,
    Json(request): Json<CheckoutRequest>,
) -> Response {
    match orders.checkout(request).await {
        Ok(response) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "data": response })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_order(
    Extension(orders): Extension<Arc<OrderService>>,
    Path(order_id): Path<String>,
    Query(query): Query<OrderLookupQuery>,
) -> Response {
    match orders.find_order(&order_id, query.email.as_deref()).await {
        Ok(order) => {
            let response = OrderResponse::from(order);
            (StatusCode::OK, Json(json!({ "success": true, "data": response }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn list_orders(
    Extension(orders): Extension<Arc<OrderService>>,
    Query(query): Query<OrderQuery>,
) -> Response {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => match raw.parse() {
            Ok(status) => Some(status),
            Err(_) => {
                return StoreError::Validation(format!("unknown order status: {}", raw))
                    .into_response();
            }
        },
    };

    match orders
        .list_orders(query.customer_email, status, query.limit, query.offset)
        .await
    {
        Ok(list) => {
            let list: Vec<OrderResponse> = list.into_iter().map(OrderResponse::from).collect();
            (StatusCode::OK, Json(json!({ "success": true, "data": list }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn complete_order(
    Extension(orders): Extension<Arc<OrderService>>,
    Path(order_id): Path<String>,
) -> Response {
    match orders.complete(&order_id).await {
        Ok(status) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "order_id": order_id, "status": status }
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

// ---- 支付回调 ----

pub async fn payment_callback(
    Extension(orders): Extension<Arc<OrderService>>,
    Extension(provider): Extension<Arc<dyn PaymentProvider>>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    let notification = match provider.parse_callback(&payload) {
        Ok(notification) => notification,
        Err(e) => return e.into_response(),
    };

    let result = match notification.outcome {
        PaymentOutcome::Confirmed => orders.confirm_payment(&notification.order_id).await,
        PaymentOutcome::Failed => orders.fail_payment(&notification.order_id).await,
    };

    match result {
        Ok(status) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "order_id": notification.order_id, "status": status }
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
