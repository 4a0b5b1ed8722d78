use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use storefront_service::config::settings::PaymentSettings;
use storefront_service::domain::order::Order;
use storefront_service::error::StoreError;
use storefront_service::models::customer::Customer;
use storefront_service::models::enums::{OrderStatus, ProductStatus};
use storefront_service::models::inventory::InventoryRecord;
use storefront_service::models::order::{CheckoutItem, CheckoutRequest, ShippingAddress};
use storefront_service::models::product::{CreateProductRequest, Product};
use storefront_service::payment::{CheckoutSession, PaymentNotification, PaymentOutcome, PaymentProvider};
use storefront_service::repository::{
    CustomerRepository, InventoryRepository, OrderFilter, OrderRepository, ProductFilter,
    ProductRepository,
};
use storefront_service::services::{CatalogService, InventoryLedger, OrderService};

// ---------- 内存仓储，条件更新在一把锁里判断并生效，与存储端 CAS 同语义 ----------

#[derive(Default)]
struct InMemoryInventoryRepo {
    records: Mutex<HashMap<String, InventoryRecord>>,
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepo {
    async fn insert(&self, record: &InventoryRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.product_id.clone(), record.clone());
        Ok(())
    }

    async fn find_by_product(&self, product_id: &str) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(product_id).cloned())
    }

    async fn try_reserve(&self, product_id: &str, quantity: u32) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(product_id) {
            Some(record)
                if record.status == ProductStatus::Active
                    && record.available() >= quantity as i64 =>
            {
                record.reserved += quantity as i32;
                record.last_updated = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, product_id: &str, quantity: u32) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(product_id) {
            record.reserved -= record.reserved.min(quantity as i32);
            record.last_updated = Utc::now();
        }
        Ok(())
    }

    async fn try_commit(&self, product_id: &str, quantity: u32) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(product_id) {
            Some(record)
                if record.reserved >= quantity as i32 && record.stock >= quantity as i32 =>
            {
                record.stock -= quantity as i32;
                record.reserved -= quantity as i32;
                record.last_updated = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn try_adjust(&self, product_id: &str, delta: i64) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(product_id) {
            Some(record) if record.stock as i64 + delta >= 0 => {
                record.stock = (record.stock as i64 + delta) as i32;
                record.last_updated = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_status(&self, product_id: &str, status: ProductStatus) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(product_id) {
            Some(record) => {
                record.status = status;
                record.last_updated = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
struct InMemoryProductRepo {
    products: Mutex<HashMap<String, Product>>,
}

#[async_trait]
impl ProductRepository for InMemoryProductRepo {
    async fn insert(&self, product: &Product) -> Result<(), StoreError> {
        self.products
            .lock()
            .unwrap()
            .insert(product.product_id.clone(), product.clone());
        Ok(())
    }

    async fn find_by_id(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.products.lock().unwrap().get(product_id).cloned())
    }

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let products = self.products.lock().unwrap();
        let mut matched: Vec<Product> = products
            .values()
            .filter(|p| {
                filter
                    .category
                    .as_ref()
                    .map(|c| &p.category == c)
                    .unwrap_or(true)
                    && filter.status.map(|s| p.status == s).unwrap_or(true)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn update(&self, product: &Product) -> Result<(), StoreError> {
        self.products
            .lock()
            .unwrap()
            .insert(product.product_id.clone(), product.clone());
        Ok(())
    }

    async fn set_status(&self, product_id: &str, status: ProductStatus) -> Result<bool, StoreError> {
        let mut products = self.products.lock().unwrap();
        match products.get_mut(product_id) {
            Some(product) => {
                product.status = status;
                product.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, product_id: &str) -> Result<(), StoreError> {
        self.products.lock().unwrap().remove(product_id);
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryOrderRepo {
    orders: Mutex<HashMap<String, Order>>,
    next_id: AtomicUsize,
}

impl InMemoryOrderRepo {
    /// 把订单的 updated_at 往回拨，用于过期扫描测试
    fn backdate(&self, order_id: &str, by: Duration) {
        let mut orders = self.orders.lock().unwrap();
        if let Some(order) = orders.get_mut(order_id) {
            order.updated_at -= by;
        }
    }

    fn count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepo {
    async fn save(&self, order: &mut Order) -> Result<(), StoreError> {
        if order.id.is_none() {
            order.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1);
        }
        order.clear_events();
        self.orders
            .lock()
            .unwrap()
            .insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.lock().unwrap().get(order_id).cloned())
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.lock().unwrap();
        let mut matched: Vec<Order> = orders
            .values()
            .filter(|o| {
                filter
                    .customer_email
                    .as_ref()
                    .map(|e| &o.customer_email == e)
                    .unwrap_or(true)
                    && filter.status.map(|s| o.status == s).unwrap_or(true)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn find_stale_reserved(
        &self,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.lock().unwrap();
        Ok(orders
            .values()
            .filter(|o| o.status == OrderStatus::Reserved && o.updated_at < cutoff)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct InMemoryCustomerRepo {
    customers: Mutex<HashMap<String, Customer>>,
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepo {
    async fn record_paid_order(
        &self,
        email: &str,
        name: Option<&str>,
        amount: i64,
    ) -> Result<(), StoreError> {
        let mut customers = self.customers.lock().unwrap();
        let now = Utc::now();
        customers
            .entry(email.to_string())
            .and_modify(|c| {
                c.total_orders += 1;
                c.total_spent += amount;
                c.updated_at = now;
            })
            .or_insert_with(|| Customer {
                email: email.to_string(),
                name: name.map(str::to_string),
                total_orders: 1,
                total_spent: amount,
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.lock().unwrap().get(email).cloned())
    }
}

/// 假支付网关：默认发会话成功，可切换为失败
#[derive(Default)]
struct FakePaymentProvider {
    fail_sessions: AtomicBool,
    sessions_created: AtomicUsize,
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    async fn create_checkout_session(
        &self,
        order: &Order,
        _success_url: &str,
        _cancel_url: &str,
    ) -> Result<CheckoutSession, StoreError> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(StoreError::PaymentProvider {
                code: "503".to_string(),
                message: "gateway unavailable".to_string(),
            });
        }
        self.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(CheckoutSession {
            session_id: format!("sess_{}", order.order_id),
            checkout_url: Some(format!("https://pay.example.com/{}", order.order_id)),
        })
    }

    fn parse_callback(&self, payload: &serde_json::Value) -> Result<PaymentNotification, StoreError> {
        let order_id = payload
            .get("order_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StoreError::Validation("callback is missing order_id".to_string()))?
            .to_string();
        let outcome = match payload.get("event").and_then(|v| v.as_str()) {
            Some("payment.confirmed") => PaymentOutcome::Confirmed,
            Some("payment.failed") => PaymentOutcome::Failed,
            other => {
                return Err(StoreError::Validation(format!(
                    "unsupported callback event: {:?}",
                    other
                )));
            }
        };
        Ok(PaymentNotification { order_id, outcome })
    }
}

// ---------- 测试装配 ----------

struct TestStore {
    products: Arc<InMemoryProductRepo>,
    inventory: Arc<InMemoryInventoryRepo>,
    order_repo: Arc<InMemoryOrderRepo>,
    customers: Arc<InMemoryCustomerRepo>,
    provider: Arc<FakePaymentProvider>,
    ledger: Arc<InventoryLedger>,
    catalog: Arc<CatalogService>,
    orders: Arc<OrderService>,
}

fn payment_settings() -> PaymentSettings {
    PaymentSettings {
        gateway_url: "https://gateway.test".to_string(),
        api_key: "test_key".to_string(),
        webhook_secret: String::new(),
        success_url: "https://shop.test/success".to_string(),
        cancel_url: "https://shop.test/cancel".to_string(),
        timeout_seconds: 5,
    }
}

fn build_store() -> TestStore {
    let products = Arc::new(InMemoryProductRepo::default());
    let inventory = Arc::new(InMemoryInventoryRepo::default());
    let order_repo = Arc::new(InMemoryOrderRepo::default());
    let customers = Arc::new(InMemoryCustomerRepo::default());
    let provider = Arc::new(FakePaymentProvider::default());

    let ledger = Arc::new(InventoryLedger::new(inventory.clone()));
    let catalog = Arc::new(CatalogService::new(products.clone(), inventory.clone()));
    let orders = Arc::new(OrderService::new(
        order_repo.clone(),
        products.clone(),
        customers.clone(),
        ledger.clone(),
        provider.clone(),
        payment_settings(),
    ));

    TestStore {
        products,
        inventory,
        order_repo,
        customers,
        provider,
        ledger,
        catalog,
        orders,
    }
}

async fn seed_product(store: &TestStore, product_id: &str, price: i64, stock: u32) -> Product {
    store
        .catalog
        .create(CreateProductRequest {
            product_id: Some(product_id.to_string()),
            name: format!("Product {}", product_id),
            price,
            currency: Some("USD".to_string()),
            category: "gadgets".to_string(),
            brand: "Acme".to_string(),
            specifications: None,
            images: None,
            initial_stock: Some(stock),
            low_stock_threshold: None,
            reorder_point: None,
        })
        .await
        .expect("seed product")
}

fn sample_address() -> ShippingAddress {
    ShippingAddress {
        name: Some("A Buyer".to_string()),
        line1: "1 Market St".to_string(),
        line2: None,
        city: "Springfield".to_string(),
        state: None,
        postal_code: Some("94000".to_string()),
        country: "US".to_string(),
    }
}

fn checkout_request(items: Vec<(&str, u32)>) -> CheckoutRequest {
    CheckoutRequest {
        customer_email: "buyer@example.com".to_string(),
        customer_name: None,
        items: items
            .into_iter()
            .map(|(product_id, quantity)| CheckoutItem {
                product_id: product_id.to_string(),
                quantity,
            })
            .collect(),
        shipping_address: sample_address(),
        success_url: None,
        cancel_url: None,
    }
}

async fn inventory_of(store: &TestStore, product_id: &str) -> InventoryRecord {
    store
        .inventory
        .find_by_product(product_id)
        .await
        .unwrap()
        .expect("inventory record")
}

// ---------- 台账基本场景 ----------

#[tokio::test]
async fn test_reserve_then_commit_scenario() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 12).await;

    // stock=12, reserve(5) -> reserved=5, available=7
    store.ledger.reserve("prod-1", 5).await.unwrap();
    let record = inventory_of(&store, "prod-1").await;
    assert_eq!(record.stock, 12);
    assert_eq!(record.reserved, 5);
    assert_eq!(record.available(), 7);

    // commit(5) -> stock=7, reserved=0, available 不变
    store.ledger.commit("prod-1", 5).await.unwrap();
    let record = inventory_of(&store, "prod-1").await;
    assert_eq!(record.stock, 7);
    assert_eq!(record.reserved, 0);
    assert_eq!(record.available(), 7);
}

#[tokio::test]
async fn test_reserve_more_than_available_fails_without_change() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 3).await;

    let result = store.ledger.reserve("prod-1", 5).await;
    match result {
        Err(StoreError::InsufficientStock {
            product_id,
            requested,
            available,
        }) => {
            assert_eq!(product_id, "prod-1");
            assert_eq!(requested, 5);
            assert_eq!(available, 3);
        }
        other => panic!("Expected InsufficientStock, got: {:?}", other),
    }

    let record = inventory_of(&store, "prod-1").await;
    assert_eq!(record.stock, 3);
    assert_eq!(record.reserved, 0);
}

#[tokio::test]
async fn test_release_is_clamped_at_zero() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 10).await;

    store.ledger.reserve("prod-1", 4).await.unwrap();
    store.ledger.release("prod-1", 4).await.unwrap();
    // 重复释放不会把 reserved 变成负数
    store.ledger.release("prod-1", 4).await.unwrap();

    let record = inventory_of(&store, "prod-1").await;
    assert_eq!(record.reserved, 0);
    assert_eq!(record.stock, 10);
}

#[tokio::test]
async fn test_adjust_restock_and_floor() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 2).await;

    let record = store.ledger.adjust("prod-1", 10).await.unwrap();
    assert_eq!(record.stock, 12);

    let result = store.ledger.adjust("prod-1", -20).await;
    assert!(matches!(result, Err(StoreError::Validation(_))));
    assert_eq!(inventory_of(&store, "prod-1").await.stock, 12);
}

// ---------- 结账流程 ----------

#[tokio::test]
async fn test_checkout_reserves_and_snapshots_prices() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 12).await;
    seed_product(&store, "prod-2", 999, 5).await;

    let response = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 2), ("prod-2", 1)]))
        .await
        .unwrap();

    assert_eq!(response.status, OrderStatus::Reserved);
    assert_eq!(response.total.amount, 2 * 4999 + 999);
    assert!(response.session_id.starts_with("sess_"));

    assert_eq!(inventory_of(&store, "prod-1").await.reserved, 2);
    assert_eq!(inventory_of(&store, "prod-2").await.reserved, 1);

    // 改价不影响已创建订单的快照
    store
        .catalog
        .update(
            "prod-1",
            storefront_service::models::product::UpdateProductRequest {
                price: Some(9999),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let order = store
        .orders
        .find_order(&response.order_id, Some("buyer@example.com"))
        .await
        .unwrap();
    let line = order
        .items
        .iter()
        .find(|l| l.product_id == "prod-1")
        .unwrap();
    assert_eq!(line.unit_price.amount, 4999);
}

#[tokio::test]
async fn test_partial_reservation_rolls_back_everything() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 5).await;
    seed_product(&store, "prod-2", 999, 1).await;

    let result = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 2), ("prod-2", 3)]))
        .await;

    match result {
        Err(StoreError::InsufficientStock { product_id, .. }) => {
            assert_eq!(product_id, "prod-2");
        }
        other => panic!("Expected InsufficientStock, got: {:?}", other),
    }

    // 第一行的预留被补偿释放，订单没有创建
    assert_eq!(inventory_of(&store, "prod-1").await.reserved, 0);
    assert_eq!(inventory_of(&store, "prod-2").await.reserved, 0);
    assert_eq!(store.order_repo.count(), 0);
}

#[tokio::test]
async fn test_checkout_rejects_unknown_and_deleted_products() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 5).await;
    store.catalog.soft_delete("prod-1").await.unwrap();

    let result = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 1)]))
        .await;
    assert!(matches!(result, Err(StoreError::ProductNotFound(_))));

    let result = store
        .orders
        .checkout(checkout_request(vec![("ghost", 1)]))
        .await;
    assert!(matches!(result, Err(StoreError::ProductNotFound(_))));
}

#[tokio::test]
async fn test_session_failure_releases_reservations_and_cancels() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 5).await;
    store.provider.fail_sessions.store(true, Ordering::SeqCst);

    let result = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 2)]))
        .await;
    assert!(matches!(result, Err(StoreError::PaymentProvider { .. })));

    assert_eq!(inventory_of(&store, "prod-1").await.reserved, 0);

    // 留下的订单是取消态，不占库存
    let cancelled = store
        .orders
        .list_orders(None, Some(OrderStatus::Cancelled), None, None)
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
}

// ---------- 支付回调 ----------

#[tokio::test]
async fn test_confirm_payment_commits_and_updates_aggregates() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 12).await;

    let response = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 5)]))
        .await
        .unwrap();

    let status = store.orders.confirm_payment(&response.order_id).await.unwrap();
    assert_eq!(status, OrderStatus::Paid);

    let record = inventory_of(&store, "prod-1").await;
    assert_eq!(record.stock, 7);
    assert_eq!(record.reserved, 0);

    let customer = store
        .customers
        .find_by_email("buyer@example.com")
        .await
        .unwrap()
        .expect("customer aggregate");
    assert_eq!(customer.total_orders, 1);
    assert_eq!(customer.total_spent, 5 * 4999);
}

#[tokio::test]
async fn test_confirm_payment_is_idempotent() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 12).await;

    let response = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 5)]))
        .await
        .unwrap();

    store.orders.confirm_payment(&response.order_id).await.unwrap();
    // 重复投递同一笔支付确认
    let status = store.orders.confirm_payment(&response.order_id).await.unwrap();
    assert_eq!(status, OrderStatus::Paid);

    // 库存只扣了一次
    let record = inventory_of(&store, "prod-1").await;
    assert_eq!(record.stock, 7);
    assert_eq!(record.reserved, 0);

    let customer = store
        .customers
        .find_by_email("buyer@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.total_orders, 1);
}

#[tokio::test]
async fn test_failed_payment_releases_and_cancels() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 12).await;

    let response = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 5)]))
        .await
        .unwrap();

    let status = store.orders.fail_payment(&response.order_id).await.unwrap();
    assert_eq!(status, OrderStatus::Cancelled);

    let record = inventory_of(&store, "prod-1").await;
    assert_eq!(record.stock, 12);
    assert_eq!(record.reserved, 0);

    // 对已取消订单重复投递失败回调是幂等的
    let status = store.orders.fail_payment(&response.order_id).await.unwrap();
    assert_eq!(status, OrderStatus::Cancelled);

    // 取消后到来的支付确认被拒绝
    let result = store.orders.confirm_payment(&response.order_id).await;
    assert!(matches!(result, Err(StoreError::InvalidOrderStatus { .. })));
}

// ---------- 过期回收 ----------

#[tokio::test]
async fn test_stale_reservation_expires() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 12).await;

    let response = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 5)]))
        .await
        .unwrap();
    assert_eq!(inventory_of(&store, "prod-1").await.reserved, 5);

    // 刚下的单不会被回收
    let expired = store
        .orders
        .expire_stale_reservations(Duration::minutes(30))
        .await
        .unwrap();
    assert_eq!(expired, 0);

    // 回拨时间后被回收
    store.order_repo.backdate(&response.order_id, Duration::hours(1));
    let expired = store
        .orders
        .expire_stale_reservations(Duration::minutes(30))
        .await
        .unwrap();
    assert_eq!(expired, 1);

    let record = inventory_of(&store, "prod-1").await;
    assert_eq!(record.reserved, 0);
    assert_eq!(record.stock, 12);

    let order = store
        .orders
        .find_order(&response.order_id, Some("buyer@example.com"))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_complete_after_payment() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 12).await;

    let response = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 1)]))
        .await
        .unwrap();

    // 未支付先履约会被拒
    let result = store.orders.complete(&response.order_id).await;
    assert!(matches!(result, Err(StoreError::InvalidStateTransition { .. })));

    store.orders.confirm_payment(&response.order_id).await.unwrap();

    let status = store.orders.complete(&response.order_id).await.unwrap();
    assert_eq!(status, OrderStatus::Completed);

    // 重复履约幂等
    let status = store.orders.complete(&response.order_id).await.unwrap();
    assert_eq!(status, OrderStatus::Completed);

    // 完成的订单接受重复支付确认（去重）但不会被取消
    let status = store.orders.confirm_payment(&response.order_id).await.unwrap();
    assert_eq!(status, OrderStatus::Completed);
    let result = store.orders.fail_payment(&response.order_id).await;
    assert!(matches!(result, Err(StoreError::InvalidOrderStatus { .. })));
}

// ---------- 订单查询与软删除 ----------

#[tokio::test]
async fn test_order_lookup_enforces_email() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 12).await;

    let response = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 1)]))
        .await
        .unwrap();

    let result = store
        .orders
        .find_order(&response.order_id, Some("intruder@example.com"))
        .await;
    assert!(matches!(result, Err(StoreError::Forbidden(_))));

    let result = store.orders.find_order(&response.order_id, None).await;
    assert!(matches!(result, Err(StoreError::Validation(_))));

    // 大小写不敏感
    let order = store
        .orders
        .find_order(&response.order_id, Some("BUYER@example.com"))
        .await
        .unwrap();
    assert_eq!(order.customer_email, "buyer@example.com");
}

#[tokio::test]
async fn test_soft_delete_keeps_existing_orders_readable() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 12).await;

    let response = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 2)]))
        .await
        .unwrap();
    store.orders.confirm_payment(&response.order_id).await.unwrap();

    store.catalog.soft_delete("prod-1").await.unwrap();

    // 商品从目录消失
    assert!(matches!(
        store.catalog.get("prod-1").await,
        Err(StoreError::ProductNotFound(_))
    ));
    // 行没有被删除，只是打了标记
    let raw = store.products.find_by_id("prod-1").await.unwrap().unwrap();
    assert_eq!(raw.status, ProductStatus::Deleted);

    // 历史订单原样可读
    let order = store
        .orders
        .find_order(&response.order_id, Some("buyer@example.com"))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.items[0].product_id, "prod-1");
    assert_eq!(order.items[0].unit_price.amount, 4999);

    // 但不能再卖
    let result = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 1)]))
        .await;
    assert!(matches!(result, Err(StoreError::ProductNotFound(_))));
}

#[tokio::test]
async fn test_list_orders_filters_by_customer_and_status() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 12).await;

    let first = store
        .orders
        .checkout(checkout_request(vec![("prod-1", 1)]))
        .await
        .unwrap();
    store.orders.confirm_payment(&first.order_id).await.unwrap();
    store
        .orders
        .checkout(checkout_request(vec![("prod-1", 2)]))
        .await
        .unwrap();

    let paid = store
        .orders
        .list_orders(
            Some("buyer@example.com".to_string()),
            Some(OrderStatus::Paid),
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].order_id, first.order_id);

    let all = store
        .orders
        .list_orders(Some("buyer@example.com".to_string()), None, None, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let other = store
        .orders
        .list_orders(Some("nobody@example.com".to_string()), None, None, None)
        .await
        .unwrap();
    assert!(other.is_empty());
}

// ---------- 并发不超卖 ----------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_never_oversell() {
    let store = build_store();
    seed_product(&store, "prod-1", 4999, 10).await;

    let mut handles = Vec::new();
    for _ in 0..25 {
        let ledger = store.ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.reserve("prod-1", 1).await.is_ok()
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap() {
            succeeded += 1;
        }
    }

    // 刚好卖光，一件不多
    assert_eq!(succeeded, 10);
    let record = inventory_of(&store, "prod-1").await;
    assert_eq!(record.reserved, 10);
    assert_eq!(record.available(), 0);

    // 全部提交后库存归零，提交总量不超过原始库存
    for _ in 0..10 {
        store.ledger.commit("prod-1", 1).await.unwrap();
    }
    let record = inventory_of(&store, "prod-1").await;
    assert_eq!(record.stock, 0);
    assert_eq!(record.reserved, 0);

    let result = store.ledger.reserve("prod-1", 1).await;
    assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));
}

// ---------- HTTP 层 ----------

mod http_api {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::routing::{get, post};
    use axum::{Extension, Router};
    use serde_json::{Value, json};
    use storefront_service::handlers;
    use tower::ServiceExt;
    use tower_http::cors::CorsLayer;

    fn build_router(store: &TestStore) -> Router {
        let provider: Arc<dyn PaymentProvider> = store.provider.clone();
        Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/api/v1/products",
                get(handlers::list_products).post(handlers::create_product),
            )
            .route(
                "/api/v1/products/:product_id",
                get(handlers::get_product)
                    .put(handlers::update_product)
                    .delete(handlers::delete_product),
            )
            .route("/api/v1/inventory/:product_id", get(handlers::get_inventory))
            .route(
                "/api/v1/inventory/:product_id/adjust",
                post(handlers::adjust_inventory),
            )
            .route("/api/v1/checkout", post(handlers::checkout))
            .route("/api/v1/orders", get(handlers::list_orders))
            .route("/api/v1/orders/:order_id", get(handlers::get_order))
            .route(
                "/api/v1/orders/:order_id/complete",
                post(handlers::complete_order),
            )
            .route("/api/v1/payment/callback", post(handlers::payment_callback))
            .layer(Extension(store.catalog.clone()))
            .layer(Extension(store.orders.clone()))
            .layer(Extension(store.ledger.clone()))
            .layer(Extension(provider))
            .layer(CorsLayer::permissive())
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_cors_headers() {
        let store = build_store();
        let app = build_router(&store);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://shop.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        // 每个响应都带 CORS 头
        assert!(
            response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }

    #[tokio::test]
    async fn test_product_lifecycle_over_http() {
        let store = build_store();
        let app = build_router(&store);

        // 创建
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/products",
                json!({
                    "product_id": "prod-http",
                    "name": "Webcam",
                    "price": 12900,
                    "currency": "USD",
                    "category": "peripherals",
                    "brand": "Acme",
                    "initial_stock": 4
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["product_id"], "prod-http");

        // 详情带可售数量
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/products/prod-http")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["available"], 4);
        assert_eq!(body["data"]["in_stock"], true);

        // 软删除
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/products/prod-http")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // 删除后详情 404，信封为 success=false
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/products/prod-http")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["type"], "ProductNotFound");
    }

    #[tokio::test]
    async fn test_checkout_and_webhook_over_http() {
        let store = build_store();
        seed_product(&store, "prod-1", 4999, 12).await;
        let app = build_router(&store);

        let checkout_body = json!({
            "customer_email": "buyer@example.com",
            "items": [{ "product_id": "prod-1", "quantity": 5 }],
            "shipping_address": {
                "line1": "1 Market St",
                "city": "Springfield",
                "country": "US"
            }
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/checkout", checkout_body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        let order_id = body["data"]["order_id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["status"], "RESERVED");

        // 支付确认 webhook
        let callback = json!({ "event": "payment.confirmed", "order_id": order_id });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/payment/callback", callback.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "PAID");

        // 重复投递幂等，不会二次扣减
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/payment/callback", callback))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let record = inventory_of(&store, "prod-1").await;
        assert_eq!(record.stock, 7);
        assert_eq!(record.reserved, 0);

        // 邮箱不匹配的订单查询被拒
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/api/v1/orders/{}?email=intruder%40example.com",
                        order_id
                    ))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["type"], "Forbidden");

        // 正确邮箱可以查询
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/api/v1/orders/{}?email=buyer%40example.com",
                        order_id
                    ))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "PAID");
    }

    #[tokio::test]
    async fn test_insufficient_stock_maps_to_conflict() {
        let store = build_store();
        seed_product(&store, "prod-1", 4999, 3).await;
        let app = build_router(&store);

        let checkout_body = json!({
            "customer_email": "buyer@example.com",
            "items": [{ "product_id": "prod-1", "quantity": 5 }],
            "shipping_address": {
                "line1": "1 Market St",
                "city": "Springfield",
                "country": "US"
            }
        });

        let response = app
            .oneshot(json_request("POST", "/api/v1/checkout", checkout_body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["type"], "InsufficientStock");
    }

    #[tokio::test]
    async fn test_empty_cart_is_bad_request() {
        let store = build_store();
        let app = build_router(&store);

        let checkout_body = json!({
            "customer_email": "buyer@example.com",
            "items": [],
            "shipping_address": {
                "line1": "1 Market St",
                "city": "Springfield",
                "country": "US"
            }
        });

        let response = app
            .oneshot(json_request("POST", "/api/v1/checkout", checkout_body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "ValidationError");
    }

    #[tokio::test]
    async fn test_inventory_admin_over_http() {
        let store = build_store();
        seed_product(&store, "prod-1", 4999, 2).await;
        let app = build_router(&store);

        // 补货
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/inventory/prod-1/adjust",
                json!({ "delta": 10, "reason": "restock" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["stock"], 12);

        // 库存视图
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/inventory/prod-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["available"], 12);
        assert_eq!(body["data"]["low_stock"], false);
    }
}
