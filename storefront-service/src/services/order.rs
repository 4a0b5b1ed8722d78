use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::config::settings::PaymentSettings;
use crate::domain::money::Currency;
use crate::domain::order::{Order, OrderLine};
use crate::error::StoreError;
use crate::models::enums::OrderStatus;
use crate::models::order::{CheckoutRequest, CheckoutResponse};
use crate::payment::PaymentProvider;
use crate::repository::{CustomerRepository, OrderFilter, OrderRepository, ProductRepository};
use crate::services::inventory::InventoryLedger;

const MAX_LINE_QUANTITY: u32 = 1000;
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_PAGE_SIZE: u32 = 20;

pub struct OrderService {
    order_repo: Arc<dyn OrderRepository>,
    product_repo: Arc<dyn ProductRepository>,
    customer_repo: Arc<dyn CustomerRepository>,
    ledger: Arc<InventoryLedger>,
    provider: Arc<dyn PaymentProvider>,
    payment: PaymentSettings,
}

impl OrderService {
    pub fn new(
        order_repo: Arc<dyn OrderRepository>,
        product_repo: Arc<dyn ProductRepository>,
        customer_repo: Arc<dyn CustomerRepository>,
        ledger: Arc<InventoryLedger>,
        provider: Arc<dyn PaymentProvider>,
        payment: PaymentSettings,
    ) -> Self {
        Self {
            order_repo,
            product_repo,
            customer_repo,
            ledger,
            provider,
            payment,
        }
    }

    /// 下单：校验 -> 快照价格 -> 预留库存 -> 落单 -> 创建支付会话。
    /// 任何一行预留失败都会回滚之前的预留，订单不会被创建。
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutResponse, StoreError> {
        validate_checkout(&request)?;

        // 1. 加载商品并固化价格快照
        let mut lines = Vec::with_capacity(request.items.len());
        let mut currency: Option<Currency> = None;

        for item in &request.items {
            let product = self
                .product_repo
                .find_by_id(&item.product_id)
                .await?
                .filter(|p| p.is_active())
                .ok_or_else(|| StoreError::ProductNotFound(item.product_id.clone()))?;

            match currency {
                None => currency = Some(product.price.currency),
                Some(c) if c != product.price.currency => {
                    return Err(StoreError::Validation(
                        "cart mixes currencies".to_string(),
                    ));
                }
                _ => {}
            }

            lines.push(OrderLine {
                product_id: product.product_id.clone(),
                product_name: product.name.clone(),
                quantity: item.quantity,
                unit_price: product.price,
            });
        }

        let currency = currency
            .ok_or_else(|| StoreError::Validation("cart must not be empty".to_string()))?;

        // 2. 预留库存，全部成功或全部回滚
        let reservations: Vec<(String, u32)> = lines
            .iter()
            .map(|l| (l.product_id.clone(), l.quantity))
            .collect();
        self.ledger.reserve_lines(&reservations).await?;

        // 3. 落单
        let mut order = Order::new(
            request.customer_email.clone(),
            lines,
            currency,
            Some(request.shipping_address.clone()),
        );
        if let Err(err) = order.mark_reserved() {
            self.ledger.release_lines(&reservations).await;
            return Err(err);
        }
        if let Err(err) = self.order_repo.save(&mut order).await {
            self.ledger.release_lines(&reservations).await;
            return Err(err);
        }

        info!(
            "order {} reserved for {} ({} lines, total {})",
            order.order_id,
            order.customer_email,
            order.items.len(),
            order.total
        );

        // 4. 创建支付会话，失败则释放预留并取消订单
        let success_url = request
            .success_url
            .as_deref()
            .unwrap_or(&self.payment.success_url);
        let cancel_url = request
            .cancel_url
            .as_deref()
            .unwrap_or(&self.payment.cancel_url);

        let session = match self
            .provider
            .create_checkout_session(&order, success_url, cancel_url)
            .await
        {
            Ok(session) => session,
            Err(err) => {
                warn!(
                    "checkout session creation failed for order {}, rolling back: {}",
                    order.order_id, err
                );
                self.ledger.release_lines(&reservations).await;
                if order.cancel("payment session creation failed").is_ok() {
                    if let Err(save_err) = self.order_repo.save(&mut order).await {
                        error!(
                            "failed to persist cancellation of {}: {}",
                            order.order_id, save_err
                        );
                    }
                }
                return Err(err);
            }
        };

        order.payment_session_id = Some(session.session_id.clone());
        self.order_repo.save(&mut order).await?;

        Ok(CheckoutResponse {
            order_id: order.order_id,
            session_id: session.session_id,
            checkout_url: session.checkout_url,
            total: order.total,
            status: order.status,
        })
    }

    /// 支付确认回调。按订单状态去重：已是 PAID/COMPLETED 时直接返回，
    /// 重复投递不会二次扣减库存。
    pub async fn confirm_payment(&self, order_id: &str) -> Result<OrderStatus, StoreError> {
        let mut order = self
            .order_repo
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.to_string()))?;

        match order.status {
            OrderStatus::Paid | OrderStatus::Completed => {
                info!("duplicate payment confirmation for {}, ignoring", order_id);
                return Ok(order.status);
            }
            OrderStatus::Reserved => {}
            other => {
                error!(
                    "payment confirmation for order {} in status {}",
                    order_id, other
                );
                return Err(StoreError::InvalidOrderStatus {
                    current: other.to_string(),
                    expected: vec![OrderStatus::Reserved.to_string()],
                });
            }
        }

        // 把每一行的预留转成永久扣减
        for line in &order.items {
            self.ledger.commit(&line.product_id, line.quantity).await?;
        }

        order.confirm_payment(None)?;
        self.order_repo.save(&mut order).await?;

        info!("order {} paid, total {}", order.order_id, order.total);

        // 客户聚合是机会式更新，失败不影响支付结果
        if let Err(err) = self
            .customer_repo
            .record_paid_order(&order.customer_email, None, order.total.amount)
            .await
        {
            warn!(
                "customer aggregate update failed for {}: {}",
                order.customer_email, err
            );
        }

        Ok(order.status)
    }

    /// 支付失败回调：释放预留并取消订单，对已取消订单幂等
    pub async fn fail_payment(&self, order_id: &str) -> Result<OrderStatus, StoreError> {
        let mut order = self
            .order_repo
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.to_string()))?;

        match order.status {
            OrderStatus::Cancelled => return Ok(order.status),
            OrderStatus::Reserved => {}
            other => {
                return Err(StoreError::InvalidOrderStatus {
                    current: other.to_string(),
                    expected: vec![OrderStatus::Reserved.to_string()],
                });
            }
        }

        let reservations: Vec<(String, u32)> = order
            .items
            .iter()
            .map(|l| (l.product_id.clone(), l.quantity))
            .collect();
        self.ledger.release_lines(&reservations).await;

        order.cancel("payment failed")?;
        self.order_repo.save(&mut order).await?;

        info!("order {} cancelled after failed payment", order.order_id);
        Ok(order.status)
    }

    /// 过期预留回收。支付迟迟未确认的订单释放库存并取消，
    /// 避免废弃结账把库存永久锁死。
    pub async fn expire_stale_reservations(&self, ttl: Duration) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - ttl;
        let stale = self.order_repo.find_stale_reserved(cutoff).await?;
        let mut expired = 0;

        for mut order in stale {
            let reservations: Vec<(String, u32)> = order
                .items
                .iter()
                .map(|l| (l.product_id.clone(), l.quantity))
                .collect();
            self.ledger.release_lines(&reservations).await;

            if let Err(err) = order.cancel("reservation expired") {
                error!("cannot cancel stale order {}: {}", order.order_id, err);
                continue;
            }
            if let Err(err) = self.order_repo.save(&mut order).await {
                error!("failed to persist expiry of {}: {}", order.order_id, err);
                continue;
            }

            info!("reservation expired for order {}", order.order_id);
            expired += 1;
        }

        Ok(expired)
    }

    /// 订单查询，邮箱不匹配按越权处理
    pub async fn find_order(&self, order_id: &str, email: Option<&str>) -> Result<Order, StoreError> {
        let email = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| StoreError::Validation("email query parameter is required".to_string()))?;

        let order = self
            .order_repo
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.to_string()))?;

        if !order.customer_email.eq_ignore_ascii_case(email) {
            return Err(StoreError::Forbidden(
                "email does not match order".to_string(),
            ));
        }

        Ok(order)
    }

    pub async fn list_orders(
        &self,
        customer_email: Option<String>,
        status: Option<OrderStatus>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Order>, StoreError> {
        let filter = OrderFilter {
            customer_email,
            status,
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0),
        };
        self.order_repo.list(&filter).await
    }

    /// 履约完成钩子，重复调用幂等
    pub async fn complete(&self, order_id: &str) -> Result<OrderStatus, StoreError> {
        let mut order = self
            .order_repo
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.to_string()))?;

        if order.status == OrderStatus::Completed {
            return Ok(order.status);
        }

        order.complete()?;
        self.order_repo.save(&mut order).await?;
        Ok(order.status)
    }
}

fn validate_checkout(request: &CheckoutRequest) -> Result<(), StoreError> {
    if request.items.is_empty() {
        return Err(StoreError::Validation("cart must not be empty".to_string()));
    }

    for item in &request.items {
        if item.quantity == 0 {
            return Err(StoreError::Validation(format!(
                "quantity for {} must be at least 1",
                item.product_id
            )));
        }
        if item.quantity > MAX_LINE_QUANTITY {
            return Err(StoreError::Validation(format!(
                "quantity for {} exceeds the per-line limit of {}",
                item.product_id, MAX_LINE_QUANTITY
            )));
        }
    }

    if !is_valid_email(&request.customer_email) {
        return Err(StoreError::Validation(format!(
            "invalid email address: {}",
            request.customer_email
        )));
    }

    let address = &request.shipping_address;
    if address.line1.trim().is_empty()
        || address.city.trim().is_empty()
        || address.country.trim().is_empty()
    {
        return Err(StoreError::Validation(
            "shipping address requires line1, city and country".to_string(),
        ));
    }

    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}
