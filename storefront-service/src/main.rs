use axum::{
    Extension, Router,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_service::config::settings::AppSettings;
use storefront_service::db;
use storefront_service::handlers;
use storefront_service::payment::{HttpCheckoutProvider, PaymentProvider};
use storefront_service::repository::{
    CustomerRepository, InventoryRepository, MySqlCustomerRepository, MySqlInventoryRepository,
    MySqlOrderRepository, MySqlProductRepository, OrderRepository, ProductRepository,
};
use storefront_service::services::{CatalogService, InventoryLedger, OrderService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 设置日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let settings = AppSettings::from_env();

    // 初始化数据库连接池并建表
    let pool = db::create_pool(&settings.database_url).await?;
    db::init_db(&pool).await?;

    // 仓储层，服务全部走显式注入
    let product_repo: Arc<dyn ProductRepository> =
        Arc::new(MySqlProductRepository::new(pool.clone()));
    let inventory_repo: Arc<dyn InventoryRepository> =
        Arc::new(MySqlInventoryRepository::new(pool.clone()));
    let order_repo: Arc<dyn OrderRepository> = Arc::new(MySqlOrderRepository::new(pool.clone()));
    let customer_repo: Arc<dyn CustomerRepository> =
        Arc::new(MySqlCustomerRepository::new(pool.clone()));

    // 服务层
    let ledger = Arc::new(InventoryLedger::new(inventory_repo.clone()));
    let provider: Arc<dyn PaymentProvider> =
        Arc::new(HttpCheckoutProvider::new(settings.payment.clone())?);
    let catalog = Arc::new(CatalogService::new(
        product_repo.clone(),
        inventory_repo.clone(),
    ));
    let orders = Arc::new(OrderService::new(
        order_repo,
        product_repo,
        customer_repo,
        ledger.clone(),
        provider.clone(),
        settings.payment.clone(),
    ));

    // 过期预留回收的后台任务
    let sweeper = orders.clone();
    let sweep_interval =
        std::time::Duration::from_secs(settings.reservation.sweep_interval_seconds.max(1));
    let ttl = chrono::Duration::seconds(settings.reservation.ttl_seconds as i64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            match sweeper.expire_stale_reservations(ttl).await {
                Ok(0) => {}
                Ok(count) => tracing::info!("released {} expired reservation(s)", count),
                Err(e) => tracing::error!("reservation sweep failed: {}", e),
            }
        }
    });

    // 构建路由
    let app = Router::new()
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
        .layer(Extension(catalog))
        .layer(Extension(orders))
        .layer(Extension(ledger))
        .layer(Extension(provider))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(&settings.cors_allow_origin));

    // 处理未定义Paths
    let app = app.fallback(handler_404);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server_port));
    tracing::info!("Storefront service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn build_cors(allow_origin: &str) -> CorsLayer {
    if allow_origin == "*" {
        return CorsLayer::permissive();
    }

    match allow_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            tracing::warn!("invalid CORS_ALLOW_ORIGIN {:?}, falling back to permissive", allow_origin);
            CorsLayer::permissive()
        }
    }
}

async fn handler_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        axum::Json(json!({
            "success": false,
            "error": { "type": "NotFound", "message": "no such route" }
        })),
    )
}
