use sqlx::{MySqlPool, mysql::MySqlPoolOptions};

pub async fn create_pool(database_url: &str) -> anyhow::Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

// 初始化数据库表
pub async fn init_db(pool: &MySqlPool) -> anyhow::Result<()> {
    // 商品表
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            product_id VARCHAR(64) NOT NULL UNIQUE,
            name VARCHAR(255) NOT NULL,
            price BIGINT NOT NULL,
            currency VARCHAR(10) NOT NULL DEFAULT 'USD',
            category VARCHAR(100) NOT NULL,
            brand VARCHAR(100) NOT NULL,
            specifications JSON,
            images JSON,
            status VARCHAR(20) NOT NULL DEFAULT 'ACTIVE',
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            INDEX idx_category (category),
            INDEX idx_status (status)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 库存表，stock/reserved 上的条件更新是一致性的根基
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inventory (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            product_id VARCHAR(64) NOT NULL UNIQUE,
            stock INT NOT NULL DEFAULT 0,
            reserved INT NOT NULL DEFAULT 0,
            low_stock_threshold INT NOT NULL DEFAULT 5,
            reorder_point INT NOT NULL DEFAULT 10,
            status VARCHAR(20) NOT NULL DEFAULT 'ACTIVE',
            last_updated TIMESTAMP NOT NULL,
            INDEX idx_status (status)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 订单表，行项目以价格快照形式整体存入 JSON 列
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            order_id VARCHAR(64) NOT NULL UNIQUE,
            customer_email VARCHAR(255) NOT NULL,
            items JSON NOT NULL,
            subtotal BIGINT NOT NULL,
            total BIGINT NOT NULL,
            currency VARCHAR(10) NOT NULL DEFAULT 'USD',
            status VARCHAR(20) NOT NULL,
            shipping_address JSON,
            payment_session_id VARCHAR(128),
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            INDEX idx_customer (customer_email),
            INDEX idx_status (status),
            INDEX idx_updated_at (updated_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 客户聚合表，统计字段按最终一致维护
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            email VARCHAR(255) NOT NULL UNIQUE,
            name VARCHAR(255),
            total_orders INT NOT NULL DEFAULT 0,
            total_spent BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
