use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let mut connect_options = PgConnectOptions::from_str(&config.url)?;

    // 设置慢查询日志阈值为 5秒
    connect_options = connect_options.log_slow_statements(
        tracing::log::LevelFilter::Warn,
        Duration::from_secs(5),
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
}

/// 建表 (已存在则跳过)
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contracts (
            id UUID PRIMARY KEY,
            supplier_name TEXT NOT NULL,
            items JSONB NOT NULL DEFAULT '[]',
            effective_date DATE,
            expiration_date DATE,
            payment_terms TEXT,
            max_amount NUMERIC,
            source VARCHAR(16) NOT NULL DEFAULT 'manual',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id UUID PRIMARY KEY,
            contract_id UUID REFERENCES contracts(id) ON DELETE SET NULL,
            invoice_number TEXT NOT NULL,
            supplier_name TEXT NOT NULL,
            issue_date DATE NOT NULL,
            due_date DATE,
            items JSONB NOT NULL DEFAULT '[]',
            subtotal NUMERIC NOT NULL DEFAULT 0,
            tax NUMERIC NOT NULL DEFAULT 0,
            total NUMERIC NOT NULL DEFAULT 0,
            raw_text TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_invoices_contract_id ON invoices (contract_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database schema ready");
    Ok(())
}
