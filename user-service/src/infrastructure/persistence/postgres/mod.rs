//! PostgreSQL 仓储实现

pub mod instance_repository;
pub mod migrator;
pub mod user_client_repository;
pub mod user_repository;

pub use instance_repository::PostgresInstanceRepository;
pub use migrator::{MIGRATIONS_TABLE, Migration, Migrator, SEEDS_TABLE};
pub use user_client_repository::PostgresUserClientRepository;
pub use user_repository::PostgresUserRepository;

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;
use user_service_core::config::PostgresInstanceConfig;

use crate::domain::repository::RepositoryError;

const DEFAULT_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_MIN_CONNECTIONS: u32 = 2;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// 创建 PostgreSQL 连接池并测试连接
pub async fn create_db_pool(config: &PostgresInstanceConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
        .min_connections(config.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS))
        .acquire_timeout(Duration::from_secs(
            config
                .acquire_timeout_secs
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        ))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.url)
        .await
        .context("failed to connect to PostgreSQL")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("PostgreSQL connection test failed")?;

    info!("Database connection pool created");
    Ok(pool)
}

/// 唯一约束冲突映射为 `Conflict`，其余错误附加上下文后映射为 `Storage`
pub(crate) fn map_sqlx_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |err| {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return RepositoryError::Conflict(db.message().to_string());
            }
        }
        RepositoryError::Storage(anyhow::Error::new(err).context(context))
    }
}

/// 转义 LIKE 模式中的通配符
pub(crate) fn like_pattern(filter: &str) -> String {
    let escaped = filter
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
