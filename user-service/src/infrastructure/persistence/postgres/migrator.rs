//! SQL 迁移与种子数据执行器
//!
//! 按文件名字典序执行目录中的 `*.sql` 文件，每个文件一个事务，
//! 已执行的文件记录在跟踪表中并被跳过。迁移使用 `schema_migrations`，
//! 种子数据使用 `seeds`。

use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub name: String,
    pub sql: String,
}

/// 迁移跟踪表
pub const MIGRATIONS_TABLE: &str = "schema_migrations";
/// 种子数据跟踪表
pub const SEEDS_TABLE: &str = "seeds";

pub struct Migrator {
    pool: PgPool,
    table: &'static str,
}

impl Migrator {
    pub fn new(pool: PgPool) -> Self {
        Self::with_table(pool, MIGRATIONS_TABLE)
    }

    /// 种子数据执行器，与迁移分开记录
    pub fn seeds(pool: PgPool) -> Self {
        Self::with_table(pool, SEEDS_TABLE)
    }

    fn with_table(pool: PgPool, table: &'static str) -> Self {
        Self { pool, table }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// 读取目录中的迁移文件，按文件名排序
    pub fn discover(dir: &Path) -> Result<Vec<Migration>> {
        let mut migrations = Vec::new();
        let entries = fs::read_dir(dir)
            .with_context(|| format!("unable to read SQL directory {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(OsStr::to_str) != Some("sql") {
                continue;
            }
            let name = path
                .file_name()
                .and_then(OsStr::to_str)
                .map(str::to_string)
                .with_context(|| format!("invalid migration file name {}", path.display()))?;
            let sql = fs::read_to_string(&path)
                .with_context(|| format!("unable to read migration {}", path.display()))?;
            migrations.push(Migration { name, sql });
        }

        migrations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(migrations)
    }

    /// 执行尚未应用的迁移，返回本次应用的文件名
    pub async fn run(&self, migrations: &[Migration]) -> Result<Vec<String>> {
        let table = self.table;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                name TEXT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"
        ))
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to create {table} table"))?;

        let exists_sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE name = $1)");
        let record_sql = format!("INSERT INTO {table} (name) VALUES ($1)");

        let mut applied = Vec::new();
        for migration in migrations {
            let exists: bool = sqlx::query_scalar(&exists_sql)
                .bind(&migration.name)
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("failed to check migration {}", migration.name))?;

            if exists {
                info!(migration = %migration.name, table, "Already applied, skipping");
                continue;
            }

            info!(migration = %migration.name, table, "Applying");
            let mut tx = self.pool.begin().await.context("failed to begin transaction")?;
            sqlx::raw_sql(&migration.sql)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to execute migration {}", migration.name))?;
            sqlx::query(&record_sql)
                .bind(&migration.name)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to record migration {}", migration.name))?;
            tx.commit()
                .await
                .with_context(|| format!("failed to commit migration {}", migration.name))?;

            applied.push(migration.name.clone());
        }

        Ok(applied)
    }
}
