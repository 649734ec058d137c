use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use user_service::config::UserServiceSettings;
use user_service::infrastructure::persistence::postgres::{Migrator, create_db_pool};
use user_service_core::ServiceHelper;
use user_service_core::tracing::init_tracing_from_config;

/// 执行 PostgreSQL 结构迁移
#[derive(Debug, Parser)]
#[command(name = "user-service-migrate", version)]
struct Cli {
    /// 配置文件或配置目录
    #[arg(long, env = "USER_SERVICE_CONFIG")]
    config: Option<String>,

    /// 迁移文件目录
    #[arg(long, env = "MIGRATIONS_DIR", default_value = "user-service/migrations")]
    dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let app_config = ServiceHelper::load_config(cli.config.as_deref());
    init_tracing_from_config(Some(&app_config.logging));

    let settings = UserServiceSettings::from_app_config(app_config)?;
    let Some(pg_config) = settings.postgres.as_ref() else {
        bail!("PostgreSQL is not configured; set DATABASE_URL or [postgres.default]");
    };

    let migrations = Migrator::discover(&cli.dir)?;
    let pool = create_db_pool(pg_config)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let applied = Migrator::new(pool).run(&migrations).await?;
    info!(
        discovered = migrations.len(),
        applied = applied.len(),
        "Migrations complete"
    );
    Ok(())
}
