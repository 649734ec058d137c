use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use user_service::config::UserServiceSettings;
use user_service::infrastructure::persistence::postgres::{Migrator, create_db_pool};
use user_service_core::ServiceHelper;
use user_service_core::tracing::init_tracing_from_config;

/// 写入初始数据（视频服务实例等），每个文件只执行一次
#[derive(Debug, Parser)]
#[command(name = "user-service-seed", version)]
struct Cli {
    /// 配置文件或配置目录
    #[arg(long, env = "USER_SERVICE_CONFIG")]
    config: Option<String>,

    /// 种子文件目录
    #[arg(long, env = "SEEDS_DIR", default_value = "user-service/seeds")]
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

    if !cli.dir.is_dir() {
        warn!(dir = %cli.dir.display(), "Seeds directory not found, nothing to apply");
        return Ok(());
    }

    let seeds = Migrator::discover(&cli.dir)?;
    if seeds.is_empty() {
        info!(dir = %cli.dir.display(), "No seed files found");
        return Ok(());
    }

    let pool = create_db_pool(pg_config)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let applied = Migrator::seeds(pool).run(&seeds).await?;
    info!(
        discovered = seeds.len(),
        applied = applied.len(),
        "Seeds complete"
    );
    Ok(())
}
