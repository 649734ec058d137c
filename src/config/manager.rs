//! 配置管理器 - 负责处理不同环境下的配置选择和覆盖
//!
//! 该模块提供了配置管理功能，包括：
//! - 加载环境特定配置（config/environments/{env}.toml）
//! - 使用环境变量覆盖数据库与日志配置

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use toml::Value;

use super::{AppConfig, DEFAULT_POSTGRES_PROFILE, PostgresInstanceConfig};

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取当前环境名称
    ///
    /// 从环境变量 USER_SERVICE_ENV 获取，未设置时默认为 "development"
    pub fn get_environment() -> String {
        env::var("USER_SERVICE_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// 根据环境加载特定配置
    ///
    /// 加载 config/environments/{environment}.toml 文件中的配置，
    /// 并将其深度合并到尚未解析的基础配置中
    pub fn load_environment_config(base: &mut Value) -> Result<()> {
        let env = Self::get_environment();
        let env_config_path = format!("config/environments/{}.toml", env);
        let path = Path::new(&env_config_path);

        if !path.exists() {
            return Ok(());
        }

        let overlay = super::load_toml_value(path)
            .with_context(|| format!("invalid environment config: {}", env_config_path))?;
        super::merge_value(base, overlay);
        Ok(())
    }

    /// 使用进程环境变量覆盖配置
    pub fn apply_env_overrides(config: &mut AppConfig) {
        Self::apply_overrides_with(config, |key| env::var(key).ok());
    }

    /// 使用指定的变量来源覆盖配置
    ///
    /// - `DATABASE_URL` 直接替换默认 PostgreSQL 连接串
    /// - 否则任一 `DB_*` 变量存在时，按分量重新拼装连接串
    /// - `LOG_LEVEL` / `LOG_FORMAT` 覆盖日志配置
    pub fn apply_overrides_with<F>(config: &mut AppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let database_url = non_empty("DATABASE_URL").or_else(|| {
            let keys = ["DB_HOST", "DB_PORT", "DB_USER", "DB_PASSWORD", "DB_NAME", "DB_SSLMODE"];
            if keys.iter().all(|k| non_empty(k).is_none()) {
                return None;
            }
            Some(format!(
                "postgres://{}:{}@{}:{}/{}?sslmode={}",
                non_empty("DB_USER").unwrap_or_else(|| "postgres".to_string()),
                non_empty("DB_PASSWORD").unwrap_or_else(|| "postgres".to_string()),
                non_empty("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                non_empty("DB_PORT")
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(5432),
                non_empty("DB_NAME").unwrap_or_else(|| "user_service".to_string()),
                non_empty("DB_SSLMODE").unwrap_or_else(|| "disable".to_string()),
            ))
        });

        if let Some(url) = database_url {
            config
                .postgres
                .entry(DEFAULT_POSTGRES_PROFILE.to_string())
                .or_insert_with(PostgresInstanceConfig::default)
                .url = url;
        }

        if let Some(level) = non_empty("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = non_empty("LOG_FORMAT") {
            config.logging.format = format;
        }
    }
}
