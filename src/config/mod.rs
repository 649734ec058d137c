//! User Service Core 配置模块
//!
//! 该模块提供了完整的应用程序配置管理功能，包括：
//! - 配置文件加载和解析（单文件或目录合并）
//! - 环境特定配置覆盖
//! - 各服务配置定义
//! - 数据库、日志等基础设施配置

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use toml::Value;
use tracing::warn;

mod manager;
pub use manager::ConfigManager;

/// 全局应用配置实例，使用 OnceLock 确保只初始化一次
static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// 默认 PostgreSQL 配置名称
pub const DEFAULT_POSTGRES_PROFILE: &str = "default";

/// 服务标识
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "user-service".to_string(),
            version: default_version(),
        }
    }
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// 监听地址配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 9091,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 优先）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 输出格式：json / pretty
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub with_target: bool,
    #[serde(default)]
    pub with_thread_ids: bool,
    #[serde(default)]
    pub with_file: bool,
    #[serde(default)]
    pub with_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

/// PostgreSQL 数据库实例配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PostgresInstanceConfig {
    /// 数据库连接 URL
    pub url: String,
    /// 最大连接数
    #[serde(default)]
    pub max_connections: Option<u32>,
    /// 最小连接数
    #[serde(default)]
    pub min_connections: Option<u32>,
    /// 获取连接超时（秒）
    #[serde(default)]
    pub acquire_timeout_secs: Option<u64>,
}

/// 服务端点配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceEndpointConfig {
    /// 服务地址
    pub address: Option<String>,
    /// 服务端口
    pub port: Option<u16>,
}

/// 服务运行时配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceRuntimeConfig {
    /// 服务名称
    #[serde(default)]
    pub service_name: Option<String>,
    /// gRPC 服务器配置
    #[serde(default)]
    pub server: Option<ServiceEndpointConfig>,
    /// HTTP 网关配置
    #[serde(default)]
    pub http: Option<ServiceEndpointConfig>,
}

/// 用户服务配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserServiceConfig {
    #[serde(flatten)]
    pub runtime: ServiceRuntimeConfig,
    /// 使用的 PostgreSQL 配置名称
    #[serde(default)]
    pub postgres: Option<String>,
    /// 用户未设置区域时使用的区域
    #[serde(default)]
    pub default_region: Option<String>,
    /// 区域内无可用实例时回退的区域
    #[serde(default)]
    pub fallback_region: Option<String>,
    /// 已分配实例失效时是否重新选择
    #[serde(default)]
    pub reselect_stale_assignment: Option<bool>,
    /// 分配冲突时的最大重读次数
    #[serde(default)]
    pub assignment_max_attempts: Option<u32>,
    /// 流媒体 API Key 签名密钥
    #[serde(default)]
    pub api_key_secret: Option<String>,
    /// JWT 签名密钥
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// 访问令牌有效期（秒）
    #[serde(default)]
    pub token_ttl_seconds: Option<u64>,
    /// 单个请求超时（毫秒）
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

/// 服务配置集合
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServicesConfig {
    /// 用户服务配置
    #[serde(default)]
    pub user: Option<UserServiceConfig>,
}

/// 应用配置主结构体
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// PostgreSQL 配置映射
    #[serde(default)]
    pub postgres: HashMap<String, PostgresInstanceConfig>,
    /// 服务配置
    #[serde(default)]
    pub services: ServicesConfig,
}

impl AppConfig {
    /// 获取 PostgreSQL 配置
    pub fn postgres_profile(&self, name: &str) -> Option<&PostgresInstanceConfig> {
        self.postgres.get(name)
    }

    /// 获取用户服务配置
    pub fn user_service(&self) -> UserServiceConfig {
        self.services.user.clone().unwrap_or_default()
    }

    /// 组合服务监听配置：运行时配置覆盖全局 server 段
    pub fn compose_server_config(
        &self,
        endpoint: Option<&ServiceEndpointConfig>,
        fallback_port: u16,
    ) -> ServerConfig {
        let mut cfg = ServerConfig {
            address: self.server.address.clone(),
            port: fallback_port,
        };

        if let Some(endpoint) = endpoint {
            if let Some(address) = endpoint.address.as_ref().filter(|a| !a.is_empty()) {
                cfg.address = address.clone();
            }
            if let Some(port) = endpoint.port {
                cfg.port = port;
            }
        }

        cfg
    }

    /// 确保配置有默认值
    fn ensure_defaults(&mut self) {
        if self.server.address.is_empty() {
            self.server.address = "0.0.0.0".to_string();
        }
        if self.server.port == 0 {
            self.server.port = 9091;
        }
        if self.service.name.is_empty() {
            self.service.name = "user-service".to_string();
        }
    }
}

/// 加载配置
///
/// 首次调用时初始化全局配置，之后的调用直接返回已加载的实例。
pub fn load_config(path: Option<&str>) -> &'static AppConfig {
    let candidates: Vec<PathBuf> = match path {
        Some(p) => vec![PathBuf::from(p)],
        None => vec![PathBuf::from("config"), PathBuf::from("config.toml")],
    };

    APP_CONFIG.get_or_init(|| {
        let mut value = load_with_fallback(&candidates);
        if let Err(e) = ConfigManager::load_environment_config(&mut value) {
            warn!("failed to load environment config: {}", e);
        }

        let mut cfg: AppConfig = value.try_into().unwrap_or_else(|err| {
            warn!("invalid configuration, falling back to defaults: {err}");
            AppConfig::default()
        });
        cfg.ensure_defaults();
        ConfigManager::apply_env_overrides(&mut cfg);
        cfg
    })
}

/// 获取应用配置
pub fn app_config() -> Option<&'static AppConfig> {
    APP_CONFIG.get()
}

/// 使用备选方案加载配置
fn load_with_fallback(candidates: &[PathBuf]) -> Value {
    for path in candidates {
        match load_value_from_source(path) {
            Ok(value) => return value,
            Err(err) => {
                warn!("failed to load config from {}: {err}", path.display());
            }
        }
    }

    warn!("no configuration source succeeded, falling back to defaults");
    Value::Table(toml::Table::new())
}

/// 从源加载配置（文件或目录）
pub fn load_config_from_source(path: &Path) -> Result<AppConfig> {
    let mut cfg: AppConfig = load_value_from_source(path)?
        .try_into()
        .with_context(|| format!("invalid config format: {}", path.display()))?;
    cfg.ensure_defaults();
    Ok(cfg)
}

fn load_value_from_source(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(anyhow!(
            "configuration path {} does not exist",
            path.display()
        ));
    }

    let metadata = path
        .metadata()
        .with_context(|| format!("unable to read metadata for {}", path.display()))?;

    if metadata.is_dir() {
        load_value_from_directory(path)
    } else {
        load_toml_value(path)
    }
}

/// 从目录加载配置：base.toml + shared/ + services/ + overrides/
fn load_value_from_directory(path: &Path) -> Result<Value> {
    let base_file = path.join("base.toml");
    if !base_file.exists() {
        return Err(anyhow!(
            "missing base configuration: {}",
            base_file.display()
        ));
    }

    let mut merged = load_toml_value(&base_file)?;

    if !merged.is_table() {
        return Err(anyhow!(
            "base configuration must be a table: {}",
            base_file.display()
        ));
    }

    merge_directory(&mut merged, &path.join("shared"))?;
    merge_directory(&mut merged, &path.join("services"))?;
    merge_directory(&mut merged, &path.join("overrides"))?;

    Ok(merged)
}

fn merge_directory(root: &mut Value, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("unable to read config directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| ext.eq_ignore_ascii_case("toml"))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let value = load_toml_value(&entry.path())?;
        merge_value(root, value);
    }

    Ok(())
}

pub(crate) fn load_toml_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config fragment {}", path.display()))?;
    let value: Value = toml::from_str(&content)
        .with_context(|| format!("invalid TOML content in fragment {}", path.display()))?;
    Ok(value)
}

/// 深度合并：表按键递归合并，其余值直接覆盖
pub(crate) fn merge_value(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Table(overlay_table) => {
            if let Value::Table(base_table) = base {
                for (key, overlay_value) in overlay_table.into_iter() {
                    match base_table.get_mut(&key) {
                        Some(base_value) => merge_value(base_value, overlay_value),
                        None => {
                            base_table.insert(key, overlay_value);
                        }
                    }
                }
            } else {
                *base = Value::Table(overlay_table);
            }
        }
        other => {
            *base = other;
        }
    }
}
