//! User Service Core 公共库
//!
//! 提供统一的配置加载、日志初始化、错误码与指标注册表

pub mod config;
pub mod error;
pub mod metrics;
pub mod tracing;
pub mod utils;

pub use config::{
    AppConfig, ConfigManager, LoggingConfig, PostgresInstanceConfig, ServiceEndpointConfig,
    ServiceRuntimeConfig, UserServiceConfig, app_config, load_config,
};
pub use error::{ErrorCode, to_rpc_status};
pub use utils::*;
