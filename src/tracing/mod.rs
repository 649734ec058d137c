//! 日志初始化模块
//!
//! 根据配置初始化 tracing subscriber，支持 pretty 与 json 两种输出格式。

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// 从配置初始化日志系统
///
/// `RUST_LOG` 优先于配置文件中的日志级别；未提供配置时使用默认配置。
///
/// # 示例
/// ```rust,ignore
/// use user_service_core::config::LoggingConfig;
///
/// init_tracing_from_config(None);
///
/// let config = LoggingConfig {
///     level: "debug".to_string(),
///     format: "json".to_string(),
///     ..LoggingConfig::default()
/// };
/// init_tracing_from_config(Some(&config));
/// ```
pub fn init_tracing_from_config(logging_config: Option<&LoggingConfig>) {
    let default_config = LoggingConfig::default();
    let config = logging_config.unwrap_or(&default_config);

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(config.level.as_str()),
    };

    let builder = fmt::Subscriber::builder()
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_file(config.with_file)
        .with_line_number(config.with_line_number)
        .with_env_filter(env_filter);

    // 重复初始化（例如测试中）时忽略错误
    let _ = if is_json_format(&config.format) {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn is_json_format(format: &str) -> bool {
    format.eq_ignore_ascii_case("json")
}
