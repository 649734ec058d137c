//! 辅助工具函数模块
//!
//! 提供配置加载、监听地址解析等服务启动辅助函数

use crate::config::{AppConfig, ServiceEndpointConfig};
use anyhow::{Context, Result};
use std::net::SocketAddr;

/// 服务启动辅助函数
pub struct ServiceHelper;

impl ServiceHelper {
    /// 加载配置
    ///
    /// # 参数
    /// * `config_path` - 配置路径（文件或目录），None 时依次尝试 `config/` 与 `config.toml`
    pub fn load_config(config_path: Option<&str>) -> &'static AppConfig {
        crate::config::load_config(config_path)
    }

    /// 解析服务监听地址
    ///
    /// # 参数
    /// * `config` - 应用配置
    /// * `endpoint` - 服务自身的端点配置（可选）
    /// * `fallback_port` - 端点未指定端口时使用的端口
    pub fn parse_server_addr(
        config: &AppConfig,
        endpoint: Option<&ServiceEndpointConfig>,
        fallback_port: u16,
    ) -> Result<SocketAddr> {
        let server = config.compose_server_config(endpoint, fallback_port);
        let addr = format!("{}:{}", server.address, server.port)
            .parse()
            .with_context(|| {
                format!("invalid server address: {}:{}", server.address, server.port)
            })?;
        Ok(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_addr_uses_endpoint_port() {
        let cfg = AppConfig::default();
        let endpoint = ServiceEndpointConfig {
            address: Some("127.0.0.1".to_string()),
            port: Some(18081),
        };
        let addr = ServiceHelper::parse_server_addr(&cfg, Some(&endpoint), 8081).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:18081");
    }

    #[test]
    fn test_parse_server_addr_rejects_garbage_address() {
        let cfg = AppConfig::default();
        let endpoint = ServiceEndpointConfig {
            address: Some("not an address".to_string()),
            port: None,
        };
        assert!(ServiceHelper::parse_server_addr(&cfg, Some(&endpoint), 8081).is_err());
    }
}
