use serde::Serialize;

use super::VideoServiceInstance;

/// 返回给客户端的流媒体配置，每次请求重新构建，不持久化
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StreamingConfig {
    pub server_url: String,
    pub server_port: i32,
    pub use_ssl: bool,
    pub api_key: String,
    pub stream_endpoint: String,
    pub max_bitrate: i32,
    pub max_resolution: i32,
    pub codec: String,
}

impl StreamingConfig {
    pub fn from_instance(instance: &VideoServiceInstance, api_key: String) -> Self {
        Self {
            server_url: instance.server_url.clone(),
            server_port: instance.server_port,
            use_ssl: instance.use_ssl,
            api_key,
            stream_endpoint: instance.stream_endpoint.clone(),
            max_bitrate: instance.max_bitrate,
            max_resolution: instance.max_resolution,
            codec: instance.codec.clone(),
        }
    }
}
