//! 视频服务实例
//!
//! 实例的当前负载只在选择时与容量比较，写入时不做截断。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 实例健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "healthy" => Ok(HealthStatus::Healthy),
            "unhealthy" => Ok(HealthStatus::Unhealthy),
            "unknown" | "" => Ok(HealthStatus::Unknown),
            other => Err(format!("unknown health status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoServiceInstance {
    pub id: String,
    pub name: String,
    pub server_url: String,
    pub server_port: i32,
    pub use_ssl: bool,
    pub stream_endpoint: String,
    pub region: String,
    /// 越大越优先
    pub priority: i32,
    pub max_capacity: i32,
    pub current_load: i32,
    pub health_status: HealthStatus,
    pub allowed_tiers: Vec<String>,
    pub max_bitrate: i32,
    pub max_resolution: i32,
    pub codec: String,
    pub metadata: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl VideoServiceInstance {
    pub fn has_capacity(&self) -> bool {
        self.current_load < self.max_capacity
    }

    pub fn allows_tier(&self, tier: &str) -> bool {
        self.allowed_tiers.iter().any(|t| t == tier)
    }

    /// 是否可以作为 `(region, tier)` 的新分配候选
    pub fn is_eligible(&self, region: &str, tier: &str) -> bool {
        self.is_active
            && self.health_status == HealthStatus::Healthy
            && self.region == region
            && self.allows_tier(tier)
            && self.has_capacity()
    }
}

/// 候选实例排序：优先级降序，负载升序，ID 升序保证完全确定
pub fn selection_order(a: &VideoServiceInstance, b: &VideoServiceInstance) -> std::cmp::Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.current_load.cmp(&b.current_load))
        .then_with(|| a.id.cmp(&b.id))
}

/// 注册新实例的参数
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub name: String,
    pub server_url: String,
    pub server_port: i32,
    pub use_ssl: bool,
    pub stream_endpoint: String,
    pub region: String,
    pub priority: i32,
    pub max_capacity: i32,
    pub health_status: HealthStatus,
    pub allowed_tiers: Vec<String>,
    pub max_bitrate: i32,
    pub max_resolution: i32,
    pub codec: String,
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str, priority: i32, load: i32, capacity: i32) -> VideoServiceInstance {
        let now = Utc::now();
        VideoServiceInstance {
            id: id.into(),
            name: id.into(),
            server_url: "video.local".into(),
            server_port: 443,
            use_ssl: true,
            stream_endpoint: "/stream".into(),
            region: "eu".into(),
            priority,
            max_capacity: capacity,
            current_load: load,
            health_status: HealthStatus::Healthy,
            allowed_tiers: vec!["free".into()],
            max_bitrate: 4000,
            max_resolution: 1080,
            codec: "h264".into(),
            metadata: serde_json::Value::Null,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_health_check: None,
        }
    }

    #[test]
    fn test_health_status_parse() {
        assert_eq!("Healthy".parse::<HealthStatus>(), Ok(HealthStatus::Healthy));
        assert_eq!("".parse::<HealthStatus>(), Ok(HealthStatus::Unknown));
        assert!("sick".parse::<HealthStatus>().is_err());
    }

    #[test]
    fn test_full_instance_is_not_eligible() {
        assert!(instance("a", 1, 9, 10).is_eligible("eu", "free"));
        assert!(!instance("a", 1, 10, 10).is_eligible("eu", "free"));
        assert!(!instance("a", 1, 11, 10).is_eligible("eu", "free"));
        assert!(!instance("a", 1, 0, 10).is_eligible("eu", "premium"));
        assert!(!instance("a", 1, 0, 10).is_eligible("us", "free"));
    }

    #[test]
    fn test_selection_order_priority_then_load() {
        let mut list = vec![
            instance("a", 5, 3, 10),
            instance("b", 5, 1, 10),
            instance("c", 7, 9, 10),
        ];
        list.sort_by(selection_order);
        let ids: Vec<_> = list.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }
}
