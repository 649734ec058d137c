use chrono::{DateTime, Utc};
use serde::Serialize;

/// 物理客户端与视频服务实例之间的粘性绑定
///
/// `assigned_instance_id` 只是按 ID 的弱引用，解析时实例可能已不存在。
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserClient {
    pub id: String,
    pub user_id: String,
    pub client_id: String,
    pub client_info: serde_json::Value,
    pub assigned_instance_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// 新建客户端记录（ID 与时间戳由仓储生成）
#[derive(Debug, Clone)]
pub struct NewUserClient {
    pub user_id: String,
    pub client_id: String,
    pub client_info: serde_json::Value,
    pub assigned_instance_id: Option<String>,
}
