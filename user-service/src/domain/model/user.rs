//! 用户聚合
//!
//! 用户目录中的用户记录，路由引擎只读取其中的区域与订阅等级。

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_SUBSCRIPTION_TIER: &str = "free";
pub const DEFAULT_ROLE: &str = "user";
pub const STATUS_ACTIVE: &str = "active";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    /// 密码摘要（`{salt}${hex}`），不对外序列化
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: String,
    pub is_active: bool,
    pub roles: Vec<String>,
    pub subscription_tier: String,
    pub region: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// 路由使用的区域：未设置时回退到默认区域
    pub fn routing_region<'a>(&'a self, default_region: &'a str) -> &'a str {
        let region = self.region.trim();
        if region.is_empty() {
            default_region
        } else {
            region
        }
    }
}

/// 新建用户参数（ID 与时间戳由仓储生成）
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub subscription_tier: String,
    pub region: String,
}

/// 用户部分更新，`None` 表示不修改
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
    pub is_active: Option<bool>,
    pub roles: Option<Vec<String>>,
    pub subscription_tier: Option<String>,
    pub region: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.phone.is_none()
            && self.status.is_none()
            && self.is_active.is_none()
            && self.roles.is_none()
            && self.subscription_tier.is_none()
            && self.region.is_none()
    }

    /// 将更新应用到用户记录
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            user.phone = phone.clone();
        }
        if let Some(status) = &self.status {
            user.status = status.clone();
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(roles) = &self.roles {
            user.roles = roles.clone();
        }
        if let Some(tier) = &self.subscription_tier {
            user.subscription_tier = tier.clone();
        }
        if let Some(region) = &self.region {
            user.region = region.clone();
        }
    }
}

/// 用户分页查询
#[derive(Debug, Clone)]
pub struct UserListQuery {
    /// 从 1 开始的页码
    pub page: u32,
    /// 每页数量（1..=100）
    pub limit: u32,
    /// 用户名 / 邮箱子串过滤（不区分大小写）
    pub filter: Option<String>,
}

impl UserListQuery {
    pub const MAX_LIMIT: u32 = 100;
    pub const DEFAULT_LIMIT: u32 = 20;

    pub fn new(page: i64, limit: i64, filter: Option<String>) -> Self {
        let page = if page < 1 { 1 } else { page.min(u32::MAX as i64) as u32 };
        let limit = if limit < 1 {
            Self::DEFAULT_LIMIT
        } else {
            limit.min(Self::MAX_LIMIT as i64) as u32
        };
        Self {
            page,
            limit,
            filter: filter.map(|f| f.trim().to_string()).filter(|f| !f.is_empty()),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    /// 用户是否匹配过滤条件
    pub fn matches(&self, user: &User) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => {
                let needle = filter.to_lowercase();
                user.username.to_lowercase().contains(&needle)
                    || user.email.to_lowercase().contains(&needle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(region: &str) -> User {
        let now = Utc::now();
        User {
            id: "u1".into(),
            username: "alice".into(),
            email: "Alice@Example.com".into(),
            phone: String::new(),
            password_hash: "secret".into(),
            status: STATUS_ACTIVE.into(),
            is_active: true,
            roles: vec![DEFAULT_ROLE.into()],
            subscription_tier: DEFAULT_SUBSCRIPTION_TIER.into(),
            region: region.into(),
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    #[test]
    fn test_routing_region_falls_back_when_blank() {
        assert_eq!(user("").routing_region("default"), "default");
        assert_eq!(user("  ").routing_region("default"), "default");
        assert_eq!(user("eu").routing_region("default"), "eu");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user("eu")).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn test_list_query_clamps_and_filters() {
        let query = UserListQuery::new(0, 500, Some("  EXAMPLE ".into()));
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 100);
        assert_eq!(query.offset(), 0);
        assert!(query.matches(&user("eu")));

        let query = UserListQuery::new(3, 0, Some("bob".into()));
        assert_eq!(query.limit, UserListQuery::DEFAULT_LIMIT);
        assert_eq!(query.offset(), 40);
        assert!(!query.matches(&user("eu")));
    }

    #[test]
    fn test_update_applies_only_set_fields() {
        let mut u = user("eu");
        let update = UserUpdate {
            subscription_tier: Some("premium".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        update.apply_to(&mut u);
        assert_eq!(u.subscription_tier, "premium");
        assert_eq!(u.region, "eu");
    }
}
