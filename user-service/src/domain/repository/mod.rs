//! 仓储接口
//!
//! 用户目录、实例注册表、客户端分配存储与令牌吊销存储的能力接口，
//! 由 PostgreSQL 与内存两套实现提供。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::model::{
    NewInstance, NewUser, NewUserClient, User, UserClient, UserListQuery, UserUpdate,
    VideoServiceInstance,
};

/// 仓储错误：唯一性冲突与其他存储失败分开报告
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("uniqueness conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// 用户仓储接口
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;

    async fn get_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;

    /// 创建用户，用户名或邮箱重复时返回 `Conflict`
    async fn create(&self, user: NewUser) -> RepositoryResult<User>;

    async fn update(&self, id: &str, update: UserUpdate) -> RepositoryResult<Option<User>>;

    async fn delete(&self, id: &str) -> RepositoryResult<bool>;

    /// 分页查询，返回当前页与总数
    async fn list(&self, query: &UserListQuery) -> RepositoryResult<(Vec<User>, i64)>;

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> RepositoryResult<()>;
}

/// 视频服务实例注册表
#[async_trait]
pub trait VideoServiceInstanceRepository: Send + Sync {
    /// 查询 `(region, tier)` 的可分配实例
    ///
    /// 只返回活跃、健康、允许该等级且负载未满的实例，
    /// 按优先级降序、负载升序排列。
    async fn query_by_region_and_tier(
        &self,
        region: &str,
        tier: &str,
    ) -> RepositoryResult<Vec<VideoServiceInstance>>;

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<VideoServiceInstance>>;

    async fn get_by_name(&self, name: &str) -> RepositoryResult<Option<VideoServiceInstance>>;

    /// 活跃实例列表，可按区域过滤
    async fn list_active(&self, region: Option<&str>)
    -> RepositoryResult<Vec<VideoServiceInstance>>;

    /// 注册实例，名称重复时返回 `Conflict`
    async fn create(&self, instance: NewInstance) -> RepositoryResult<VideoServiceInstance>;

    /// 按 ID 整体更新可变字段，返回是否存在
    async fn update(&self, instance: &VideoServiceInstance) -> RepositoryResult<bool>;

    async fn delete(&self, id: &str) -> RepositoryResult<bool>;

    /// 直接覆盖当前负载，不与容量比较
    async fn update_load(&self, id: &str, load: i32) -> RepositoryResult<bool>;
}

/// 客户端分配存储
///
/// 同一个 client_id 至多存在一条活跃记录。
#[async_trait]
pub trait UserClientRepository: Send + Sync {
    /// 按 client_id 查询活跃记录
    async fn get_by_client_id(&self, client_id: &str) -> RepositoryResult<Option<UserClient>>;

    async fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<UserClient>>;

    /// 创建记录，已存在活跃记录时返回 `Conflict`，失败时不留下部分写入
    async fn create(&self, client: NewUserClient) -> RepositoryResult<UserClient>;

    /// 无条件写入分配的实例
    async fn assign_instance(&self, client_id: &str, instance_id: &str) -> RepositoryResult<bool>;

    /// 仅当当前分配等于 `expected` 时写入新实例
    async fn compare_and_assign(
        &self,
        client_id: &str,
        expected: Option<&str>,
        instance_id: &str,
    ) -> RepositoryResult<bool>;

    async fn update_last_seen(&self, client_id: &str) -> RepositoryResult<()>;

    /// 清除分配，返回是否存在分配
    async fn release(&self, client_id: &str) -> RepositoryResult<bool>;

    async fn deactivate(&self, client_id: &str) -> RepositoryResult<bool>;
}

/// 访问令牌吊销存储
#[async_trait]
pub trait TokenRevocationRepository: Send + Sync {
    /// 吊销令牌，记录保留到令牌过期
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> RepositoryResult<()>;

    async fn is_revoked(&self, jti: &str) -> RepositoryResult<bool>;
}
