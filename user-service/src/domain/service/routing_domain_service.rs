//! 视频服务路由领域服务
//!
//! 负责实例选择（区域优先，回退区域兜底）以及客户端到实例的粘性分配：
//!
//! - 未注册：查询用户 → 选择实例 → 创建客户端记录
//! - 已注册未分配：选择实例 → 条件更新原记录
//! - 已注册已分配：直接解析已分配的实例，实例失效时可重新选择
//!
//! 并发的首次请求依赖存储层的唯一约束：创建冲突或条件更新失败时重新读取记录，
//! 使用胜出方写入的实例。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::DomainError;
use crate::domain::model::{
    HealthStatus, NewInstance, NewUserClient, StreamingConfig, UserClient, VideoServiceInstance,
};
use crate::domain::repository::{
    RepositoryError, UserClientRepository, UserRepository, VideoServiceInstanceRepository,
};
use crate::domain::security::ApiKeySigner;

/// 路由策略
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    /// 用户未设置区域时使用
    pub default_region: String,
    /// 区域内无可用实例时的回退区域
    pub fallback_region: String,
    /// 已分配实例被删除或停用时是否重新选择
    pub reselect_stale_assignment: bool,
    /// 分配冲突后的最大重读次数
    pub max_attempts: u32,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            default_region: "default".to_string(),
            fallback_region: "default".to_string(),
            reselect_stale_assignment: true,
            max_attempts: 3,
        }
    }
}

/// 实例来自哪一轮查询
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Primary,
    Fallback,
}

impl SelectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionSource::Primary => "primary",
            SelectionSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub instance: VideoServiceInstance,
    pub source: SelectionSource,
}

/// 分配结果的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOutcome {
    /// 复用已有分配
    Sticky,
    /// 首次请求，新建客户端记录
    Created,
    /// 已注册但未分配的记录完成分配
    Assigned,
    /// 原实例失效后重新选择
    Reselected,
    /// 与并发请求冲突后复用对方的分配
    RaceRecovered,
}

impl AssignmentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentOutcome::Sticky => "sticky",
            AssignmentOutcome::Created => "created",
            AssignmentOutcome::Assigned => "assigned",
            AssignmentOutcome::Reselected => "reselected",
            AssignmentOutcome::RaceRecovered => "race_recovered",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub instance: VideoServiceInstance,
    pub client: UserClient,
    pub outcome: AssignmentOutcome,
    /// 本次请求执行了实例选择时的来源，复用已有分配时为 None
    pub selection: Option<SelectionSource>,
}

/// 路由领域服务
pub struct RoutingDomainService {
    users: Arc<dyn UserRepository>,
    instances: Arc<dyn VideoServiceInstanceRepository>,
    clients: Arc<dyn UserClientRepository>,
    api_keys: Arc<dyn ApiKeySigner>,
    policy: RoutingPolicy,
}

impl RoutingDomainService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        instances: Arc<dyn VideoServiceInstanceRepository>,
        clients: Arc<dyn UserClientRepository>,
        api_keys: Arc<dyn ApiKeySigner>,
        policy: RoutingPolicy,
    ) -> Self {
        Self {
            users,
            instances,
            clients,
            api_keys,
            policy,
        }
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// 为 `(region, tier)` 选择实例
    ///
    /// 先查询指定区域，无结果且该区域不是回退区域时再查询回退区域。
    /// 只读，不记录选择结果。
    pub async fn select_instance(&self, region: &str, tier: &str) -> Result<Selection, DomainError> {
        let tier = tier.trim();
        if tier.is_empty() {
            return Err(DomainError::invalid("subscription tier is required"));
        }
        let region = match region.trim() {
            "" => self.policy.default_region.as_str(),
            r => r,
        };

        if let Some(instance) = self.first_candidate(region, tier).await? {
            return Ok(Selection {
                instance,
                source: SelectionSource::Primary,
            });
        }

        let fallback = self.policy.fallback_region.as_str();
        if region != fallback {
            debug!(region = %region, fallback = %fallback, tier = %tier, "No instance in region, trying fallback");
            if let Some(instance) = self.first_candidate(fallback, tier).await? {
                return Ok(Selection {
                    instance,
                    source: SelectionSource::Fallback,
                });
            }
        }

        Err(DomainError::NoAvailableInstance {
            region: region.to_string(),
            tier: tier.to_string(),
        })
    }

    async fn first_candidate(
        &self,
        region: &str,
        tier: &str,
    ) -> Result<Option<VideoServiceInstance>, DomainError> {
        let candidates = self
            .instances
            .query_by_region_and_tier(region, tier)
            .await
            .map_err(DomainError::storage("querying instances"))?;
        Ok(candidates.into_iter().next())
    }

    /// 按用户的区域与订阅等级选择实例，用户必须存在且处于激活状态
    async fn select_for_user(&self, user_id: &str) -> Result<Selection, DomainError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await
            .map_err(DomainError::storage("loading user"))?
            .filter(|u| u.is_active)
            .ok_or_else(|| DomainError::UserNotFound(user_id.to_string()))?;

        let region = user.routing_region(&self.policy.default_region);
        self.select_instance(region, &user.subscription_tier).await
    }

    /// 解析已分配的实例，实例不存在或已停用时返回 None
    async fn resolve_assigned(
        &self,
        instance_id: &str,
    ) -> Result<Option<VideoServiceInstance>, DomainError> {
        let instance = self
            .instances
            .get_by_id(instance_id)
            .await
            .map_err(DomainError::storage("resolving assigned instance"))?;
        Ok(instance.filter(|i| i.is_active))
    }

    /// 获取或分配客户端的视频服务实例
    pub async fn get_or_assign_instance(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<Assignment, DomainError> {
        require_id("user_id", user_id)?;
        require_id("client_id", client_id)?;

        let attempts = self.policy.max_attempts.max(1);
        let mut remaining = attempts;
        let mut create_conflict_reread = false;
        let mut contended = false;
        let mut attempt = 0;

        while remaining > 0 {
            remaining -= 1;
            attempt += 1;

            let existing = self
                .clients
                .get_by_client_id(client_id)
                .await
                .map_err(DomainError::storage("loading client"))?;

            if let Some(client) = &existing {
                if client.user_id != user_id {
                    warn!(
                        client_id = %client_id,
                        user_id = %user_id,
                        owner_id = %client.user_id,
                        "Client id belongs to another user"
                    );
                    return Err(DomainError::invalid(format!(
                        "client {client_id} is registered to another user"
                    )));
                }
            }

            let Some(mut client) = existing else {
                let selection = self.select_for_user(user_id).await?;
                let new_client = NewUserClient {
                    user_id: user_id.to_string(),
                    client_id: client_id.to_string(),
                    client_info: serde_json::Value::Object(Default::default()),
                    assigned_instance_id: Some(selection.instance.id.clone()),
                };

                match self.clients.create(new_client).await {
                    Ok(client) => {
                        info!(
                            user_id = %user_id,
                            client_id = %client_id,
                            instance_id = %selection.instance.id,
                            "Client registered and assigned"
                        );
                        return Ok(Assignment {
                            instance: selection.instance,
                            client,
                            outcome: AssignmentOutcome::Created,
                            selection: Some(selection.source),
                        });
                    }
                    Err(RepositoryError::Conflict(reason)) => {
                        debug!(client_id = %client_id, attempt, reason = %reason, "Client created concurrently, re-reading");
                        contended = true;
                        // 冲突说明已有行存在，预算用尽时仍重读一次
                        if remaining == 0 && !create_conflict_reread {
                            create_conflict_reread = true;
                            remaining = 1;
                        }
                        continue;
                    }
                    Err(err) => return Err(DomainError::persistence("creating client", err)),
                }
            };

            let expected = client.assigned_instance_id.clone();
            let outcome = match expected.as_deref() {
                Some(instance_id) => match self.resolve_assigned(instance_id).await? {
                    Some(instance) => {
                        let outcome = if contended {
                            AssignmentOutcome::RaceRecovered
                        } else {
                            AssignmentOutcome::Sticky
                        };
                        return Ok(Assignment {
                            instance,
                            client,
                            outcome,
                            selection: None,
                        });
                    }
                    None if self.policy.reselect_stale_assignment => {
                        warn!(
                            client_id = %client_id,
                            instance_id = %instance_id,
                            "Assigned instance missing or inactive, reselecting"
                        );
                        AssignmentOutcome::Reselected
                    }
                    None => return Err(DomainError::InstanceNotFound(instance_id.to_string())),
                },
                None => AssignmentOutcome::Assigned,
            };

            let selection = self.select_for_user(user_id).await?;
            let swapped = self
                .clients
                .compare_and_assign(client_id, expected.as_deref(), &selection.instance.id)
                .await
                .map_err(DomainError::storage("assigning instance"))?;

            if swapped {
                info!(
                    client_id = %client_id,
                    instance_id = %selection.instance.id,
                    outcome = outcome.as_str(),
                    "Client assigned to instance"
                );
                client.assigned_instance_id = Some(selection.instance.id.clone());
                return Ok(Assignment {
                    instance: selection.instance,
                    client,
                    outcome,
                    selection: Some(selection.source),
                });
            }

            debug!(client_id = %client_id, attempt, "Assignment changed concurrently, re-reading");
            contended = true;
        }

        Err(DomainError::persistence(
            "assigning instance",
            anyhow::anyhow!(
                "assignment for client {client_id} still contended after {attempts} attempts"
            ),
        ))
    }

    /// 获取客户端的流媒体配置
    pub async fn get_streaming_config_for_client(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<(Assignment, StreamingConfig), DomainError> {
        let assignment = self.get_or_assign_instance(user_id, client_id).await?;
        let api_key = self.api_keys.sign(user_id, client_id);
        let config = StreamingConfig::from_instance(&assignment.instance, api_key);
        Ok((assignment, config))
    }

    /// 手动将客户端分配到指定实例，实例必须存在且处于激活状态
    pub async fn assign_instance_to_client(
        &self,
        client_id: &str,
        instance_id: &str,
    ) -> Result<UserClient, DomainError> {
        require_id("client_id", client_id)?;
        require_id("instance_id", instance_id)?;

        if self.resolve_assigned(instance_id).await?.is_none() {
            return Err(DomainError::InstanceNotFound(instance_id.to_string()));
        }

        let updated = self
            .clients
            .assign_instance(client_id, instance_id)
            .await
            .map_err(DomainError::storage("assigning instance"))?;
        if !updated {
            return Err(DomainError::ClientNotFound(client_id.to_string()));
        }

        info!(client_id = %client_id, instance_id = %instance_id, "Instance assigned manually");
        self.clients
            .get_by_client_id(client_id)
            .await
            .map_err(DomainError::storage("loading client"))?
            .ok_or_else(|| DomainError::ClientNotFound(client_id.to_string()))
    }

    /// 释放客户端的分配，下次请求会重新选择
    pub async fn release_client(&self, client_id: &str) -> Result<bool, DomainError> {
        require_id("client_id", client_id)?;
        let released = self
            .clients
            .release(client_id)
            .await
            .map_err(DomainError::storage("releasing client"))?;
        if released {
            info!(client_id = %client_id, "Client assignment released");
        }
        Ok(released)
    }

    /// 刷新客户端的最后活跃时间，可重复调用
    pub async fn update_last_seen(&self, client_id: &str) -> Result<(), DomainError> {
        require_id("client_id", client_id)?;
        self.clients
            .update_last_seen(client_id)
            .await
            .map_err(DomainError::storage("updating last seen"))
    }

    /// 覆盖实例的当前负载
    pub async fn update_load(
        &self,
        instance_id: &str,
        load: i32,
    ) -> Result<VideoServiceInstance, DomainError> {
        require_id("instance_id", instance_id)?;
        if load < 0 {
            return Err(DomainError::invalid("load must not be negative"));
        }

        let found = self
            .instances
            .update_load(instance_id, load)
            .await
            .map_err(DomainError::storage("updating load"))?;
        if !found {
            return Err(DomainError::InstanceNotFound(instance_id.to_string()));
        }

        self.load_instance(instance_id).await
    }

    /// 注册新实例
    pub async fn register_instance(
        &self,
        mut instance: NewInstance,
    ) -> Result<VideoServiceInstance, DomainError> {
        if instance.name.trim().is_empty() {
            return Err(DomainError::invalid("instance name is required"));
        }
        if instance.server_url.trim().is_empty() {
            return Err(DomainError::invalid("server_url is required"));
        }
        if !(1..=65535).contains(&instance.server_port) {
            return Err(DomainError::invalid("server_port must be within 1..=65535"));
        }
        if instance.max_capacity <= 0 {
            return Err(DomainError::invalid("max_capacity must be positive"));
        }
        instance.allowed_tiers.retain(|t| !t.trim().is_empty());
        if instance.allowed_tiers.is_empty() {
            return Err(DomainError::invalid("at least one allowed tier is required"));
        }
        if instance.region.trim().is_empty() {
            instance.region = self.policy.default_region.clone();
        }

        let name = instance.name.clone();
        let created = self.instances.create(instance).await.map_err(|err| match err {
            RepositoryError::Conflict(_) => DomainError::AlreadyExists(format!("instance {name}")),
            other => DomainError::persistence("registering instance", other),
        })?;

        info!(
            instance_id = %created.id,
            name = %created.name,
            region = %created.region,
            "Video service instance registered"
        );
        Ok(created)
    }

    /// 活跃实例列表
    pub async fn list_instances(
        &self,
        region: Option<&str>,
    ) -> Result<Vec<VideoServiceInstance>, DomainError> {
        let region = region.map(str::trim).filter(|r| !r.is_empty());
        self.instances
            .list_active(region)
            .await
            .map_err(DomainError::storage("listing instances"))
    }

    /// 更新实例健康状态
    pub async fn update_instance_health(
        &self,
        instance_id: &str,
        status: HealthStatus,
    ) -> Result<VideoServiceInstance, DomainError> {
        require_id("instance_id", instance_id)?;
        let mut instance = self.load_instance(instance_id).await?;
        instance.health_status = status;
        instance.last_health_check = Some(chrono::Utc::now());

        let found = self
            .instances
            .update(&instance)
            .await
            .map_err(DomainError::storage("updating instance"))?;
        if !found {
            return Err(DomainError::InstanceNotFound(instance_id.to_string()));
        }

        info!(instance_id = %instance_id, status = %status, "Instance health updated");
        self.load_instance(instance_id).await
    }

    /// 注销实例，已分配到该实例的客户端会在下次请求时重新选择
    pub async fn deregister_instance(&self, instance_id: &str) -> Result<(), DomainError> {
        require_id("instance_id", instance_id)?;
        let deleted = self
            .instances
            .delete(instance_id)
            .await
            .map_err(DomainError::storage("deleting instance"))?;
        if !deleted {
            return Err(DomainError::InstanceNotFound(instance_id.to_string()));
        }
        info!(instance_id = %instance_id, "Video service instance deregistered");
        Ok(())
    }

    async fn load_instance(&self, instance_id: &str) -> Result<VideoServiceInstance, DomainError> {
        self.instances
            .get_by_id(instance_id)
            .await
            .map_err(DomainError::storage("loading instance"))?
            .ok_or_else(|| DomainError::InstanceNotFound(instance_id.to_string()))
    }
}

fn require_id(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::invalid(format!("{field} is required")));
    }
    Ok(())
}
