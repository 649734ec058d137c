use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::application::commands::{
    AssignInstanceCommand, CreateUserCommand, DeleteUserCommand, DeregisterInstanceCommand,
    LoginCommand, LogoutCommand, RegisterInstanceCommand, ReleaseClientCommand,
    ResolveStreamingConfigCommand, UpdateInstanceHealthCommand, UpdateInstanceLoadCommand,
    UpdateUserCommand,
};
use crate::application::queries::{
    GetUserByClientIdQuery, GetUserByUsernameQuery, GetUserQuery, ListInstancesQuery,
    ListUsersQuery, ValidateTokenQuery,
};
use crate::domain::DomainError;
use crate::domain::model::{
    StreamingConfig, User, UserClient, UserListQuery, VideoServiceInstance,
};
use crate::domain::security::IssuedToken;
use crate::domain::service::{
    Assignment, AuthDomainService, CreateUserInput, RoutingDomainService, TokenValidation,
    UserDomainService,
};
use crate::service::metrics::RoutingMetrics;

/// 用户命令处理器
pub struct UserCommandHandler {
    user_service: Arc<UserDomainService>,
    auth_service: Arc<AuthDomainService>,
}

impl UserCommandHandler {
    pub fn new(user_service: Arc<UserDomainService>, auth_service: Arc<AuthDomainService>) -> Self {
        Self {
            user_service,
            auth_service,
        }
    }

    #[instrument(skip(self, command), fields(username = %command.username))]
    pub async fn handle_create_user(&self, command: CreateUserCommand) -> Result<User, DomainError> {
        let user = self
            .user_service
            .create_user(CreateUserInput {
                username: command.username,
                email: command.email,
                phone: command.phone,
                password: command.password,
                roles: command.roles,
                subscription_tier: command.subscription_tier,
                region: command.region,
            })
            .await?;

        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    #[instrument(skip(self, command), fields(user_id = %command.user_id))]
    pub async fn handle_update_user(&self, command: UpdateUserCommand) -> Result<User, DomainError> {
        self.user_service
            .update_user(&command.user_id, command.update)
            .await
    }

    #[instrument(skip(self), fields(user_id = %command.user_id))]
    pub async fn handle_delete_user(&self, command: DeleteUserCommand) -> Result<(), DomainError> {
        self.user_service.delete_user(&command.user_id).await?;
        info!(user_id = %command.user_id, "User deleted");
        Ok(())
    }

    /// 处理登录命令，返回令牌与用户
    #[instrument(skip(self, command), fields(username = %command.username))]
    pub async fn handle_login(
        &self,
        command: LoginCommand,
    ) -> Result<(IssuedToken, User), DomainError> {
        self.auth_service
            .login(&command.username, &command.password)
            .await
    }

    #[instrument(skip_all)]
    pub async fn handle_logout(&self, command: LogoutCommand) -> Result<(), DomainError> {
        self.auth_service.logout(&command.token).await
    }
}

/// 用户查询处理器
pub struct UserQueryHandler {
    user_service: Arc<UserDomainService>,
    auth_service: Arc<AuthDomainService>,
}

impl UserQueryHandler {
    pub fn new(user_service: Arc<UserDomainService>, auth_service: Arc<AuthDomainService>) -> Self {
        Self {
            user_service,
            auth_service,
        }
    }

    pub async fn handle_get_user(&self, query: GetUserQuery) -> Result<User, DomainError> {
        self.user_service.get_user(&query.user_id).await
    }

    pub async fn handle_get_user_by_username(
        &self,
        query: GetUserByUsernameQuery,
    ) -> Result<User, DomainError> {
        self.user_service.get_user_by_username(&query.username).await
    }

    pub async fn handle_get_user_by_client_id(
        &self,
        query: GetUserByClientIdQuery,
    ) -> Result<(User, UserClient), DomainError> {
        self.user_service
            .get_user_by_client_id(&query.client_id)
            .await
    }

    /// 分页列出用户，返回 (用户, 总数, 实际页码, 实际每页数量)
    pub async fn handle_list_users(
        &self,
        query: ListUsersQuery,
    ) -> Result<(Vec<User>, i64, u32, u32), DomainError> {
        let list_query = UserListQuery::new(query.page, query.limit, query.filter);
        let (users, total) = self.user_service.list_users(&list_query).await?;
        debug!(total, returned = users.len(), "Users listed");
        Ok((users, total, list_query.page, list_query.limit))
    }

    #[instrument(skip_all)]
    pub async fn handle_validate_token(
        &self,
        query: ValidateTokenQuery,
    ) -> Result<TokenValidation, DomainError> {
        self.auth_service.validate_token(&query.token).await
    }
}

/// 路由命令处理器
///
/// 流媒体配置解析在这里加上请求截止时间并记录路由指标，
/// 领域服务本身不感知超时与指标。
pub struct RoutingCommandHandler {
    routing_service: Arc<RoutingDomainService>,
    metrics: Option<Arc<RoutingMetrics>>,
    request_timeout: Duration,
}

impl RoutingCommandHandler {
    pub fn new(
        routing_service: Arc<RoutingDomainService>,
        metrics: Option<Arc<RoutingMetrics>>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            routing_service,
            metrics,
            request_timeout,
        }
    }

    /// 获取（必要时分配）客户端的流媒体配置
    #[instrument(skip(self), fields(user_id = %command.user_id, client_id = %command.client_id))]
    pub async fn handle_resolve_streaming_config(
        &self,
        command: ResolveStreamingConfigCommand,
    ) -> Result<(Assignment, StreamingConfig), DomainError> {
        let started = Instant::now();

        let result = tokio::time::timeout(
            self.request_timeout,
            self.routing_service
                .get_streaming_config_for_client(&command.user_id, &command.client_id),
        )
        .await
        .unwrap_or_else(|_| Err(DomainError::Timeout("resolving streaming config")));

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        if let Some(metrics) = &self.metrics {
            match &result {
                Ok((assignment, _)) => {
                    metrics.record_assignment(assignment.outcome.as_str());
                    if let Some(source) = assignment.selection {
                        metrics.record_selection(source.as_str());
                    }
                    metrics.observe_resolve("ok", elapsed_ms);
                }
                Err(err) => {
                    if matches!(err, DomainError::NoAvailableInstance { .. }) {
                        metrics.record_selection("none");
                    }
                    metrics.observe_resolve("error", elapsed_ms);
                }
            }
        }

        let (assignment, config) = result?;
        debug!(
            instance_id = %assignment.instance.id,
            outcome = assignment.outcome.as_str(),
            elapsed_ms,
            "Streaming config resolved"
        );

        // 活跃时间刷新失败不影响本次返回
        if let Err(err) = self
            .routing_service
            .update_last_seen(&command.client_id)
            .await
        {
            warn!(client_id = %command.client_id, error = %err, "Failed to refresh last seen");
        }

        Ok((assignment, config))
    }

    #[instrument(skip(self, command), fields(name = %command.instance.name))]
    pub async fn handle_register_instance(
        &self,
        command: RegisterInstanceCommand,
    ) -> Result<VideoServiceInstance, DomainError> {
        self.routing_service.register_instance(command.instance).await
    }

    #[instrument(skip(self), fields(instance_id = %command.instance_id, load = command.load))]
    pub async fn handle_update_instance_load(
        &self,
        command: UpdateInstanceLoadCommand,
    ) -> Result<VideoServiceInstance, DomainError> {
        self.routing_service
            .update_load(&command.instance_id, command.load)
            .await
    }

    #[instrument(skip(self), fields(instance_id = %command.instance_id, status = %command.status))]
    pub async fn handle_update_instance_health(
        &self,
        command: UpdateInstanceHealthCommand,
    ) -> Result<VideoServiceInstance, DomainError> {
        self.routing_service
            .update_instance_health(&command.instance_id, command.status)
            .await
    }

    #[instrument(skip(self), fields(instance_id = %command.instance_id))]
    pub async fn handle_deregister_instance(
        &self,
        command: DeregisterInstanceCommand,
    ) -> Result<(), DomainError> {
        self.routing_service
            .deregister_instance(&command.instance_id)
            .await
    }

    #[instrument(skip(self), fields(client_id = %command.client_id, instance_id = %command.instance_id))]
    pub async fn handle_assign_instance(
        &self,
        command: AssignInstanceCommand,
    ) -> Result<UserClient, DomainError> {
        self.routing_service
            .assign_instance_to_client(&command.client_id, &command.instance_id)
            .await
    }

    #[instrument(skip(self), fields(client_id = %command.client_id))]
    pub async fn handle_release_client(
        &self,
        command: ReleaseClientCommand,
    ) -> Result<bool, DomainError> {
        self.routing_service.release_client(&command.client_id).await
    }
}

/// 路由查询处理器
pub struct RoutingQueryHandler {
    routing_service: Arc<RoutingDomainService>,
}

impl RoutingQueryHandler {
    pub fn new(routing_service: Arc<RoutingDomainService>) -> Self {
        Self { routing_service }
    }

    pub async fn handle_list_instances(
        &self,
        query: ListInstancesQuery,
    ) -> Result<Vec<VideoServiceInstance>, DomainError> {
        self.routing_service
            .list_instances(query.region.as_deref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use prometheus::Registry;

    use crate::domain::model::{HealthStatus, NewInstance, NewUser, UserUpdate};
    use crate::domain::repository::{
        RepositoryResult, UserRepository, VideoServiceInstanceRepository,
    };
    use crate::domain::service::RoutingPolicy;
    use crate::infrastructure::persistence::memory::{
        InMemoryInstanceRepository, InMemoryUserClientRepository, InMemoryUserRepository,
    };
    use crate::infrastructure::security::HmacApiKeySigner;

    /// 每次按 ID 读取用户前等待指定时间
    struct SlowUsers {
        inner: InMemoryUserRepository,
        delay: Duration,
    }

    #[async_trait]
    impl UserRepository for SlowUsers {
        async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_by_id(id).await
        }
        async fn get_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
            self.inner.get_by_username(username).await
        }
        async fn create(&self, user: NewUser) -> RepositoryResult<User> {
            self.inner.create(user).await
        }
        async fn update(&self, id: &str, update: UserUpdate) -> RepositoryResult<Option<User>> {
            self.inner.update(id, update).await
        }
        async fn delete(&self, id: &str) -> RepositoryResult<bool> {
            self.inner.delete(id).await
        }
        async fn list(&self, query: &UserListQuery) -> RepositoryResult<(Vec<User>, i64)> {
            self.inner.list(query).await
        }
        async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> RepositoryResult<()> {
            self.inner.touch_last_login(id, at).await
        }
    }

    struct Harness {
        handler: RoutingCommandHandler,
        user_id: String,
        instances: Arc<InMemoryInstanceRepository>,
        clients: Arc<InMemoryUserClientRepository>,
    }

    async fn handler_with(
        delay: Duration,
        timeout: Duration,
        registry: &Registry,
    ) -> Harness {
        let users = Arc::new(SlowUsers {
            inner: InMemoryUserRepository::new(),
            delay,
        });
        let user = users
            .create(NewUser {
                username: "viewer".into(),
                email: "viewer@example.com".into(),
                phone: String::new(),
                password_hash: "x$y".into(),
                roles: vec!["user".into()],
                subscription_tier: "free".into(),
                region: "eu".into(),
            })
            .await
            .unwrap();

        let instances = Arc::new(InMemoryInstanceRepository::new());
        let clients = Arc::new(InMemoryUserClientRepository::new());
        let service = Arc::new(RoutingDomainService::new(
            users,
            instances.clone(),
            clients.clone(),
            Arc::new(HmacApiKeySigner::new("secret").unwrap()),
            RoutingPolicy::default(),
        ));
        let metrics = RoutingMetrics::new(Some(registry)).unwrap();
        Harness {
            handler: RoutingCommandHandler::new(service, Some(metrics), timeout),
            user_id: user.id,
            instances,
            clients,
        }
    }

    fn eu_instance() -> NewInstance {
        NewInstance {
            name: "eu-1".into(),
            server_url: "eu-1.video.local".into(),
            server_port: 443,
            use_ssl: true,
            stream_endpoint: "/live".into(),
            region: "eu".into(),
            priority: 1,
            max_capacity: 10,
            health_status: HealthStatus::Healthy,
            allowed_tiers: vec!["free".into()],
            max_bitrate: 4000,
            max_resolution: 1080,
            codec: "h264".into(),
            metadata: serde_json::json!({}),
        }
    }

    fn command(user_id: &str) -> ResolveStreamingConfigCommand {
        ResolveStreamingConfigCommand {
            user_id: user_id.to_string(),
            client_id: "c-1".into(),
        }
    }

    #[tokio::test]
    async fn test_resolve_records_outcomes_and_selection() {
        let registry = Registry::new();
        let Harness {
            handler,
            user_id,
            instances,
            ..
        } = handler_with(Duration::ZERO, Duration::from_secs(5), &registry).await;

        let err = handler
            .handle_resolve_streaming_config(command(&user_id))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NoAvailableInstance { .. }));

        instances.create(eu_instance()).await.unwrap();
        let (first, _) = handler
            .handle_resolve_streaming_config(command(&user_id))
            .await
            .unwrap();
        let (second, _) = handler
            .handle_resolve_streaming_config(command(&user_id))
            .await
            .unwrap();
        assert_eq!(first.instance.id, second.instance.id);

        let text = user_service_core::metrics::gather_text(&registry).unwrap();
        assert!(text.contains("routing_selection_total{result=\"none\"} 1"));
        assert!(text.contains("routing_selection_total{result=\"primary\"} 1"));
        assert!(text.contains("routing_assignments_total{outcome=\"created\"} 1"));
        assert!(text.contains("routing_assignments_total{outcome=\"sticky\"} 1"));
        assert!(text.contains("routing_resolve_duration_ms_count{status=\"error\"} 1"));
        assert!(text.contains("routing_resolve_duration_ms_count{status=\"ok\"} 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_times_out_without_creating_client() {
        let registry = Registry::new();
        let Harness {
            handler,
            user_id,
            instances,
            clients,
        } = handler_with(
            Duration::from_secs(10),
            Duration::from_millis(100),
            &registry,
        )
        .await;
        instances.create(eu_instance()).await.unwrap();

        let err = handler
            .handle_resolve_streaming_config(command(&user_id))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Timeout(_)));
        assert!(err.is_retryable());
        assert_eq!(err.code(), user_service_core::ErrorCode::Timeout);
        assert_eq!(clients.active_count().await, 0);
    }
}
