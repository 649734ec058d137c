//! Wire 风格的依赖注入模块
//!
//! 按照 仓储 → 领域服务 → 应用处理器 → 接口 的顺序构建组件

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as AnyhowContext, Result};
use prometheus::Registry;
use tracing::{info, warn};
use user_service_core::config::AppConfig;

use crate::application::handlers::{
    RoutingCommandHandler, RoutingQueryHandler, UserCommandHandler, UserQueryHandler,
};
use crate::config::UserServiceSettings;
use crate::domain::repository::{
    TokenRevocationRepository, UserClientRepository, UserRepository,
    VideoServiceInstanceRepository,
};
use crate::domain::security::{ApiKeySigner, PasswordHasher, TokenCodec};
use crate::domain::service::{
    AuthDomainService, RoutingDomainService, RoutingPolicy, UserDomainService,
};
use crate::infrastructure::persistence::memory::{
    InMemoryInstanceRepository, InMemoryTokenRevocationRepository, InMemoryUserClientRepository,
    InMemoryUserRepository,
};
use crate::infrastructure::persistence::postgres::{
    PostgresInstanceRepository, PostgresUserClientRepository, PostgresUserRepository,
    create_db_pool,
};
use crate::infrastructure::security::{HmacApiKeySigner, JwtTokenCodec, Sha256PasswordHasher};
use crate::interface::grpc::{RoutingAdminGrpcHandler, UserGrpcHandler};
use crate::interface::http::HttpState;
use crate::service::metrics::RoutingMetrics;

/// 仓储集合
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub instances: Arc<dyn VideoServiceInstanceRepository>,
    pub clients: Arc<dyn UserClientRepository>,
    pub revocations: Arc<dyn TokenRevocationRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            instances: Arc::new(InMemoryInstanceRepository::new()),
            clients: Arc::new(InMemoryUserClientRepository::new()),
            revocations: Arc::new(InMemoryTokenRevocationRepository::new()),
        }
    }

    /// PostgreSQL 仓储；令牌吊销记录始终保存在进程内
    pub async fn postgres(settings: &UserServiceSettings) -> Result<Option<Self>> {
        let Some(pg_config) = settings.postgres.as_ref() else {
            return Ok(None);
        };
        let pool = create_db_pool(pg_config)
            .await
            .context("Failed to create PostgreSQL pool")?;

        Ok(Some(Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            instances: Arc::new(PostgresInstanceRepository::new(pool.clone())),
            clients: Arc::new(PostgresUserClientRepository::new(pool)),
            revocations: Arc::new(InMemoryTokenRevocationRepository::new()),
        }))
    }
}

/// 应用上下文 - 包含所有已初始化的服务
pub struct ApplicationContext {
    pub settings: UserServiceSettings,
    pub user_grpc: UserGrpcHandler,
    pub admin_grpc: RoutingAdminGrpcHandler,
    pub http_state: HttpState,
}

/// 构建应用上下文
///
/// 配置了 PostgreSQL 时使用数据库仓储，否则退回到进程内仓储
pub async fn initialize(app_config: &AppConfig) -> Result<ApplicationContext> {
    let settings = UserServiceSettings::from_app_config(app_config)
        .context("Failed to load user service configuration")?;

    let repositories = match Repositories::postgres(&settings).await? {
        Some(repos) => {
            info!("Using PostgreSQL repositories");
            repos
        }
        None => {
            warn!("PostgreSQL not configured, using in-memory repositories (data is not persisted)");
            Repositories::in_memory()
        }
    };

    build_context(
        &settings,
        repositories,
        &user_service_core::metrics::REGISTRY,
    )
}

/// 在给定仓储之上构建领域服务、应用处理器与接口
pub fn build_context(
    settings: &UserServiceSettings,
    repositories: Repositories,
    registry: &Registry,
) -> Result<ApplicationContext> {
    let hasher: Arc<dyn PasswordHasher> = Arc::new(Sha256PasswordHasher);
    let tokens: Arc<dyn TokenCodec> = Arc::new(
        JwtTokenCodec::new(&settings.jwt_secret, settings.token_ttl_seconds)
            .context("Invalid token TTL")?,
    );
    let api_keys: Arc<dyn ApiKeySigner> = Arc::new(
        HmacApiKeySigner::new(&settings.api_key_secret).context("Invalid API key secret")?,
    );

    let policy = RoutingPolicy {
        default_region: settings.default_region.clone(),
        fallback_region: settings.fallback_region.clone(),
        reselect_stale_assignment: settings.reselect_stale_assignment,
        max_attempts: settings.assignment_max_attempts,
    };

    let user_service = Arc::new(UserDomainService::new(
        repositories.users.clone(),
        repositories.clients.clone(),
        hasher.clone(),
        settings.default_region.clone(),
    ));
    let auth_service = Arc::new(AuthDomainService::new(
        repositories.users.clone(),
        repositories.revocations.clone(),
        hasher,
        tokens,
    ));
    let routing_service = Arc::new(RoutingDomainService::new(
        repositories.users,
        repositories.instances,
        repositories.clients,
        api_keys,
        policy,
    ));

    let metrics = RoutingMetrics::new(Some(registry)).context("Failed to create routing metrics")?;

    let user_commands = Arc::new(UserCommandHandler::new(
        user_service.clone(),
        auth_service.clone(),
    ));
    let user_queries = Arc::new(UserQueryHandler::new(user_service, auth_service));
    let routing_commands = Arc::new(RoutingCommandHandler::new(
        routing_service.clone(),
        Some(metrics),
        Duration::from_millis(settings.request_timeout_ms),
    ));
    let routing_queries = Arc::new(RoutingQueryHandler::new(routing_service));

    let user_grpc = UserGrpcHandler::new(
        user_commands.clone(),
        user_queries.clone(),
        routing_commands.clone(),
    );
    let admin_grpc = RoutingAdminGrpcHandler::new(routing_commands.clone(), routing_queries);
    let http_state = HttpState {
        user_commands,
        user_queries,
        routing_commands,
        registry: registry.clone(),
    };

    Ok(ApplicationContext {
        settings: settings.clone(),
        user_grpc,
        admin_grpc,
        http_state,
    })
}
