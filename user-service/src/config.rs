use anyhow::{Result, ensure};
use std::env;
use user_service_core::config::{AppConfig, PostgresInstanceConfig};

/// 用户服务运行配置（由全局应用配置和环境变量解析而来）
#[derive(Clone, Debug)]
pub struct UserServiceSettings {
    pub service_name: String,
    pub postgres: Option<PostgresInstanceConfig>,
    pub default_region: String,
    pub fallback_region: String,
    pub reselect_stale_assignment: bool,
    pub assignment_max_attempts: u32,
    pub api_key_secret: String,
    pub jwt_secret: String,
    pub token_ttl_seconds: u64,
    pub request_timeout_ms: u64,
}

pub const DEFAULT_REGION: &str = "default";
pub const DEFAULT_GRPC_PORT: u16 = 9091;
pub const DEFAULT_HTTP_PORT: u16 = 8081;
/// 访问令牌有效期上限（10 年）
pub const MAX_TOKEN_TTL_SECONDS: u64 = 10 * 365 * 24 * 3600;

impl UserServiceSettings {
    /// 从应用配置加载
    pub fn from_app_config(app: &AppConfig) -> Result<Self> {
        let service_config = app.user_service();

        let postgres = service_config
            .postgres
            .as_deref()
            .or(Some(user_service_core::config::DEFAULT_POSTGRES_PROFILE))
            .and_then(|name| app.postgres_profile(name))
            .filter(|profile| !profile.url.is_empty())
            .cloned();

        let default_region = service_config
            .default_region
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let fallback_region = service_config
            .fallback_region
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let api_key_secret = env::var("USER_SERVICE_API_KEY_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| service_config.api_key_secret.clone())
            .unwrap_or_else(|| "change-me-api-key-secret".to_string());

        let jwt_secret = env::var("USER_SERVICE_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| service_config.jwt_secret.clone())
            .unwrap_or_else(|| "change-me-jwt-secret".to_string());

        let token_ttl_seconds = service_config
            .token_ttl_seconds
            .filter(|v| *v > 0)
            .unwrap_or(24 * 3600);
        ensure!(
            token_ttl_seconds <= MAX_TOKEN_TTL_SECONDS,
            "services.user.token_ttl_seconds must not exceed {MAX_TOKEN_TTL_SECONDS}, got {token_ttl_seconds}"
        );

        Ok(Self {
            service_name: service_config
                .runtime
                .service_name
                .clone()
                .unwrap_or_else(|| app.service.name.clone()),
            postgres,
            default_region,
            fallback_region,
            reselect_stale_assignment: service_config.reselect_stale_assignment.unwrap_or(true),
            assignment_max_attempts: service_config
                .assignment_max_attempts
                .filter(|v| *v > 0)
                .unwrap_or(3),
            api_key_secret,
            jwt_secret,
            token_ttl_seconds,
            request_timeout_ms: service_config
                .request_timeout_ms
                .filter(|v| *v > 0)
                .unwrap_or(5_000),
        })
    }
}

impl Default for UserServiceSettings {
    fn default() -> Self {
        Self {
            service_name: "user-service".to_string(),
            postgres: None,
            default_region: DEFAULT_REGION.to_string(),
            fallback_region: DEFAULT_REGION.to_string(),
            reselect_stale_assignment: true,
            assignment_max_attempts: 3,
            api_key_secret: "change-me-api-key-secret".to_string(),
            jwt_secret: "change-me-jwt-secret".to_string(),
            token_ttl_seconds: 24 * 3600,
            request_timeout_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_section_missing() {
        let settings = UserServiceSettings::from_app_config(&AppConfig::default()).unwrap();
        assert_eq!(settings.default_region, "default");
        assert_eq!(settings.fallback_region, "default");
        assert!(settings.reselect_stale_assignment);
        assert_eq!(settings.assignment_max_attempts, 3);
        assert!(settings.postgres.is_none());
    }

    #[test]
    fn test_section_values_are_applied() {
        let app: AppConfig = toml::from_str(
            r#"
            [postgres.users]
            url = "postgres://localhost/users"

            [services.user]
            postgres = "users"
            fallback_region = "global"
            reselect_stale_assignment = false
            assignment_max_attempts = 0
            "#,
        )
        .unwrap();

        let settings = UserServiceSettings::from_app_config(&app).unwrap();
        assert_eq!(settings.fallback_region, "global");
        assert!(!settings.reselect_stale_assignment);
        assert_eq!(settings.assignment_max_attempts, 3);
        assert_eq!(
            settings.postgres.map(|p| p.url),
            Some("postgres://localhost/users".to_string())
        );
    }

    #[test]
    fn test_oversized_token_ttl_is_rejected() {
        let app: AppConfig = toml::from_str(
            r#"
            [services.user]
            token_ttl_seconds = 999999999999
            "#,
        )
        .unwrap();

        let err = UserServiceSettings::from_app_config(&app).unwrap_err();
        assert!(err.to_string().contains("token_ttl_seconds"));
    }
}
