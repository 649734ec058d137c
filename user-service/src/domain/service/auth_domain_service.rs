//! 认证领域服务：登录、令牌校验与注销

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::domain::DomainError;
use crate::domain::model::User;
use crate::domain::repository::{TokenRevocationRepository, UserRepository};
use crate::domain::security::{IssuedToken, PasswordHasher, TokenCodec};

/// 令牌校验结果
#[derive(Debug, Clone)]
pub struct TokenValidation {
    pub valid: bool,
    pub user: Option<User>,
}

impl TokenValidation {
    fn invalid() -> Self {
        Self {
            valid: false,
            user: None,
        }
    }
}

pub struct AuthDomainService {
    users: Arc<dyn UserRepository>,
    revocations: Arc<dyn TokenRevocationRepository>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenCodec>,
}

impl AuthDomainService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        revocations: Arc<dyn TokenRevocationRepository>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenCodec>,
    ) -> Self {
        Self {
            users,
            revocations,
            hasher,
            tokens,
        }
    }

    /// 用户名密码登录，失败统一返回 `Unauthenticated`
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(IssuedToken, User), DomainError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(DomainError::invalid("username and password are required"));
        }

        let user = self
            .users
            .get_by_username(username.trim())
            .await
            .map_err(DomainError::storage("loading user"))?
            .filter(|u| u.is_active && self.hasher.verify(password, &u.password_hash));

        let Some(mut user) = user else {
            warn!(username = %username, "Login rejected");
            return Err(DomainError::Unauthenticated("invalid credentials".to_string()));
        };

        let token = self.tokens.issue(&user)?;
        let now = Utc::now();
        if let Err(err) = self.users.touch_last_login(&user.id, now).await {
            warn!(user_id = %user.id, error = %err, "Failed to record last login");
        }
        user.last_login = Some(now);

        info!(user_id = %user.id, "User logged in");
        Ok((token, user))
    }

    /// 校验令牌：签名无效、已过期、已吊销或用户不可用时 `valid = false`
    pub async fn validate_token(&self, token: &str) -> Result<TokenValidation, DomainError> {
        let claims = match self.tokens.decode(token) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(error = %err, "Token rejected");
                return Ok(TokenValidation::invalid());
            }
        };

        let revoked = self
            .revocations
            .is_revoked(&claims.jti)
            .await
            .map_err(DomainError::storage("checking token revocation"))?;
        if revoked {
            return Ok(TokenValidation::invalid());
        }

        let user = self
            .users
            .get_by_id(&claims.sub)
            .await
            .map_err(DomainError::storage("loading user"))?
            .filter(|u| u.is_active);

        Ok(match user {
            Some(user) => TokenValidation {
                valid: true,
                user: Some(user),
            },
            None => TokenValidation::invalid(),
        })
    }

    /// 注销：吊销令牌直到其过期
    pub async fn logout(&self, token: &str) -> Result<(), DomainError> {
        let claims = self.tokens.decode(token)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or_else(Utc::now);

        self.revocations
            .revoke(&claims.jti, expires_at)
            .await
            .map_err(DomainError::storage("revoking token"))?;

        info!(user_id = %claims.sub, "User logged out");
        Ok(())
    }
}
