use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::domain::DomainError;
use crate::domain::model::User;
use crate::domain::security::{IssuedToken, TokenClaims, TokenCodec};

/// HS256 签名的 JWT 访问令牌
pub struct JwtTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: TimeDelta,
}

impl JwtTokenCodec {
    pub fn new(secret: &str, ttl_seconds: u64) -> Result<Self> {
        let ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .with_context(|| format!("token ttl out of range: {ttl_seconds}s"))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }
}

impl TokenCodec for JwtTokenCodec {
    fn issue(&self, user: &User) -> Result<IssuedToken, DomainError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| DomainError::Internal("token expiry out of range".to_string()))?;
        let claims = TokenClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            roles: user.roles.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| DomainError::Internal(format!("failed to sign token: {e}")))?;
        Ok(IssuedToken { token, claims })
    }

    fn decode(&self, token: &str) -> Result<TokenClaims, DomainError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(DomainError::Unauthenticated("missing token".to_string()));
        }
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| DomainError::Unauthenticated(format!("invalid token: {e}")))
    }
}
