//! 安全相关的能力接口：密码摘要、访问令牌编解码、流媒体 API Key 签名

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;
use crate::domain::model::User;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;

    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// 访问令牌声明
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: String,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

pub trait TokenCodec: Send + Sync {
    fn issue(&self, user: &User) -> Result<IssuedToken, DomainError>;

    /// 校验签名与过期时间并解出声明
    fn decode(&self, token: &str) -> Result<TokenClaims, DomainError>;
}

/// 为 `(user_id, client_id)` 生成确定性的流媒体 API Key
pub trait ApiKeySigner: Send + Sync {
    fn sign(&self, user_id: &str, client_id: &str) -> String;
}
