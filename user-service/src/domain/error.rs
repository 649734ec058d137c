//! 领域错误
//!
//! 路由引擎与用户目录的错误分类，每个变体对应一个对外错误码。

use thiserror::Error;
use user_service_core::error::{ErrorCode, to_rpc_status};

use crate::domain::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("no available video service instance for region '{region}' tier '{tier}'")]
    NoAvailableInstance { region: String, tier: String },

    #[error("video service instance not found: {0}")]
    InstanceNotFound(String),

    #[error("client not found: {0}")]
    ClientNotFound(String),

    #[error("persistence failure while {stage}: {source}")]
    Persistence {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("deadline exceeded while {0}")]
    Timeout(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::UserNotFound(_) => ErrorCode::UserNotFound,
            DomainError::NoAvailableInstance { .. } => ErrorCode::ServiceUnavailable,
            DomainError::InstanceNotFound(_) | DomainError::ClientNotFound(_) => {
                ErrorCode::ResourceNotFound
            }
            DomainError::Persistence { .. } => ErrorCode::DatabaseError,
            DomainError::InvalidInput(_) => ErrorCode::InvalidParameter,
            DomainError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            DomainError::Unauthenticated(_) => ErrorCode::Unauthenticated,
            DomainError::Timeout(_) => ErrorCode::Timeout,
            DomainError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 调用方稍后重试是否可能成功
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::NoAvailableInstance { .. }
                | DomainError::Persistence { .. }
                | DomainError::Timeout(_)
        )
    }

    pub fn persistence(stage: &'static str, source: impl Into<anyhow::Error>) -> Self {
        DomainError::Persistence {
            stage,
            source: source.into(),
        }
    }

    /// 将仓储错误映射为持久化错误（冲突同样视为失败）
    pub fn storage(stage: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |err| DomainError::persistence(stage, err)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        DomainError::InvalidInput(message.into())
    }
}

impl From<DomainError> for tonic::Status {
    fn from(err: DomainError) -> Self {
        to_rpc_status(err.code(), &err.to_string())
    }
}
