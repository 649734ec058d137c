//! User Service Core 错误工具模块
//!
//! - 定义跨层共享的业务错误码
//! - 负责错误码到 gRPC `Status` 与 HTTP 状态码的映射

use serde::Serialize;
use tonic::{Code, Status};

/// 业务错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParameter,
    Unauthenticated,
    PermissionDenied,
    UserNotFound,
    ResourceNotFound,
    AlreadyExists,
    /// 没有可用的视频服务实例
    ServiceUnavailable,
    /// 请求超过截止时间
    Timeout,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// 对外暴露的稳定字符串形式
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn grpc_code(&self) -> Code {
        match self {
            ErrorCode::InvalidParameter => Code::InvalidArgument,
            ErrorCode::Unauthenticated => Code::Unauthenticated,
            ErrorCode::PermissionDenied => Code::PermissionDenied,
            ErrorCode::UserNotFound | ErrorCode::ResourceNotFound => Code::NotFound,
            ErrorCode::AlreadyExists => Code::AlreadyExists,
            ErrorCode::ServiceUnavailable => Code::Unavailable,
            ErrorCode::Timeout => Code::DeadlineExceeded,
            ErrorCode::DatabaseError | ErrorCode::InternalError => Code::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidParameter => 400,
            ErrorCode::Unauthenticated => 401,
            ErrorCode::PermissionDenied => 403,
            ErrorCode::UserNotFound | ErrorCode::ResourceNotFound => 404,
            ErrorCode::AlreadyExists => 409,
            ErrorCode::ServiceUnavailable => 503,
            ErrorCode::Timeout => 504,
            ErrorCode::DatabaseError | ErrorCode::InternalError => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 将错误码转换为 gRPC Status
pub fn to_rpc_status(code: ErrorCode, message: &str) -> Status {
    Status::new(code.grpc_code(), format!("[{}] {}", code.as_str(), message))
}
