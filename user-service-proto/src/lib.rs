//! 用户服务协议定义
//!
//! 由 `build.rs` 通过 tonic-prost-build 生成，包含 `user.v1` 包的消息类型、
//! `UserService` / `RoutingAdminService` 的服务端与客户端代码。

pub mod user {
    pub mod v1 {
        tonic::include_proto!("user.v1");
    }
}

/// 编码后的文件描述符集合，用于注册 gRPC 反射服务
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("user_service_descriptor");

pub use user::v1::*;
