use crate::domain::model::{HealthStatus, NewInstance, UserUpdate};

/// 创建用户命令
#[derive(Debug, Clone)]
pub struct CreateUserCommand {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub roles: Vec<String>,
    pub subscription_tier: Option<String>,
    pub region: Option<String>,
}

/// 更新用户命令
#[derive(Debug, Clone)]
pub struct UpdateUserCommand {
    pub user_id: String,
    pub update: UserUpdate,
}

/// 删除用户命令
#[derive(Debug, Clone)]
pub struct DeleteUserCommand {
    pub user_id: String,
}

/// 登录命令
#[derive(Clone)]
pub struct LoginCommand {
    pub username: String,
    pub password: String,
}

/// 注销命令
#[derive(Clone)]
pub struct LogoutCommand {
    pub token: String,
}

/// 获取（必要时分配）客户端流媒体配置
#[derive(Debug, Clone)]
pub struct ResolveStreamingConfigCommand {
    pub user_id: String,
    pub client_id: String,
}

/// 注册视频服务实例
#[derive(Debug, Clone)]
pub struct RegisterInstanceCommand {
    pub instance: NewInstance,
}

/// 覆盖实例负载
#[derive(Debug, Clone)]
pub struct UpdateInstanceLoadCommand {
    pub instance_id: String,
    pub load: i32,
}

/// 更新实例健康状态
#[derive(Debug, Clone)]
pub struct UpdateInstanceHealthCommand {
    pub instance_id: String,
    pub status: HealthStatus,
}

/// 注销实例
#[derive(Debug, Clone)]
pub struct DeregisterInstanceCommand {
    pub instance_id: String,
}

/// 手动分配实例
#[derive(Debug, Clone)]
pub struct AssignInstanceCommand {
    pub client_id: String,
    pub instance_id: String,
}

/// 释放客户端分配
#[derive(Debug, Clone)]
pub struct ReleaseClientCommand {
    pub client_id: String,
}
