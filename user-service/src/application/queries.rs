/// 按 ID 查询用户
#[derive(Debug, Clone)]
pub struct GetUserQuery {
    pub user_id: String,
}

/// 按用户名查询用户
#[derive(Debug, Clone)]
pub struct GetUserByUsernameQuery {
    pub username: String,
}

/// 按客户端 ID 查询所属用户
#[derive(Debug, Clone)]
pub struct GetUserByClientIdQuery {
    pub client_id: String,
}

/// 用户分页查询
#[derive(Debug, Clone)]
pub struct ListUsersQuery {
    pub page: i64,
    pub limit: i64,
    pub filter: Option<String>,
}

/// 令牌校验查询
#[derive(Clone)]
pub struct ValidateTokenQuery {
    pub token: String,
}

/// 活跃实例列表查询
#[derive(Debug, Clone, Default)]
pub struct ListInstancesQuery {
    pub region: Option<String>,
}
