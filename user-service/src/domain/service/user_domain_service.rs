//! 用户目录领域服务

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::DomainError;
use crate::domain::model::user::{DEFAULT_ROLE, DEFAULT_SUBSCRIPTION_TIER};
use crate::domain::model::{NewUser, User, UserClient, UserListQuery, UserUpdate};
use crate::domain::repository::{RepositoryError, UserClientRepository, UserRepository};
use crate::domain::security::PasswordHasher;

/// 创建用户的输入
#[derive(Debug, Clone, Default)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub roles: Vec<String>,
    pub subscription_tier: Option<String>,
    pub region: Option<String>,
}

pub struct UserDomainService {
    users: Arc<dyn UserRepository>,
    clients: Arc<dyn UserClientRepository>,
    hasher: Arc<dyn PasswordHasher>,
    default_region: String,
}

impl UserDomainService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        clients: Arc<dyn UserClientRepository>,
        hasher: Arc<dyn PasswordHasher>,
        default_region: String,
    ) -> Self {
        Self {
            users,
            clients,
            hasher,
            default_region,
        }
    }

    pub async fn get_user(&self, id: &str) -> Result<User, DomainError> {
        if id.trim().is_empty() {
            return Err(DomainError::invalid("user id is required"));
        }
        self.users
            .get_by_id(id)
            .await
            .map_err(DomainError::storage("loading user"))?
            .ok_or_else(|| DomainError::UserNotFound(id.to_string()))
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<User, DomainError> {
        if username.trim().is_empty() {
            return Err(DomainError::invalid("username is required"));
        }
        self.users
            .get_by_username(username)
            .await
            .map_err(DomainError::storage("loading user"))?
            .ok_or_else(|| DomainError::UserNotFound(username.to_string()))
    }

    /// 通过客户端 ID 查找所属用户
    pub async fn get_user_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<(User, UserClient), DomainError> {
        if client_id.trim().is_empty() {
            return Err(DomainError::invalid("client_id is required"));
        }
        let client = self
            .clients
            .get_by_client_id(client_id)
            .await
            .map_err(DomainError::storage("loading client"))?
            .ok_or_else(|| DomainError::UserNotFound(format!("client {client_id}")))?;

        let user = self
            .users
            .get_by_id(&client.user_id)
            .await
            .map_err(DomainError::storage("loading user"))?
            .ok_or_else(|| DomainError::UserNotFound(client.user_id.clone()))?;

        Ok((user, client))
    }

    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, DomainError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        if username.is_empty() {
            return Err(DomainError::invalid("username is required"));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::invalid("a valid email is required"));
        }
        if input.password.is_empty() {
            return Err(DomainError::invalid("password is required"));
        }

        let roles = if input.roles.is_empty() {
            vec![DEFAULT_ROLE.to_string()]
        } else {
            input.roles
        };

        let new_user = NewUser {
            username: username.clone(),
            email,
            phone: input.phone.trim().to_string(),
            password_hash: self.hasher.hash(&input.password),
            roles,
            subscription_tier: non_blank(input.subscription_tier)
                .unwrap_or_else(|| DEFAULT_SUBSCRIPTION_TIER.to_string()),
            region: non_blank(input.region).unwrap_or_else(|| self.default_region.clone()),
        };

        let user = self.users.create(new_user).await.map_err(|err| match err {
            RepositoryError::Conflict(_) => {
                DomainError::AlreadyExists(format!("user {username} or its email"))
            }
            other => DomainError::persistence("creating user", other),
        })?;

        info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub async fn update_user(&self, id: &str, update: UserUpdate) -> Result<User, DomainError> {
        if id.trim().is_empty() {
            return Err(DomainError::invalid("user id is required"));
        }
        if update.is_empty() {
            return self.get_user(id).await;
        }
        if matches!(&update.subscription_tier, Some(t) if t.trim().is_empty()) {
            return Err(DomainError::invalid("subscription tier must not be blank"));
        }
        if matches!(&update.email, Some(e) if !e.contains('@')) {
            return Err(DomainError::invalid("a valid email is required"));
        }

        let user = self
            .users
            .update(id, update)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(reason) => DomainError::AlreadyExists(reason),
                other => DomainError::persistence("updating user", other),
            })?
            .ok_or_else(|| DomainError::UserNotFound(id.to_string()))?;

        info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    /// 删除用户，并停用其全部客户端
    pub async fn delete_user(&self, id: &str) -> Result<(), DomainError> {
        if id.trim().is_empty() {
            return Err(DomainError::invalid("user id is required"));
        }

        let clients = self
            .clients
            .list_by_user(id)
            .await
            .map_err(DomainError::storage("listing clients"))?;
        for client in clients.iter().filter(|c| c.is_active) {
            if let Err(err) = self.clients.deactivate(&client.client_id).await {
                warn!(user_id = %id, client_id = %client.client_id, error = %err, "Failed to deactivate client");
            }
        }

        let deleted = self
            .users
            .delete(id)
            .await
            .map_err(DomainError::storage("deleting user"))?;
        if !deleted {
            return Err(DomainError::UserNotFound(id.to_string()));
        }

        info!(user_id = %id, clients = clients.len(), "User deleted");
        Ok(())
    }

    pub async fn list_users(&self, query: &UserListQuery) -> Result<(Vec<User>, i64), DomainError> {
        self.users
            .list(query)
            .await
            .map_err(DomainError::storage("listing users"))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
