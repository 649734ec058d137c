use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{like_pattern, map_sqlx_error};
use crate::domain::model::{NewUser, User, UserListQuery, UserUpdate};
use crate::domain::repository::{RepositoryResult, UserRepository};

const USER_COLUMNS: &str = "id, username, email, phone, password_hash, status, is_active, roles, \
     subscription_tier, region, created_at, updated_at, last_login";

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    phone: String,
    password_hash: String,
    status: String,
    is_active: bool,
    roles: Vec<String>,
    subscription_tier: String,
    region: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            phone: row.phone,
            password_hash: row.password_hash,
            status: row.status,
            is_active: row.is_active,
            roles: row.roles,
            subscription_tier: row.subscription_tier,
            region: row.region,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login: row.last_login,
        }
    }
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to load user by id"))?;
        Ok(row.map(User::from))
    }

    async fn get_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to load user by username"))?;
        Ok(row.map(User::from))
    }

    async fn create(&self, user: NewUser) -> RepositoryResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, username, email, phone, password_hash, roles, subscription_tier, region)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.roles)
        .bind(&user.subscription_tier)
        .bind(&user.region)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to create user"))?;
        Ok(row.into())
    }

    async fn update(&self, id: &str, update: UserUpdate) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                phone = COALESCE($3, phone),
                status = COALESCE($4, status),
                is_active = COALESCE($5, is_active),
                roles = COALESCE($6, roles),
                subscription_tier = COALESCE($7, subscription_tier),
                region = COALESCE($8, region),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.email)
        .bind(update.phone)
        .bind(update.status)
        .bind(update.is_active)
        .bind(update.roles)
        .bind(update.subscription_tier)
        .bind(update.region)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to update user"))?;
        Ok(row.map(User::from))
    }

    async fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error("failed to delete user"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, query: &UserListQuery) -> RepositoryResult<(Vec<User>, i64)> {
        let pattern = query.filter.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users
            WHERE $1::text IS NULL OR username ILIKE $1 OR email ILIKE $1
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to count users"))?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE $1::text IS NULL OR username ILIKE $1 OR email ILIKE $1
            ORDER BY created_at DESC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(pattern.as_deref())
        .bind(query.limit as i64)
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to list users"))?;

        Ok((rows.into_iter().map(User::from).collect(), total))
    }

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> RepositoryResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error("failed to record last login"))?;
        Ok(())
    }
}
