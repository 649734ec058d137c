use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::map_sqlx_error;
use crate::domain::model::{NewUserClient, UserClient};
use crate::domain::repository::{RepositoryResult, UserClientRepository};

const CLIENT_COLUMNS: &str = "id, user_id, client_id, client_info, assigned_instance_id, \
     is_active, created_at, updated_at, last_seen";

#[derive(Debug, FromRow)]
struct UserClientRow {
    id: String,
    user_id: String,
    client_id: String,
    client_info: Option<serde_json::Value>,
    assigned_instance_id: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl From<UserClientRow> for UserClient {
    fn from(row: UserClientRow) -> Self {
        UserClient {
            id: row.id,
            user_id: row.user_id,
            client_id: row.client_id,
            client_info: row
                .client_info
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            assigned_instance_id: row.assigned_instance_id,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_seen: row.last_seen,
        }
    }
}

/// 客户端分配存储
///
/// 依赖 `user_clients (client_id) WHERE is_active` 部分唯一索引保证每个 client_id
/// 至多一条活跃记录，单条 INSERT 要么完整写入要么因冲突失败。
pub struct PostgresUserClientRepository {
    pool: PgPool,
}

impl PostgresUserClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserClientRepository for PostgresUserClientRepository {
    async fn get_by_client_id(&self, client_id: &str) -> RepositoryResult<Option<UserClient>> {
        let row = sqlx::query_as::<_, UserClientRow>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM user_clients WHERE client_id = $1 AND is_active = TRUE"
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to load client"))?;
        Ok(row.map(UserClient::from))
    }

    async fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<UserClient>> {
        let rows = sqlx::query_as::<_, UserClientRow>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM user_clients WHERE user_id = $1 ORDER BY last_seen DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to list clients"))?;
        Ok(rows.into_iter().map(UserClient::from).collect())
    }

    async fn create(&self, client: NewUserClient) -> RepositoryResult<UserClient> {
        let row = sqlx::query_as::<_, UserClientRow>(&format!(
            r#"
            INSERT INTO user_clients (id, user_id, client_id, client_info, assigned_instance_id, is_active, last_seen)
            VALUES ($1, $2, $3, $4, $5, TRUE, NOW())
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&client.user_id)
        .bind(&client.client_id)
        .bind(&client.client_info)
        .bind(client.assigned_instance_id.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to create client"))?;
        Ok(row.into())
    }

    async fn assign_instance(&self, client_id: &str, instance_id: &str) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_clients
            SET assigned_instance_id = $2, updated_at = NOW()
            WHERE client_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(client_id)
        .bind(instance_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to assign instance"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn compare_and_assign(
        &self,
        client_id: &str,
        expected: Option<&str>,
        instance_id: &str,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_clients
            SET assigned_instance_id = $3, updated_at = NOW(), last_seen = NOW()
            WHERE client_id = $1
              AND is_active = TRUE
              AND assigned_instance_id IS NOT DISTINCT FROM $2::text
            "#,
        )
        .bind(client_id)
        .bind(expected)
        .bind(instance_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to assign instance"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_last_seen(&self, client_id: &str) -> RepositoryResult<()> {
        sqlx::query(
            "UPDATE user_clients SET last_seen = NOW() WHERE client_id = $1 AND is_active = TRUE",
        )
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to update last seen"))?;
        Ok(())
    }

    async fn release(&self, client_id: &str) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_clients
            SET assigned_instance_id = NULL, updated_at = NOW()
            WHERE client_id = $1 AND is_active = TRUE AND assigned_instance_id IS NOT NULL
            "#,
        )
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to release client"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate(&self, client_id: &str) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_clients
            SET is_active = FALSE, updated_at = NOW()
            WHERE client_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to deactivate client"))?;
        Ok(result.rows_affected() > 0)
    }
}
