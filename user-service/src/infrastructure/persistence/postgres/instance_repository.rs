use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::map_sqlx_error;
use crate::domain::model::{HealthStatus, NewInstance, VideoServiceInstance};
use crate::domain::repository::{
    RepositoryError, RepositoryResult, VideoServiceInstanceRepository,
};

const INSTANCE_COLUMNS: &str = "id, name, server_url, server_port, use_ssl, stream_endpoint, \
     region, priority, max_capacity, current_load, health_status, allowed_tiers, max_bitrate, \
     max_resolution, codec, metadata, is_active, created_at, updated_at, last_health_check";

#[derive(Debug, FromRow)]
struct InstanceRow {
    id: String,
    name: String,
    server_url: String,
    server_port: i32,
    use_ssl: bool,
    stream_endpoint: String,
    region: String,
    priority: i32,
    max_capacity: i32,
    current_load: i32,
    health_status: String,
    allowed_tiers: Vec<String>,
    max_bitrate: i32,
    max_resolution: i32,
    codec: String,
    metadata: Option<serde_json::Value>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_health_check: Option<DateTime<Utc>>,
}

impl TryFrom<InstanceRow> for VideoServiceInstance {
    type Error = anyhow::Error;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        let health_status = HealthStatus::from_str(&row.health_status)
            .map_err(|e| anyhow!("instance {}: {e}", row.id))?;

        Ok(VideoServiceInstance {
            id: row.id,
            name: row.name,
            server_url: row.server_url,
            server_port: row.server_port,
            use_ssl: row.use_ssl,
            stream_endpoint: row.stream_endpoint,
            region: row.region,
            priority: row.priority,
            max_capacity: row.max_capacity,
            current_load: row.current_load,
            health_status,
            allowed_tiers: row.allowed_tiers,
            max_bitrate: row.max_bitrate,
            max_resolution: row.max_resolution,
            codec: row.codec,
            metadata: row.metadata.unwrap_or(serde_json::Value::Null),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_health_check: row.last_health_check,
        })
    }
}

fn convert_rows(rows: Vec<InstanceRow>) -> RepositoryResult<Vec<VideoServiceInstance>> {
    rows.into_iter()
        .map(|row| VideoServiceInstance::try_from(row).map_err(RepositoryError::Storage))
        .collect()
}

fn convert_row(row: Option<InstanceRow>) -> RepositoryResult<Option<VideoServiceInstance>> {
    row.map(VideoServiceInstance::try_from)
        .transpose()
        .map_err(RepositoryError::Storage)
}

pub struct PostgresInstanceRepository {
    pool: PgPool,
}

impl PostgresInstanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoServiceInstanceRepository for PostgresInstanceRepository {
    async fn query_by_region_and_tier(
        &self,
        region: &str,
        tier: &str,
    ) -> RepositoryResult<Vec<VideoServiceInstance>> {
        let rows = sqlx::query_as::<_, InstanceRow>(&format!(
            r#"
            SELECT {INSTANCE_COLUMNS}
            FROM video_service_instances
            WHERE is_active = TRUE
              AND health_status = 'healthy'
              AND region = $1
              AND $2 = ANY(allowed_tiers)
              AND current_load < max_capacity
            ORDER BY priority DESC, current_load ASC, id ASC
            "#
        ))
        .bind(region)
        .bind(tier)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to query instances by region and tier"))?;
        convert_rows(rows)
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<VideoServiceInstance>> {
        let row = sqlx::query_as::<_, InstanceRow>(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM video_service_instances WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to load instance"))?;
        convert_row(row)
    }

    async fn get_by_name(&self, name: &str) -> RepositoryResult<Option<VideoServiceInstance>> {
        let row = sqlx::query_as::<_, InstanceRow>(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM video_service_instances WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to load instance by name"))?;
        convert_row(row)
    }

    async fn list_active(
        &self,
        region: Option<&str>,
    ) -> RepositoryResult<Vec<VideoServiceInstance>> {
        let rows = sqlx::query_as::<_, InstanceRow>(&format!(
            r#"
            SELECT {INSTANCE_COLUMNS}
            FROM video_service_instances
            WHERE is_active = TRUE AND ($1::text IS NULL OR region = $1)
            ORDER BY region ASC, priority DESC, current_load ASC, id ASC
            "#
        ))
        .bind(region)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to list instances"))?;
        convert_rows(rows)
    }

    async fn create(&self, instance: NewInstance) -> RepositoryResult<VideoServiceInstance> {
        let row = sqlx::query_as::<_, InstanceRow>(&format!(
            r#"
            INSERT INTO video_service_instances (
                id, name, server_url, server_port, use_ssl, stream_endpoint, region,
                priority, max_capacity, current_load, health_status, allowed_tiers,
                max_bitrate, max_resolution, codec, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10, $11, $12, $13, $14, $15)
            RETURNING {INSTANCE_COLUMNS}
            "#
        ))
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&instance.name)
        .bind(&instance.server_url)
        .bind(instance.server_port)
        .bind(instance.use_ssl)
        .bind(&instance.stream_endpoint)
        .bind(&instance.region)
        .bind(instance.priority)
        .bind(instance.max_capacity)
        .bind(instance.health_status.as_str())
        .bind(&instance.allowed_tiers)
        .bind(instance.max_bitrate)
        .bind(instance.max_resolution)
        .bind(&instance.codec)
        .bind(&instance.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to create instance"))?;

        VideoServiceInstance::try_from(row).map_err(RepositoryError::Storage)
    }

    async fn update(&self, instance: &VideoServiceInstance) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE video_service_instances SET
                name = $2,
                server_url = $3,
                server_port = $4,
                use_ssl = $5,
                stream_endpoint = $6,
                region = $7,
                priority = $8,
                max_capacity = $9,
                current_load = $10,
                health_status = $11,
                allowed_tiers = $12,
                max_bitrate = $13,
                max_resolution = $14,
                codec = $15,
                metadata = $16,
                is_active = $17,
                last_health_check = $18,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.name)
        .bind(&instance.server_url)
        .bind(instance.server_port)
        .bind(instance.use_ssl)
        .bind(&instance.stream_endpoint)
        .bind(&instance.region)
        .bind(instance.priority)
        .bind(instance.max_capacity)
        .bind(instance.current_load)
        .bind(instance.health_status.as_str())
        .bind(&instance.allowed_tiers)
        .bind(instance.max_bitrate)
        .bind(instance.max_resolution)
        .bind(&instance.codec)
        .bind(&instance.metadata)
        .bind(instance.is_active)
        .bind(instance.last_health_check)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to update instance"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM video_service_instances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error("failed to delete instance"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_load(&self, id: &str, load: i32) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE video_service_instances SET current_load = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(load)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error("failed to update instance load"))?;
        Ok(result.rows_affected() > 0)
    }
}
