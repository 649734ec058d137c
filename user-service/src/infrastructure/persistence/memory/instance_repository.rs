use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::model::instance::selection_order;
use crate::domain::model::{NewInstance, VideoServiceInstance};
use crate::domain::repository::{
    RepositoryError, RepositoryResult, VideoServiceInstanceRepository,
};

#[derive(Default)]
pub struct InMemoryInstanceRepository {
    instances: Arc<RwLock<HashMap<String, VideoServiceInstance>>>,
}

impl InMemoryInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入完整实例（保留给定 ID），用于预置数据
    pub async fn insert(&self, instance: VideoServiceInstance) {
        let mut map = self.instances.write().await;
        map.insert(instance.id.clone(), instance);
    }
}

#[async_trait]
impl VideoServiceInstanceRepository for InMemoryInstanceRepository {
    async fn query_by_region_and_tier(
        &self,
        region: &str,
        tier: &str,
    ) -> RepositoryResult<Vec<VideoServiceInstance>> {
        let map = self.instances.read().await;
        let mut candidates: Vec<VideoServiceInstance> = map
            .values()
            .filter(|i| i.is_eligible(region, tier))
            .cloned()
            .collect();
        candidates.sort_by(selection_order);
        Ok(candidates)
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<VideoServiceInstance>> {
        let map = self.instances.read().await;
        Ok(map.get(id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> RepositoryResult<Option<VideoServiceInstance>> {
        let map = self.instances.read().await;
        Ok(map.values().find(|i| i.name == name).cloned())
    }

    async fn list_active(
        &self,
        region: Option<&str>,
    ) -> RepositoryResult<Vec<VideoServiceInstance>> {
        let map = self.instances.read().await;
        let mut active: Vec<VideoServiceInstance> = map
            .values()
            .filter(|i| i.is_active && region.is_none_or(|r| i.region == r))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.region.cmp(&b.region).then_with(|| selection_order(a, b)));
        Ok(active)
    }

    async fn create(&self, instance: NewInstance) -> RepositoryResult<VideoServiceInstance> {
        let mut map = self.instances.write().await;
        if map.values().any(|i| i.name == instance.name) {
            return Err(RepositoryError::Conflict(format!(
                "instance name {} already registered",
                instance.name
            )));
        }

        let now = Utc::now();
        let created = VideoServiceInstance {
            id: uuid::Uuid::new_v4().to_string(),
            name: instance.name,
            server_url: instance.server_url,
            server_port: instance.server_port,
            use_ssl: instance.use_ssl,
            stream_endpoint: instance.stream_endpoint,
            region: instance.region,
            priority: instance.priority,
            max_capacity: instance.max_capacity,
            current_load: 0,
            health_status: instance.health_status,
            allowed_tiers: instance.allowed_tiers,
            max_bitrate: instance.max_bitrate,
            max_resolution: instance.max_resolution,
            codec: instance.codec,
            metadata: instance.metadata,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_health_check: None,
        };
        map.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update(&self, instance: &VideoServiceInstance) -> RepositoryResult<bool> {
        let mut map = self.instances.write().await;
        let Some(stored) = map.get_mut(&instance.id) else {
            return Ok(false);
        };
        let created_at = stored.created_at;
        *stored = instance.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let mut map = self.instances.write().await;
        Ok(map.remove(id).is_some())
    }

    async fn update_load(&self, id: &str, load: i32) -> RepositoryResult<bool> {
        let mut map = self.instances.write().await;
        match map.get_mut(id) {
            Some(instance) => {
                instance.current_load = load;
                instance.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
