use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::model::{NewUserClient, UserClient};
use crate::domain::repository::{RepositoryError, RepositoryResult, UserClientRepository};

/// 客户端分配存储
///
/// 活跃记录以 client_id 为键保存，停用的记录移入历史列表，
/// 因此同一 client_id 至多一条活跃记录。检查与写入在同一把写锁内完成。
#[derive(Default)]
pub struct InMemoryUserClientRepository {
    active: Arc<RwLock<HashMap<String, UserClient>>>,
    inactive: Arc<RwLock<Vec<UserClient>>>,
}

impl InMemoryUserClientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 活跃记录数量
    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }
}

#[async_trait]
impl UserClientRepository for InMemoryUserClientRepository {
    async fn get_by_client_id(&self, client_id: &str) -> RepositoryResult<Option<UserClient>> {
        let map = self.active.read().await;
        Ok(map.get(client_id).cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<UserClient>> {
        let mut clients: Vec<UserClient> = {
            let map = self.active.read().await;
            map.values().filter(|c| c.user_id == user_id).cloned().collect()
        };
        let history = self.inactive.read().await;
        clients.extend(history.iter().filter(|c| c.user_id == user_id).cloned());
        clients.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(clients)
    }

    async fn create(&self, client: NewUserClient) -> RepositoryResult<UserClient> {
        let mut map = self.active.write().await;
        if map.contains_key(&client.client_id) {
            return Err(RepositoryError::Conflict(format!(
                "active client {} already exists",
                client.client_id
            )));
        }

        let now = Utc::now();
        let created = UserClient {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: client.user_id,
            client_id: client.client_id,
            client_info: client.client_info,
            assigned_instance_id: client.assigned_instance_id,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_seen: now,
        };
        map.insert(created.client_id.clone(), created.clone());
        Ok(created)
    }

    async fn assign_instance(&self, client_id: &str, instance_id: &str) -> RepositoryResult<bool> {
        let mut map = self.active.write().await;
        let Some(client) = map.get_mut(client_id) else {
            return Ok(false);
        };
        client.assigned_instance_id = Some(instance_id.to_string());
        client.updated_at = Utc::now();
        Ok(true)
    }

    async fn compare_and_assign(
        &self,
        client_id: &str,
        expected: Option<&str>,
        instance_id: &str,
    ) -> RepositoryResult<bool> {
        let mut map = self.active.write().await;
        let Some(client) = map.get_mut(client_id) else {
            return Ok(false);
        };
        if client.assigned_instance_id.as_deref() != expected {
            return Ok(false);
        }
        let now = Utc::now();
        client.assigned_instance_id = Some(instance_id.to_string());
        client.updated_at = now;
        client.last_seen = now;
        Ok(true)
    }

    async fn update_last_seen(&self, client_id: &str) -> RepositoryResult<()> {
        let mut map = self.active.write().await;
        if let Some(client) = map.get_mut(client_id) {
            client.last_seen = Utc::now();
        }
        Ok(())
    }

    async fn release(&self, client_id: &str) -> RepositoryResult<bool> {
        let mut map = self.active.write().await;
        let Some(client) = map.get_mut(client_id) else {
            return Ok(false);
        };
        let had_assignment = client.assigned_instance_id.take().is_some();
        client.updated_at = Utc::now();
        Ok(had_assignment)
    }

    async fn deactivate(&self, client_id: &str) -> RepositoryResult<bool> {
        let removed = {
            let mut map = self.active.write().await;
            map.remove(client_id)
        };
        match removed {
            Some(mut client) => {
                client.is_active = false;
                client.updated_at = Utc::now();
                self.inactive.write().await.push(client);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_client(client_id: &str, instance: Option<&str>) -> NewUserClient {
        NewUserClient {
            user_id: "u1".into(),
            client_id: client_id.into(),
            client_info: serde_json::json!({}),
            assigned_instance_id: instance.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_second_active_row_conflicts() {
        let repo = InMemoryUserClientRepository::new();
        repo.create(new_client("c1", Some("i1"))).await.unwrap();
        let second = repo.create(new_client("c1", Some("i2"))).await;
        assert!(matches!(second, Err(RepositoryError::Conflict(_))));
        assert_eq!(repo.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_compare_and_assign_requires_expected_value() {
        let repo = InMemoryUserClientRepository::new();
        repo.create(new_client("c1", None)).await.unwrap();

        assert!(!repo.compare_and_assign("c1", Some("i9"), "i1").await.unwrap());
        assert!(repo.compare_and_assign("c1", None, "i1").await.unwrap());
        assert!(!repo.compare_and_assign("c1", None, "i2").await.unwrap());

        let client = repo.get_by_client_id("c1").await.unwrap().unwrap();
        assert_eq!(client.assigned_instance_id.as_deref(), Some("i1"));
    }

    #[tokio::test]
    async fn test_deactivate_allows_new_active_row() {
        let repo = InMemoryUserClientRepository::new();
        repo.create(new_client("c1", Some("i1"))).await.unwrap();
        assert!(repo.deactivate("c1").await.unwrap());
        assert!(repo.get_by_client_id("c1").await.unwrap().is_none());

        repo.create(new_client("c1", Some("i2"))).await.unwrap();
        let all = repo.list_by_user("u1").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|c| c.is_active).count(), 1);
    }

    #[tokio::test]
    async fn test_release_clears_assignment() {
        let repo = InMemoryUserClientRepository::new();
        repo.create(new_client("c1", Some("i1"))).await.unwrap();
        assert!(repo.release("c1").await.unwrap());
        assert!(!repo.release("c1").await.unwrap());
        assert!(!repo.release("missing").await.unwrap());
    }
}
