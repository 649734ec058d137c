use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::model::user::STATUS_ACTIVE;
use crate::domain::model::{NewUser, User, UserListQuery, UserUpdate};
use crate::domain::repository::{RepositoryError, RepositoryResult, UserRepository};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn conflicts(existing: &User, username: &str, email: &str) -> bool {
    existing.username.eq_ignore_ascii_case(username) || existing.email.eq_ignore_ascii_case(email)
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        let map = self.users.read().await;
        Ok(map.get(id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let map = self.users.read().await;
        Ok(map.values().find(|u| u.username == username).cloned())
    }

    async fn create(&self, user: NewUser) -> RepositoryResult<User> {
        let mut map = self.users.write().await;
        if map.values().any(|u| conflicts(u, &user.username, &user.email)) {
            return Err(RepositoryError::Conflict(format!(
                "username {} or email {} already taken",
                user.username, user.email
            )));
        }

        let now = Utc::now();
        let created = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: user.username,
            email: user.email,
            phone: user.phone,
            password_hash: user.password_hash,
            status: STATUS_ACTIVE.to_string(),
            is_active: true,
            roles: user.roles,
            subscription_tier: user.subscription_tier,
            region: user.region,
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        map.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, update: UserUpdate) -> RepositoryResult<Option<User>> {
        let mut map = self.users.write().await;
        if let Some(email) = &update.email {
            if map
                .values()
                .any(|u| u.id != id && u.email.eq_ignore_ascii_case(email))
            {
                return Err(RepositoryError::Conflict(format!("email {email} already taken")));
            }
        }

        let Some(user) = map.get_mut(id) else {
            return Ok(None);
        };
        update.apply_to(user);
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let mut map = self.users.write().await;
        Ok(map.remove(id).is_some())
    }

    async fn list(&self, query: &UserListQuery) -> RepositoryResult<(Vec<User>, i64)> {
        let map = self.users.read().await;
        let mut matched: Vec<&User> = map.values().filter(|u| query.matches(u)).collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> RepositoryResult<()> {
        let mut map = self.users.write().await;
        if let Some(user) = map.get_mut(id) {
            user.last_login = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            phone: String::new(),
            password_hash: "x".into(),
            roles: vec!["user".into()],
            subscription_tier: "free".into(),
            region: "eu".into(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_or_email_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("alice", "alice@example.com")).await.unwrap();

        let dup_name = repo.create(new_user("alice", "other@example.com")).await;
        assert!(matches!(dup_name, Err(RepositoryError::Conflict(_))));

        let dup_email = repo.create(new_user("bob", "ALICE@example.com")).await;
        assert!(matches!(dup_email, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_pages_and_filters() {
        let repo = InMemoryUserRepository::new();
        for i in 0..5 {
            repo.create(new_user(&format!("user{i}"), &format!("user{i}@example.com")))
                .await
                .unwrap();
        }
        repo.create(new_user("carol", "carol@corp.io")).await.unwrap();

        let (page, total) = repo.list(&UserListQuery::new(1, 2, None)).await.unwrap();
        assert_eq!(total, 6);
        assert_eq!(page.len(), 2);

        let (page, total) = repo
            .list(&UserListQuery::new(1, 10, Some("CORP".into())))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].username, "carol");
    }

    #[tokio::test]
    async fn test_update_missing_user_returns_none() {
        let repo = InMemoryUserRepository::new();
        let updated = repo.update("nope", UserUpdate::default()).await.unwrap();
        assert!(updated.is_none());
    }
}
