use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::repository::{RepositoryResult, TokenRevocationRepository};

/// 已吊销令牌（jti → 过期时间），过期记录在写入时清理
#[derive(Default)]
pub struct InMemoryTokenRevocationRepository {
    revoked: DashMap<String, DateTime<Utc>>,
}

impl InMemoryTokenRevocationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(&self, now: DateTime<Utc>) {
        self.revoked.retain(|_, expires_at| *expires_at > now);
    }
}

#[async_trait]
impl TokenRevocationRepository for InMemoryTokenRevocationRepository {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> RepositoryResult<()> {
        self.purge_expired(Utc::now());
        self.revoked.insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> RepositoryResult<bool> {
        Ok(self
            .revoked
            .get(jti)
            .is_some_and(|expires_at| *expires_at > Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_revoked_until_expiry() {
        let repo = InMemoryTokenRevocationRepository::new();
        repo.revoke("live", Utc::now() + Duration::hours(1)).await.unwrap();
        repo.revoke("stale", Utc::now() - Duration::seconds(1)).await.unwrap();

        assert!(repo.is_revoked("live").await.unwrap());
        assert!(!repo.is_revoked("stale").await.unwrap());
        assert!(!repo.is_revoked("unknown").await.unwrap());
    }
}
