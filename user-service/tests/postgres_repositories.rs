//! PostgreSQL 仓储测试，需要可用的数据库：
//!
//! DATABASE_URL=postgres://... cargo test -p user-service --test postgres_repositories -- --ignored

use std::path::Path;

use sqlx::PgPool;
use user_service::domain::model::{HealthStatus, NewInstance, NewUser, NewUserClient};
use user_service::domain::repository::{
    RepositoryError, UserClientRepository, UserRepository, VideoServiceInstanceRepository,
};
use user_service::infrastructure::persistence::postgres::{
    Migrator, PostgresInstanceRepository, PostgresUserClientRepository, PostgresUserRepository,
    create_db_pool,
};
use user_service_core::config::PostgresInstanceConfig;
use uuid::Uuid;

async fn migrated_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_db_pool(&PostgresInstanceConfig {
        url,
        max_connections: Some(5),
        ..Default::default()
    })
    .await
    .unwrap();

    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let migrations = Migrator::discover(&dir).unwrap();
    Migrator::new(pool.clone()).run(&migrations).await.unwrap();
    pool
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn instance(name: &str, region: &str, priority: i32) -> NewInstance {
    NewInstance {
        name: name.to_string(),
        server_url: format!("{name}.video.local"),
        server_port: 443,
        use_ssl: true,
        stream_endpoint: "/live".into(),
        region: region.to_string(),
        priority,
        max_capacity: 10,
        health_status: HealthStatus::Healthy,
        allowed_tiers: vec!["free".into()],
        max_bitrate: 4000,
        max_resolution: 1080,
        codec: "h264".into(),
        metadata: serde_json::json!({}),
    }
}

#[tokio::test]
#[ignore]
async fn test_client_id_uniqueness_reports_conflict() {
    let pool = migrated_pool().await;
    let users = PostgresUserRepository::new(pool.clone());
    let clients = PostgresUserClientRepository::new(pool);

    let name = unique("pg-user");
    let user = users
        .create(NewUser {
            username: name.clone(),
            email: format!("{name}@example.com"),
            phone: String::new(),
            password_hash: "salt$hash".into(),
            roles: vec!["user".into()],
            subscription_tier: "free".into(),
            region: "default".into(),
        })
        .await
        .unwrap();

    let client_id = unique("pg-client");
    let new_client = || NewUserClient {
        user_id: user.id.clone(),
        client_id: client_id.clone(),
        client_info: serde_json::json!({}),
        assigned_instance_id: None,
    };
    clients.create(new_client()).await.unwrap();

    let err = clients.create(new_client()).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
}

#[tokio::test]
#[ignore]
async fn test_compare_and_assign_only_wins_once() {
    let pool = migrated_pool().await;
    let users = PostgresUserRepository::new(pool.clone());
    let instances = PostgresInstanceRepository::new(pool.clone());
    let clients = PostgresUserClientRepository::new(pool);

    let name = unique("cas-user");
    let user = users
        .create(NewUser {
            username: name.clone(),
            email: format!("{name}@example.com"),
            phone: String::new(),
            password_hash: "salt$hash".into(),
            roles: vec!["user".into()],
            subscription_tier: "free".into(),
            region: "default".into(),
        })
        .await
        .unwrap();
    let region = unique("region");
    let a = instances.create(instance(&unique("a"), &region, 1)).await.unwrap();
    let b = instances.create(instance(&unique("b"), &region, 1)).await.unwrap();

    let client_id = unique("cas-client");
    clients
        .create(NewUserClient {
            user_id: user.id,
            client_id: client_id.clone(),
            client_info: serde_json::json!({}),
            assigned_instance_id: None,
        })
        .await
        .unwrap();

    assert!(clients.compare_and_assign(&client_id, None, &a.id).await.unwrap());
    assert!(!clients.compare_and_assign(&client_id, None, &b.id).await.unwrap());

    let stored = clients.get_by_client_id(&client_id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_instance_id.as_deref(), Some(a.id.as_str()));
}

#[tokio::test]
#[ignore]
async fn test_region_query_orders_by_priority_then_load() {
    let pool = migrated_pool().await;
    let instances = PostgresInstanceRepository::new(pool);
    let region = unique("region");

    let low = instances.create(instance(&unique("low"), &region, 1)).await.unwrap();
    let busy = instances.create(instance(&unique("busy"), &region, 5)).await.unwrap();
    let idle = instances.create(instance(&unique("idle"), &region, 5)).await.unwrap();
    let full = instances.create(instance(&unique("full"), &region, 9)).await.unwrap();

    instances.update_load(&busy.id, 4).await.unwrap();
    instances.update_load(&idle.id, 1).await.unwrap();
    instances.update_load(&full.id, 10).await.unwrap();

    let ranked = instances
        .query_by_region_and_tier(&region, "free")
        .await
        .unwrap();
    let ids: Vec<_> = ranked.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec![idle.id.as_str(), busy.id.as_str(), low.id.as_str()]);

    assert!(
        instances
            .query_by_region_and_tier(&region, "premium")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[ignore]
async fn test_seeds_apply_once_and_register_instances() {
    let pool = migrated_pool().await;
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("seeds");
    let seeds = Migrator::discover(&dir).unwrap();

    Migrator::seeds(pool.clone()).run(&seeds).await.unwrap();
    let rerun = Migrator::seeds(pool.clone()).run(&seeds).await.unwrap();
    assert!(rerun.is_empty());

    let instances = PostgresInstanceRepository::new(pool);
    let eu = instances.get_by_name("eu-standard").await.unwrap().unwrap();
    assert_eq!(eu.region, "eu");
    assert!(eu.allowed_tiers.contains(&"free".to_string()));
}
