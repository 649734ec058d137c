//! HTTP/JSON 网关
//!
//! 与 gRPC 接口共用应用层处理器：
//! - GET /health, GET /metrics
//! - GET|POST /api/v1/users, GET|PUT|DELETE /api/v1/users/{id}
//! - POST /api/v1/auth/login|validate|logout
//! - GET /api/v1/users/{id}/streaming-config?client_id=...

pub mod error;
pub mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use prometheus::Registry;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::application::handlers::{RoutingCommandHandler, UserCommandHandler, UserQueryHandler};

#[derive(Clone)]
pub struct HttpState {
    pub user_commands: Arc<UserCommandHandler>,
    pub user_queries: Arc<UserQueryHandler>,
    pub routing_commands: Arc<RoutingCommandHandler>,
    pub registry: Registry,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/api/v1/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/api/v1/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route(
            "/api/v1/users/{id}/streaming-config",
            get(handlers::streaming_config),
        )
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/auth/validate", post(handlers::validate_token))
        .route("/api/v1/auth/logout", post(handlers::logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct HttpServer {
    state: HttpState,
    address: SocketAddr,
}

impl HttpServer {
    pub fn new(state: HttpState, address: SocketAddr) -> Self {
        Self { state, address }
    }

    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.address)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {}", self.address))?;

        info!(address = %self.address, "HTTP gateway listening");
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP gateway failed")?;
        Ok(())
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::UserServiceSettings;
    use crate::domain::model::{HealthStatus, NewInstance};
    use crate::domain::repository::VideoServiceInstanceRepository;
    use crate::service::wire::{Repositories, build_context};

    async fn setup() -> (Router, Repositories) {
        let repos = Repositories::in_memory();
        let ctx = build_context(
            &UserServiceSettings::default(),
            repos.clone(),
            &Registry::new(),
        )
        .unwrap();
        (router(ctx.http_state), repos)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = setup().await;
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_user_crud_and_error_body() {
        let (app, _) = setup().await;

        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/users",
            Some(json!({"username": "alice", "email": "alice@example.com", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created.get("password_hash").is_none());
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) = send(&app, "GET", &format!("/api/v1/users/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["subscription_tier"], "free");

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/v1/users/{id}"),
            Some(json!({"subscription_tier": "premium"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["subscription_tier"], "premium");

        let (status, listed) = send(&app, "GET", "/api/v1/users?limit=500", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["total"], 1);
        assert_eq!(listed["limit"], 100);

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/users/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, err) = send(&app, "GET", &format!("/api/v1/users/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_streaming_config_and_unavailable() {
        let (app, repos) = setup().await;
        let (_, user) = send(
            &app,
            "POST",
            "/api/v1/users",
            Some(json!({"username": "bob", "email": "bob@example.com", "password": "pw", "region": "eu"})),
        )
        .await;
        let user_id = user["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/users/{user_id}/streaming-config?client_id=c-1");

        let (status, err) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err["code"], "SERVICE_UNAVAILABLE");

        repos
            .instances
            .create(NewInstance {
                name: "eu-1".into(),
                server_url: "eu-1.video.local".into(),
                server_port: 443,
                use_ssl: true,
                stream_endpoint: "/live".into(),
                region: "eu".into(),
                priority: 1,
                max_capacity: 10,
                health_status: HealthStatus::Healthy,
                allowed_tiers: vec!["free".into()],
                max_bitrate: 4000,
                max_resolution: 1080,
                codec: "h264".into(),
                metadata: json!({}),
            })
            .await
            .unwrap();

        let (status, config) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(config["server_url"], "eu-1.video.local");
        assert!(config["api_key"].as_str().unwrap().starts_with("vsk_"));
    }

    #[tokio::test]
    async fn test_login_validate_logout() {
        let (app, _) = setup().await;
        send(
            &app,
            "POST",
            "/api/v1/users",
            Some(json!({"username": "carol", "email": "carol@example.com", "password": "s3cret"})),
        )
        .await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            Some(json!({"username": "carol", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, login) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            Some(json!({"username": "carol", "password": "s3cret"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = login["token"].as_str().unwrap().to_string();

        let (_, validation) = send(
            &app,
            "POST",
            "/api/v1/auth/validate",
            Some(json!({"token": token})),
        )
        .await;
        assert_eq!(validation["valid"], true);
        assert_eq!(validation["user"]["username"], "carol");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/logout")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let (_, validation) = send(
            &app,
            "POST",
            "/api/v1/auth/validate",
            Some(json!({"token": token})),
        )
        .await;
        assert_eq!(validation["valid"], false);
    }
}
