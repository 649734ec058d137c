use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use user_service_core::ErrorCode;

use crate::application::commands::{
    CreateUserCommand, DeleteUserCommand, LoginCommand, LogoutCommand,
    ResolveStreamingConfigCommand, UpdateUserCommand,
};
use crate::application::queries::{GetUserQuery, ListUsersQuery, ValidateTokenQuery};
use crate::domain::model::{StreamingConfig, User, UserUpdate};
use crate::interface::http::HttpState;
use crate::interface::http::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub subscription_tier: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserBody {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
    pub is_active: Option<bool>,
    pub roles: Option<Vec<String>>,
    pub subscription_tier: Option<String>,
    pub region: Option<String>,
}

impl From<UpdateUserBody> for UserUpdate {
    fn from(body: UpdateUserBody) -> Self {
        UserUpdate {
            email: body.email,
            phone: body.phone,
            status: body.status,
            is_active: body.is_active,
            roles: body.roles,
            subscription_tier: body.subscription_tier,
            region: body.region,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersParams {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub limit: i64,
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<User>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Default, Deserialize)]
struct TokenBody {
    #[serde(default)]
    token: String,
}

#[derive(Serialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct StreamingConfigParams {
    #[serde(default)]
    pub client_id: String,
}

/// 令牌取自 JSON 体 `{ "token" }`，缺省时取 `Authorization: Bearer`
fn extract_token(headers: &HeaderMap, body: &Bytes) -> Result<Option<String>, ApiError> {
    if !body.is_empty() {
        let parsed: TokenBody = serde_json::from_slice(body)
            .map_err(|e| ApiError::new(ErrorCode::InvalidParameter, e.to_string()))?;
        if !parsed.token.trim().is_empty() {
            return Ok(Some(parsed.token.trim().to_string()));
        }
    }

    Ok(headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty()))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn metrics(State(state): State<HttpState>) -> Result<impl IntoResponse, ApiError> {
    let body = user_service_core::metrics::gather_text(&state.registry)
        .map_err(|e| ApiError::new(ErrorCode::InternalError, e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

pub async fn list_users(
    State(state): State<HttpState>,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<ListUsersResponse>, ApiError> {
    let (users, total, page, limit) = state
        .user_queries
        .handle_list_users(ListUsersQuery {
            page: params.page,
            limit: params.limit,
            filter: params.filter,
        })
        .await?;
    Ok(Json(ListUsersResponse {
        users,
        total,
        page,
        limit,
    }))
}

pub async fn create_user(
    State(state): State<HttpState>,
    Json(body): Json<CreateUserBody>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .user_commands
        .handle_create_user(CreateUserCommand {
            username: body.username,
            email: body.email,
            phone: body.phone,
            password: body.password,
            roles: body.roles,
            subscription_tier: body.subscription_tier,
            region: body.region,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<HttpState>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .user_queries
        .handle_get_user(GetUserQuery { user_id })
        .await?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<HttpState>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateUserBody>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .user_commands
        .handle_update_user(UpdateUserCommand {
            user_id,
            update: body.into(),
        })
        .await?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<HttpState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .user_commands
        .handle_delete_user(DeleteUserCommand { user_id })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn login(
    State(state): State<HttpState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (issued, user) = state
        .user_commands
        .handle_login(LoginCommand {
            username: body.username,
            password: body.password,
        })
        .await?;
    Ok(Json(LoginResponse {
        expires_at: DateTime::from_timestamp(issued.claims.exp, 0),
        token: issued.token,
        user,
    }))
}

pub async fn validate_token(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ValidateTokenResponse>, ApiError> {
    let token = extract_token(&headers, &body)?.unwrap_or_default();
    let validation = state
        .user_queries
        .handle_validate_token(ValidateTokenQuery { token })
        .await?;
    Ok(Json(ValidateTokenResponse {
        valid: validation.valid,
        user: validation.user,
    }))
}

pub async fn logout(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let token = extract_token(&headers, &body)?
        .ok_or_else(|| ApiError::unauthenticated("token is required"))?;
    state
        .user_commands
        .handle_logout(LogoutCommand { token })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn streaming_config(
    State(state): State<HttpState>,
    Path(user_id): Path<String>,
    Query(params): Query<StreamingConfigParams>,
) -> Result<Json<StreamingConfig>, ApiError> {
    let (_, config) = state
        .routing_commands
        .handle_resolve_streaming_config(ResolveStreamingConfigCommand {
            user_id,
            client_id: params.client_id,
        })
        .await?;
    Ok(Json(config))
}
