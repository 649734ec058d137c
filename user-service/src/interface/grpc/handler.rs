use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::debug;
use user_service_core::datetime_to_timestamp;
use user_service_proto::user_service_server::UserService;
use user_service_proto::{
    CreateUserRequest, DeleteUserRequest, DeleteUserResponse, GetStreamingConfigRequest,
    GetUserByClientIdRequest, GetUserByClientIdResponse, GetUserByUsernameRequest,
    GetUserRequest, ListUsersRequest, ListUsersResponse, LoginRequest, LoginResponse,
    LogoutRequest, LogoutResponse, StreamingConfig, UpdateUserRequest, User,
    ValidateTokenRequest, ValidateTokenResponse,
};

use crate::application::commands::{
    CreateUserCommand, DeleteUserCommand, LoginCommand, LogoutCommand,
    ResolveStreamingConfigCommand, UpdateUserCommand,
};
use crate::application::handlers::{RoutingCommandHandler, UserCommandHandler, UserQueryHandler};
use crate::application::queries::{
    GetUserByClientIdQuery, GetUserByUsernameQuery, GetUserQuery, ListUsersQuery,
    ValidateTokenQuery,
};
use crate::interface::grpc::convert::{streaming_config_to_proto, user_to_proto, user_update_from_proto};

#[derive(Clone)]
pub struct UserGrpcHandler {
    command_handler: Arc<UserCommandHandler>,
    query_handler: Arc<UserQueryHandler>,
    routing_handler: Arc<RoutingCommandHandler>,
}

impl UserGrpcHandler {
    pub fn new(
        command_handler: Arc<UserCommandHandler>,
        query_handler: Arc<UserQueryHandler>,
        routing_handler: Arc<RoutingCommandHandler>,
    ) -> Self {
        Self {
            command_handler,
            query_handler,
            routing_handler,
        }
    }
}

/// 取请求体中的令牌，缺省时读取 `authorization: Bearer <token>` 元数据
fn bearer_token<T>(request: &Request<T>, body_token: &str) -> Option<String> {
    if !body_token.trim().is_empty() {
        return Some(body_token.trim().to_string());
    }
    request
        .metadata()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[tonic::async_trait]
impl UserService for UserGrpcHandler {
    async fn get_user(&self, request: Request<GetUserRequest>) -> Result<Response<User>, Status> {
        let req = request.into_inner();
        let user = self
            .query_handler
            .handle_get_user(GetUserQuery { user_id: req.id })
            .await?;
        Ok(Response::new(user_to_proto(&user)))
    }

    async fn get_user_by_username(
        &self,
        request: Request<GetUserByUsernameRequest>,
    ) -> Result<Response<User>, Status> {
        let req = request.into_inner();
        let user = self
            .query_handler
            .handle_get_user_by_username(GetUserByUsernameQuery {
                username: req.username,
            })
            .await?;
        Ok(Response::new(user_to_proto(&user)))
    }

    async fn get_user_by_client_id(
        &self,
        request: Request<GetUserByClientIdRequest>,
    ) -> Result<Response<GetUserByClientIdResponse>, Status> {
        let req = request.into_inner();
        let (user, client) = self
            .query_handler
            .handle_get_user_by_client_id(GetUserByClientIdQuery {
                client_id: req.client_id,
            })
            .await?;
        Ok(Response::new(GetUserByClientIdResponse {
            user: Some(user_to_proto(&user)),
            client_id: client.client_id,
        }))
    }

    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<User>, Status> {
        let req = request.into_inner();
        let user = self
            .command_handler
            .handle_create_user(CreateUserCommand {
                username: req.username,
                email: req.email,
                phone: req.phone,
                password: req.password,
                roles: req.roles,
                subscription_tier: Some(req.subscription_tier).filter(|t| !t.is_empty()),
                region: Some(req.region).filter(|r| !r.is_empty()),
            })
            .await?;
        Ok(Response::new(user_to_proto(&user)))
    }

    async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<User>, Status> {
        let req = request.into_inner();
        let update = user_update_from_proto(&req);
        let user = self
            .command_handler
            .handle_update_user(UpdateUserCommand {
                user_id: req.id,
                update,
            })
            .await?;
        Ok(Response::new(user_to_proto(&user)))
    }

    async fn delete_user(
        &self,
        request: Request<DeleteUserRequest>,
    ) -> Result<Response<DeleteUserResponse>, Status> {
        let req = request.into_inner();
        self.command_handler
            .handle_delete_user(DeleteUserCommand { user_id: req.id })
            .await?;
        Ok(Response::new(DeleteUserResponse { success: true }))
    }

    async fn list_users(
        &self,
        request: Request<ListUsersRequest>,
    ) -> Result<Response<ListUsersResponse>, Status> {
        let req = request.into_inner();
        let (users, total, page, limit) = self
            .query_handler
            .handle_list_users(ListUsersQuery {
                page: req.page as i64,
                limit: req.limit as i64,
                filter: Some(req.filter),
            })
            .await?;

        Ok(Response::new(ListUsersResponse {
            users: users.iter().map(user_to_proto).collect(),
            total,
            page: page as i32,
            limit: limit as i32,
        }))
    }

    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        let (issued, user) = self
            .command_handler
            .handle_login(LoginCommand {
                username: req.username,
                password: req.password,
            })
            .await?;

        let expires_at = chrono::DateTime::from_timestamp(issued.claims.exp, 0)
            .map(datetime_to_timestamp);
        Ok(Response::new(LoginResponse {
            token: issued.token,
            user: Some(user_to_proto(&user)),
            expires_at,
        }))
    }

    async fn validate_token(
        &self,
        request: Request<ValidateTokenRequest>,
    ) -> Result<Response<ValidateTokenResponse>, Status> {
        let token = bearer_token(&request, &request.get_ref().token).unwrap_or_default();
        let validation = self
            .query_handler
            .handle_validate_token(ValidateTokenQuery { token })
            .await?;
        Ok(Response::new(ValidateTokenResponse {
            valid: validation.valid,
            user: validation.user.as_ref().map(user_to_proto),
        }))
    }

    async fn logout(
        &self,
        request: Request<LogoutRequest>,
    ) -> Result<Response<LogoutResponse>, Status> {
        let token = bearer_token(&request, &request.get_ref().token)
            .ok_or_else(|| Status::unauthenticated("token is required"))?;
        self.command_handler
            .handle_logout(LogoutCommand { token })
            .await?;
        Ok(Response::new(LogoutResponse { success: true }))
    }

    async fn get_streaming_config(
        &self,
        request: Request<GetStreamingConfigRequest>,
    ) -> Result<Response<StreamingConfig>, Status> {
        let req = request.into_inner();
        let (assignment, config) = self
            .routing_handler
            .handle_resolve_streaming_config(ResolveStreamingConfigCommand {
                user_id: req.user_id,
                client_id: req.client_id,
            })
            .await?;

        debug!(
            instance_id = %assignment.instance.id,
            outcome = assignment.outcome.as_str(),
            "Streaming config served over gRPC"
        );
        Ok(Response::new(streaming_config_to_proto(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_prefers_body_then_metadata() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("authorization", "Bearer abc.def".parse().unwrap());

        assert_eq!(bearer_token(&request, "body-token").as_deref(), Some("body-token"));
        assert_eq!(bearer_token(&request, "").as_deref(), Some("abc.def"));
        assert_eq!(bearer_token(&Request::new(()), " "), None);
    }
}
