//! 领域模型与 protobuf 消息之间的转换

use tonic::Status;
use user_service_core::datetime_to_timestamp;
use user_service_proto as pb;

use crate::domain::model::{
    HealthStatus, NewInstance, StreamingConfig, User, UserClient, UserUpdate,
    VideoServiceInstance,
};

pub fn user_to_proto(user: &User) -> pb::User {
    pb::User {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        phone: user.phone.clone(),
        status: user.status.clone(),
        is_active: user.is_active,
        roles: user.roles.clone(),
        subscription_tier: user.subscription_tier.clone(),
        region: user.region.clone(),
        created_at: Some(datetime_to_timestamp(user.created_at)),
        updated_at: Some(datetime_to_timestamp(user.updated_at)),
        last_login: user.last_login.map(datetime_to_timestamp),
    }
}

pub fn streaming_config_to_proto(config: StreamingConfig) -> pb::StreamingConfig {
    pb::StreamingConfig {
        server_url: config.server_url,
        server_port: config.server_port,
        use_ssl: config.use_ssl,
        api_key: config.api_key,
        stream_endpoint: config.stream_endpoint,
        max_bitrate: config.max_bitrate,
        max_resolution: config.max_resolution,
        codec: config.codec,
    }
}

pub fn instance_to_proto(instance: &VideoServiceInstance) -> pb::VideoServiceInstance {
    pb::VideoServiceInstance {
        id: instance.id.clone(),
        name: instance.name.clone(),
        server_url: instance.server_url.clone(),
        server_port: instance.server_port,
        use_ssl: instance.use_ssl,
        stream_endpoint: instance.stream_endpoint.clone(),
        region: instance.region.clone(),
        priority: instance.priority,
        max_capacity: instance.max_capacity,
        current_load: instance.current_load,
        health_status: instance.health_status.as_str().to_string(),
        allowed_tiers: instance.allowed_tiers.clone(),
        max_bitrate: instance.max_bitrate,
        max_resolution: instance.max_resolution,
        codec: instance.codec.clone(),
        is_active: instance.is_active,
    }
}

pub fn client_to_proto(client: &UserClient) -> pb::UserClient {
    pb::UserClient {
        id: client.id.clone(),
        user_id: client.user_id.clone(),
        client_id: client.client_id.clone(),
        assigned_instance_id: client.assigned_instance_id.clone(),
        is_active: client.is_active,
        last_seen: Some(datetime_to_timestamp(client.last_seen)),
    }
}

pub fn parse_health_status(value: &str) -> Result<HealthStatus, Status> {
    value.parse::<HealthStatus>().map_err(Status::invalid_argument)
}

pub fn new_instance_from_proto(req: pb::RegisterInstanceRequest) -> Result<NewInstance, Status> {
    Ok(NewInstance {
        health_status: parse_health_status(&req.health_status)?,
        name: req.name,
        server_url: req.server_url,
        server_port: req.server_port,
        use_ssl: req.use_ssl,
        stream_endpoint: req.stream_endpoint,
        region: req.region,
        priority: req.priority,
        max_capacity: req.max_capacity,
        allowed_tiers: req.allowed_tiers,
        max_bitrate: req.max_bitrate,
        max_resolution: req.max_resolution,
        codec: req.codec,
        metadata: serde_json::Value::Object(Default::default()),
    })
}

/// 构建部分更新；roles 为空且未设置 replace_roles 时不修改角色
pub fn user_update_from_proto(req: &pb::UpdateUserRequest) -> UserUpdate {
    let roles = if req.replace_roles || !req.roles.is_empty() {
        Some(req.roles.clone())
    } else {
        None
    };

    UserUpdate {
        email: req.email.clone(),
        phone: req.phone.clone(),
        status: req.status.clone(),
        is_active: req.is_active,
        roles,
        subscription_tier: req.subscription_tier.clone(),
        region: req.region.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_untouched_unless_present_or_replaced() {
        let req = pb::UpdateUserRequest {
            id: "u1".into(),
            email: Some("new@example.com".into()),
            ..Default::default()
        };
        let update = user_update_from_proto(&req);
        assert!(update.roles.is_none());
        assert_eq!(update.email.as_deref(), Some("new@example.com"));

        let clear = pb::UpdateUserRequest {
            id: "u1".into(),
            replace_roles: true,
            ..Default::default()
        };
        assert_eq!(user_update_from_proto(&clear).roles, Some(vec![]));
    }

    #[test]
    fn test_register_request_rejects_unknown_health() {
        let req = pb::RegisterInstanceRequest {
            name: "edge-1".into(),
            health_status: "degraded".into(),
            ..Default::default()
        };
        let err = new_instance_from_proto(req).unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
