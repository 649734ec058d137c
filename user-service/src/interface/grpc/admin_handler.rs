//! 视频服务实例管理接口

use std::sync::Arc;

use tonic::{Request, Response, Status};
use user_service_proto::routing_admin_service_server::RoutingAdminService;
use user_service_proto::{
    AssignInstanceToClientRequest, DeregisterInstanceRequest, DeregisterInstanceResponse,
    ListInstancesRequest, ListInstancesResponse, RegisterInstanceRequest, ReleaseClientRequest,
    ReleaseClientResponse, UpdateInstanceHealthRequest, UpdateInstanceLoadRequest, UserClient,
    VideoServiceInstance,
};

use crate::application::commands::{
    AssignInstanceCommand, DeregisterInstanceCommand, RegisterInstanceCommand,
    ReleaseClientCommand, UpdateInstanceHealthCommand, UpdateInstanceLoadCommand,
};
use crate::application::handlers::{RoutingCommandHandler, RoutingQueryHandler};
use crate::application::queries::ListInstancesQuery;
use crate::interface::grpc::convert::{
    client_to_proto, instance_to_proto, new_instance_from_proto, parse_health_status,
};

#[derive(Clone)]
pub struct RoutingAdminGrpcHandler {
    command_handler: Arc<RoutingCommandHandler>,
    query_handler: Arc<RoutingQueryHandler>,
}

impl RoutingAdminGrpcHandler {
    pub fn new(
        command_handler: Arc<RoutingCommandHandler>,
        query_handler: Arc<RoutingQueryHandler>,
    ) -> Self {
        Self {
            command_handler,
            query_handler,
        }
    }
}

#[tonic::async_trait]
impl RoutingAdminService for RoutingAdminGrpcHandler {
    async fn register_instance(
        &self,
        request: Request<RegisterInstanceRequest>,
    ) -> Result<Response<VideoServiceInstance>, Status> {
        let instance = new_instance_from_proto(request.into_inner())?;
        let created = self
            .command_handler
            .handle_register_instance(RegisterInstanceCommand { instance })
            .await?;
        Ok(Response::new(instance_to_proto(&created)))
    }

    async fn list_instances(
        &self,
        request: Request<ListInstancesRequest>,
    ) -> Result<Response<ListInstancesResponse>, Status> {
        let req = request.into_inner();
        let instances = self
            .query_handler
            .handle_list_instances(ListInstancesQuery {
                region: Some(req.region),
            })
            .await?;
        Ok(Response::new(ListInstancesResponse {
            instances: instances.iter().map(instance_to_proto).collect(),
        }))
    }

    async fn update_instance_load(
        &self,
        request: Request<UpdateInstanceLoadRequest>,
    ) -> Result<Response<VideoServiceInstance>, Status> {
        let req = request.into_inner();
        let instance = self
            .command_handler
            .handle_update_instance_load(UpdateInstanceLoadCommand {
                instance_id: req.instance_id,
                load: req.current_load,
            })
            .await?;
        Ok(Response::new(instance_to_proto(&instance)))
    }

    async fn update_instance_health(
        &self,
        request: Request<UpdateInstanceHealthRequest>,
    ) -> Result<Response<VideoServiceInstance>, Status> {
        let req = request.into_inner();
        let status = parse_health_status(&req.health_status)?;
        let instance = self
            .command_handler
            .handle_update_instance_health(UpdateInstanceHealthCommand {
                instance_id: req.instance_id,
                status,
            })
            .await?;
        Ok(Response::new(instance_to_proto(&instance)))
    }

    async fn deregister_instance(
        &self,
        request: Request<DeregisterInstanceRequest>,
    ) -> Result<Response<DeregisterInstanceResponse>, Status> {
        let req = request.into_inner();
        self.command_handler
            .handle_deregister_instance(DeregisterInstanceCommand {
                instance_id: req.instance_id,
            })
            .await?;
        Ok(Response::new(DeregisterInstanceResponse { success: true }))
    }

    async fn assign_instance_to_client(
        &self,
        request: Request<AssignInstanceToClientRequest>,
    ) -> Result<Response<UserClient>, Status> {
        let req = request.into_inner();
        let client = self
            .command_handler
            .handle_assign_instance(AssignInstanceCommand {
                client_id: req.client_id,
                instance_id: req.instance_id,
            })
            .await?;
        Ok(Response::new(client_to_proto(&client)))
    }

    async fn release_client(
        &self,
        request: Request<ReleaseClientRequest>,
    ) -> Result<Response<ReleaseClientResponse>, Status> {
        let req = request.into_inner();
        let released = self
            .command_handler
            .handle_release_client(ReleaseClientCommand {
                client_id: req.client_id,
            })
            .await?;
        Ok(Response::new(ReleaseClientResponse { released }))
    }
}
