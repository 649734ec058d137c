use std::future::Future;
use std::net::SocketAddr;

use anyhow::Result;
use tonic::transport::Server;
use tonic_reflection::server::Builder;
use tracing::info;
use user_service_proto::FILE_DESCRIPTOR_SET;
use user_service_proto::routing_admin_service_server::RoutingAdminServiceServer;
use user_service_proto::user_service_server::UserServiceServer;

use crate::interface::grpc::admin_handler::RoutingAdminGrpcHandler;
use crate::interface::grpc::handler::UserGrpcHandler;

pub struct GrpcServer {
    user_handler: UserGrpcHandler,
    admin_handler: RoutingAdminGrpcHandler,
    address: SocketAddr,
}

impl GrpcServer {
    pub fn new(
        user_handler: UserGrpcHandler,
        admin_handler: RoutingAdminGrpcHandler,
        address: SocketAddr,
    ) -> Self {
        Self {
            user_handler,
            admin_handler,
            address,
        }
    }

    /// 启动 gRPC 服务（含健康检查与反射），`shutdown` 完成后停止接收请求
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_serving::<UserServiceServer<UserGrpcHandler>>()
            .await;
        health_reporter
            .set_serving::<RoutingAdminServiceServer<RoutingAdminGrpcHandler>>()
            .await;

        let reflection = Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()?;

        info!(address = %self.address, "gRPC server listening");
        Server::builder()
            .add_service(health_service)
            .add_service(reflection)
            .add_service(UserServiceServer::new(self.user_handler.clone()))
            .add_service(RoutingAdminServiceServer::new(self.admin_handler.clone()))
            .serve_with_shutdown(self.address, shutdown)
            .await?;
        Ok(())
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}
