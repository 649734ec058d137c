pub mod admin_handler;
pub mod convert;
pub mod handler;
pub mod server;

pub use admin_handler::RoutingAdminGrpcHandler;
pub use handler::UserGrpcHandler;
pub use server::GrpcServer;
