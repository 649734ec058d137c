pub mod instance;
pub mod streaming_config;
pub mod user;
pub mod user_client;

pub use instance::{HealthStatus, NewInstance, VideoServiceInstance};
pub use streaming_config::StreamingConfig;
pub use user::{NewUser, User, UserListQuery, UserUpdate};
pub use user_client::{NewUserClient, UserClient};
