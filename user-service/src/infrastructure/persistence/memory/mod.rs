//! 内存仓储实现，用于本地开发与测试

pub mod instance_repository;
pub mod token_revocation_repository;
pub mod user_client_repository;
pub mod user_repository;

pub use instance_repository::InMemoryInstanceRepository;
pub use token_revocation_repository::InMemoryTokenRevocationRepository;
pub use user_client_repository::InMemoryUserClientRepository;
pub use user_repository::InMemoryUserRepository;
