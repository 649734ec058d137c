pub mod error;
pub mod model;
pub mod repository;
pub mod security;
pub mod service;

pub use error::DomainError;
pub use model::*;
pub use repository::*;
pub use service::*;
