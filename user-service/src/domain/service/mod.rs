pub mod auth_domain_service;
pub mod routing_domain_service;
pub mod user_domain_service;

pub use auth_domain_service::{AuthDomainService, TokenValidation};
pub use routing_domain_service::{
    Assignment, AssignmentOutcome, RoutingDomainService, RoutingPolicy, Selection,
    SelectionSource,
};
pub use user_domain_service::{CreateUserInput, UserDomainService};
