pub mod bootstrap;
pub mod metrics;
pub mod wire;

pub use bootstrap::{ApplicationBootstrap, ListenOverrides};
