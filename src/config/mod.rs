//! Gateway configuration: types and environment loading.

pub mod env;
pub mod types;

pub use env::{from_env, ConfigError};
pub use types::GatewayConfig;
