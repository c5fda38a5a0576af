//! Gateway configuration: schema plus file discovery and loading.

pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config},
    schema::{AccessConfig, GatewayConfig, WicketConfig},
};
