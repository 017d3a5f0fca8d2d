pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ServerConfig;

pub use adapters::{FleetClient, FleetEndpoint};
pub use core::{engine::ServerEngine, listener::PlayerListener, process::GameProcess};
pub use utils::error::{Result, ServerError};
