pub mod engine;
pub mod listener;
pub mod process;

pub use crate::domain::model::{GameSession, GameSessionUpdate, ProcessParameters};
pub use crate::domain::ports::{ConfigProvider, SessionBackend, SessionHandler};
pub use crate::utils::error::Result;
pub use engine::ServerEngine;
pub use listener::PlayerListener;
pub use process::{GameProcess, Shutdown};
