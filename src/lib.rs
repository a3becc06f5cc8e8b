pub mod api;
pub mod attendance;
pub mod config;
pub mod db;
pub mod directory;
pub mod roles;

pub use api::{build_router, AppState};
pub use config::Config;
