pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
pub mod types;

pub use error::{set_expose_stacks, ApiError};
pub use router::build_router;
pub use types::AppState;
