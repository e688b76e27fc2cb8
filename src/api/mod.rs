//! API layer - HTTP surface and request pipeline

pub mod error;
pub mod health;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use router::{build_router, PipelineError};
pub use state::AppState;
