//! HTTP surface for vidgen.
//!
//! Axum routes driving the orchestrator: create/status/segments/cancel/
//! delete, storyboard passthroughs, system status and range-enabled
//! artifact delivery.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
