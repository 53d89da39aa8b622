//! API layer - health, readiness and metrics endpoints

pub mod health;
pub mod router;
pub mod state;

pub use router::{create_router, create_router_with_state};
pub use state::AppState;
