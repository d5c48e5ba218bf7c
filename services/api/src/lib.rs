//! HTTP boundary of the Swap exchange
//!
//! Routes, authentication, configuration and the scheduled expiry job. The
//! binary in `main.rs` wires these together.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
