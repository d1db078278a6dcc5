//! REST API server module.
//!
//! Provides HTTP endpoints to drive each pipeline stage directly, to run
//! the queue and the reaper, and to inspect candidates.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
