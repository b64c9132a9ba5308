//! # Trellis API
//!
//! The external surface of the orchestration core:
//! - **routes**: workflow CRUD, activation, manual/test runs, run history,
//!   schedule translation for the editor UI
//! - **sse**: the live status push stream with heartbeats
//! - **server**: axum server wiring
//!
//! Every definition mutation publishes the matching lifecycle notification
//! so connected UIs stay current without polling.

pub mod routes;
pub mod server;
pub mod sse;
pub mod state;

pub use server::{ApiConfig, ApiServer};
pub use state::{AppState, StaticConnections};
