//! REST API module
//!
//! Exposes health, Prometheus metrics and the controller's broker bindings
//! over HTTP, plus an administrative resync trigger.

mod dto;
mod handlers;
mod server;

pub use server::{router, run_server, ApiState};
