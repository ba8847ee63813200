//! MeshSync controller: keeps a service-management platform in sync with the
//! MeshSync agents running in its Kubernetes clusters.
//!
//! The controller binds each Kubernetes context to the message broker
//! advertised by the Meshery operator, persists the discovery events MeshSync
//! publishes, streams MeshSync status to subscribers and fans operator health
//! out on a broadcast bus.

pub mod broadcast;
pub mod broker;
pub mod controller;
pub mod crd;
pub mod error;
pub mod liveness;
pub mod model;
pub mod operator;
pub mod persist;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
