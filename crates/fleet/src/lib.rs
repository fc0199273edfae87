//! HTTP client for the remote execution fleet.
//!
//! [`FleetApi`] wraps the control-room REST endpoints (authentication,
//! deploy, activity lookup and reference listings) with a cached session
//! token. [`FleetClient`] adapts it to the engine's
//! [`RemoteFleet`](fleetline_core::ports::RemoteFleet) trait, adding batch
//! chunking and retriability classification.

pub mod api;
pub mod classify;
pub mod client;
pub mod config;
pub mod messages;

pub use api::{FleetApi, FleetApiError};
pub use client::FleetClient;
pub use config::FleetConfig;
