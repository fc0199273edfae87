//! Domain types for the launch and reconciliation engine.
//!
//! This crate has no internal dependencies so it can be shared by the
//! store, fleet client, notification and launcher crates alike:
//!
//! - [`status`]: the execution status vocabulary and remote mapping.
//! - [`pause_window`]: the time-of-day blackout window.
//! - [`execution`]: jobs, execution records and remote status snapshots.
//! - [`ports`]: the collaborator traits the engine is written against.
//! - [`config`]: environment parsing helpers for the per-crate configs.

pub mod config;
pub mod error;
pub mod execution;
pub mod pause_window;
pub mod ports;
pub mod remote_time;
pub mod status;
pub mod types;
