//! Operator notification for the launcher.
//!
//! [`FailureNotifier`] implements the engine's
//! [`Notifier`](fleetline_core::ports::Notifier) trait on top of two
//! delivery channels, SMTP email and an HTTP webhook. Either may be left
//! unconfigured.

pub mod config;
pub mod delivery;
pub mod format;
pub mod notifier;
pub mod throttle;

pub use config::NotifyConfig;
pub use notifier::FailureNotifier;
