//! The launch and reconciliation engine.
//!
//! [`engine::dispatcher::LaunchDispatcher`] deploys eligible jobs,
//! [`engine::reconciler::Reconciler`] keeps execution records in line with
//! the fleet and [`engine::sync::SyncCycle`] refreshes reference data. The
//! [`engine::scheduler::CycleScheduler`] drives all three until the
//! [`shutdown::ShutdownCoordinator`] stops it.

pub mod config;
pub mod engine;
pub mod shutdown;

pub use config::LauncherConfig;
pub use engine::dispatcher::LaunchDispatcher;
pub use engine::reconciler::Reconciler;
pub use engine::scheduler::CycleScheduler;
pub use engine::sync::SyncCycle;
pub use shutdown::{LifecycleState, ShutdownCoordinator};
