//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod candidate_repo;
pub mod execution_repo;
pub mod reference_repo;

pub use candidate_repo::CandidateRepo;
pub use execution_repo::ExecutionRepo;
pub use reference_repo::{AutomationRepo, TargetRepo};
