//! Row types for the launcher's tables.

pub mod execution;
pub mod job;
