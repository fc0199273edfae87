pub mod dispatcher;
pub mod outcome;
pub mod reconciler;
pub mod scheduler;
pub mod streaks;
pub mod sync;
