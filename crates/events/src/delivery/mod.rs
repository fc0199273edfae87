//! External delivery channels for failure batches and alerts.

pub mod email;
pub mod webhook;
