/// Errors crossing the collaborator boundary.
///
/// Adapters flatten their own error types into one of these variants so
/// the engine can classify failures without knowing the backing protocol.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Job store error: {0}")]
    Store(String),

    #[error("Remote fleet error: {0}")]
    Remote(String),

    #[error("Notification error: {0}")]
    Notify(String),
}
