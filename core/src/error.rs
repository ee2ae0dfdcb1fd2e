use thiserror::Error;

/// Failure of a record store mutation.
///
/// The `Display` text is exactly what the store records as its current
/// error message, so screens can show either one.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Failed to {action}")]
    Persist {
        action: String,
        #[source]
        source: anyhow::Error,
    },
}

impl StoreError {
    #[must_use]
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, StoreError::NotAuthenticated)
    }
}
