//! Errors reported by host collaborators

/// Failure reported by the host application
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// Document or surface does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Document already exists at the requested path
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Read/write failure in the document store
    #[error("io error: {0}")]
    Io(String),

    /// Display surface could not be created or manipulated
    #[error("surface error: {0}")]
    Surface(String),

    /// Host is shutting down or otherwise unavailable
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

impl HostError {
    /// Whether the error only says the target was already gone
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
