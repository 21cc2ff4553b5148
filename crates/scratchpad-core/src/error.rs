//! Error types for Scratchpad Core
//!
//! Only the creation path surfaces errors to callers:
//! - Backing document/surface creation failures
//! - Surface extraction timeouts
//!
//! Teardown, sync and health failures are recovered internally; the
//! variants below still name them so they can be logged and reported.

use scratchpad_host::{HostError, SurfaceId};

/// Main scratchpad error type
#[derive(Debug, thiserror::Error)]
pub enum ScratchError {
    /// Backing document or surface could not be created
    #[error("resource creation failed during {stage}: {source}")]
    ResourceCreationFailed {
        /// Step that failed
        stage: &'static str,
        /// Host failure
        #[source]
        source: HostError,
    },

    /// Surface initialization did not settle in time
    #[error("surface {surface} not ready after {waited_ms}ms")]
    SurfaceNotReady {
        /// Surface being extracted
        surface: SurfaceId,
        /// Time spent waiting
        waited_ms: u64,
    },

    /// Release/sync referenced a key that is not the active session
    #[error("stale session operation for '{requested}' (active: {active:?})")]
    StaleSessionOperation {
        /// Key supplied by the caller
        requested: String,
        /// Key currently active, if any
        active: Option<String>,
    },

    /// Teardown step failed
    #[error("cleanup failed during {stage}: {source}")]
    CleanupFailure {
        /// Step that failed
        stage: &'static str,
        /// Host failure
        #[source]
        source: HostError,
    },

    /// Health evaluation failed
    #[error("health check failed: {0}")]
    HealthCheckFailure(String),

    /// Session could not be entered
    #[error("could not start editing '{key}': {source}")]
    SessionCreationFailed {
        /// Correlation key of the failed session
        key: String,
        /// Underlying cause
        #[source]
        source: Box<ScratchError>,
    },

    /// Adapter has no bound container
    #[error("no editing container is bound")]
    NotBound,

    /// Pool used after disposal
    #[error("scratch resource pool has been disposed")]
    Disposed,
}

impl ScratchError {
    /// Check if error came from the creation path
    #[inline]
    #[must_use]
    pub fn is_creation_failure(&self) -> bool {
        match self {
            Self::ResourceCreationFailed { .. } | Self::SurfaceNotReady { .. } => true,
            Self::SessionCreationFailed { source, .. } => source.is_creation_failure(),
            _ => false,
        }
    }

    /// Check if the system stays usable after this error without recovery
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Disposed | Self::HealthCheckFailure(_))
    }

    /// Wrap as a session creation failure for `key`
    #[inline]
    pub fn for_session(self, key: impl Into<String>) -> Self {
        match self {
            already @ Self::SessionCreationFailed { .. } => already,
            other => Self::SessionCreationFailed {
                key: key.into(),
                source: Box::new(other),
            },
        }
    }

    /// Human-readable cause shown to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::SessionCreationFailed { source, .. } => source.user_message(),
            Self::ResourceCreationFailed { .. } => {
                "The scratch document for editing could not be created.".to_string()
            }
            Self::SurfaceNotReady { .. } => {
                "The editor took too long to start. Please try again.".to_string()
            }
            Self::Disposed => "The editor has been shut down.".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_error_display() {
        let err = ScratchError::ResourceCreationFailed {
            stage: "create document",
            source: HostError::Io("disk full".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "resource creation failed during create document: io error: disk full"
        );
    }

    #[test]
    fn scratch_error_creation_classification() {
        let surface = ScratchError::SurfaceNotReady {
            surface: SurfaceId::new(),
            waited_ms: 2000,
        };
        assert!(surface.is_creation_failure());

        let stale = ScratchError::StaleSessionOperation {
            requested: "ghost".to_string(),
            active: None,
        };
        assert!(!stale.is_creation_failure());
        assert!(stale.is_recoverable());
        assert!(!ScratchError::Disposed.is_recoverable());
    }

    #[test]
    fn for_session_wraps_once() {
        let err = ScratchError::NotBound.for_session("n1").for_session("n2");
        match err {
            ScratchError::SessionCreationFailed { key, source } => {
                assert_eq!(key, "n1");
                assert!(matches!(*source, ScratchError::NotBound));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn user_message_unwraps_session_failure() {
        let err = ScratchError::SurfaceNotReady {
            surface: SurfaceId::new(),
            waited_ms: 10,
        }
        .for_session("n1");
        assert!(err.user_message().contains("too long"));
        assert!(err.is_creation_failure());
    }
}
