//! Core types for Scratchpad
//!
//! Identifiers, strategy selection, caller handlers and operation results.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ulid::Ulid;

/// Caller-supplied identifier naming which logical edit a session belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CorrelationKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique backing resource identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub Ulid);

impl ResourceId {
    /// Generate new resource ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique editing container identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub Ulid);

impl ContainerId {
    /// Generate new container ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backing resource strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Create on acquire, delete on release
    Ephemeral,
    /// One long-lived document, content reset between uses
    #[default]
    Persistent,
}

impl StrategyKind {
    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Ephemeral => "ephemeral",
            StrategyKind::Persistent => "persistent",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler receiving the buffer text
pub type ContentHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Handler without payload
pub type CancelHandler = Arc<dyn Fn() + Send + Sync>;

/// Caller callbacks wired onto an editing container
#[derive(Clone, Default)]
pub struct SessionHandlers {
    /// Buffer changed by the user
    pub on_change: Option<ContentHandler>,
    /// Save chord (Ctrl/Cmd+Enter) pressed
    pub on_save: Option<ContentHandler>,
    /// Escape pressed
    pub on_cancel: Option<CancelHandler>,
}

impl SessionHandlers {
    /// No handlers
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With change handler
    #[must_use]
    pub fn on_change(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(handler));
        self
    }

    /// With save handler
    #[must_use]
    pub fn on_save(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_save = Some(Arc::new(handler));
        self
    }

    /// With cancel handler
    #[must_use]
    pub fn on_cancel(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_cancel = Some(Arc::new(handler));
        self
    }

    /// Number of handlers set
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        usize::from(self.on_change.is_some())
            + usize::from(self.on_save.is_some())
            + usize::from(self.on_cancel.is_some())
    }
}

impl std::fmt::Debug for SessionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandlers")
            .field("on_change", &self.on_change.is_some())
            .field("on_save", &self.on_save.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .finish()
    }
}

/// Result of releasing a session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    /// Final buffer content, present when changes were saved
    pub content: Option<String>,
    /// Whether every teardown step completed cleanly
    pub success: bool,
}

impl ReleaseOutcome {
    /// Nothing to release
    #[inline]
    #[must_use]
    pub fn noop() -> Self {
        Self {
            content: None,
            success: true,
        }
    }
}

/// Operation categories tracked by the performance ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Session creation
    CreateSession,
    /// Session release
    ReleaseSession,
    /// Content sync
    SyncContent,
    /// Exception recovery
    Recovery,
}

impl OperationKind {
    /// Snake-case name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateSession => "create_session",
            OperationKind::ReleaseSession => "release_session",
            OperationKind::SyncContent => "sync_content",
            OperationKind::Recovery => "recovery",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
