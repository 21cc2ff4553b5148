//! Handle types shared between the host and the scratchpad core
//!
//! Every handle is a plain value: cloning one never aliases host state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ulid::Ulid;

/// Callback invoked with the full buffer text after a content change
pub type ChangeListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle to a document in the host store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentHandle {
    /// Store-relative path
    pub path: String,
}

impl DocumentHandle {
    /// Create handle for path
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Store-relative path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Unique display surface identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub Ulid);

impl SurfaceId {
    /// Generate new surface ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change subscription on an editable view
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub Ulid);

impl ListenerId {
    /// Generate new listener ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Modification watch on a store path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WatchId(pub Ulid);

impl WatchId {
    /// Generate new watch ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for WatchId {
    fn default() -> Self {
        Self::new()
    }
}

/// Zero-based cursor position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct CursorPosition {
    /// Line index
    pub line: usize,
    /// Character offset within the line
    pub ch: usize,
}

impl CursorPosition {
    /// Position after the last character of `text`
    #[must_use]
    pub fn end_of(text: &str) -> Self {
        let line = text.matches('\n').count();
        let ch = text.rsplit('\n').next().map_or(0, |last| last.chars().count());
        Self { line, ch }
    }
}

/// Keys the scratchpad binds on an editing container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Escape
    Escape,
    /// Enter / Return
    Enter,
    /// Tab
    Tab,
    /// Printable character
    Char(char),
}

/// Key press with modifier state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyChord {
    /// Pressed key
    pub key: Key,
    /// Control held
    pub ctrl: bool,
    /// Command / Meta held
    pub meta: bool,
    /// Shift held
    pub shift: bool,
    /// Alt / Option held
    pub alt: bool,
}

impl KeyChord {
    /// Bare key without modifiers
    #[inline]
    #[must_use]
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            shift: false,
            alt: false,
        }
    }

    /// With Control held
    #[inline]
    #[must_use]
    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    /// With Command / Meta held
    #[inline]
    #[must_use]
    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// With Shift held
    #[inline]
    #[must_use]
    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}
