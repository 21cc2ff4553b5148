//! Editable text views and the external content model

use crate::error::HostError;
use crate::types::{ChangeListener, CursorPosition, ListenerId};

/// Text-editing view hosted inside a display surface
pub trait EditableView: Send + Sync {
    /// Current buffer text
    fn text(&self) -> String;

    /// Replace buffer text
    fn set_text(&self, text: &str);

    /// Give keyboard focus to the view
    fn focus(&self);

    /// Move the cursor
    fn set_cursor(&self, position: CursorPosition);

    /// Position after the last character
    fn end_position(&self) -> CursorPosition {
        CursorPosition::end_of(&self.text())
    }

    /// Subscribe to content changes
    fn subscribe_changes(&self, listener: ChangeListener) -> ListenerId;

    /// Remove a change subscription; unknown ids are ignored
    fn unsubscribe(&self, id: ListenerId);
}

/// External content model that edits are committed to (e.g. a canvas node)
pub trait ContentSink: Send + Sync {
    /// Store `content` as the current value for `key`
    fn apply(&self, key: &str, content: &str) -> Result<(), HostError>;
}
