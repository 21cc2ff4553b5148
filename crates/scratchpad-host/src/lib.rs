//! Scratchpad Host - capability boundary
//!
//! The scratchpad core never reaches into host internals. Everything it
//! needs from the surrounding application is expressed here as a narrow
//! trait:
//! - [`DocumentStore`]: create/read/modify/delete/list scratch documents
//! - [`Workspace`]: off-screen display surfaces bound to documents
//! - [`SurfaceExtractor`]: pull the editable view out of a surface
//! - [`EditableView`]: the text buffer behind a surface
//! - [`ContentSink`]: the external content model edits are committed to

#![warn(unreachable_pub)]

pub mod error;
pub mod store;
pub mod types;
pub mod view;
pub mod workspace;

pub use error::HostError;
pub use store::{DocumentStore, ModificationListener};
pub use types::{
    ChangeListener, CursorPosition, DocumentHandle, Key, KeyChord, ListenerId, SurfaceId,
    WatchId,
};
pub use view::{ContentSink, EditableView};
pub use workspace::{SurfaceExtractor, Workspace};
