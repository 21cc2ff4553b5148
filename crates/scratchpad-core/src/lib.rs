//! Scratchpad Core - exclusive scratch-document coordinator
//!
//! Lets a host edit one piece of external content at a time inside a
//! real editing surface backed by a temporary document:
//! - Owns the single backing document/surface pair (ephemeral or persistent)
//! - Extracts the editable view and wires change/save/cancel handlers
//! - Ties sessions to correlation keys, superseding on conflict
//! - Grades health and repairs inconsistent state
//!
//! # Example
//!
//! ```rust,ignore
//! use scratchpad_core::prelude::*;
//!
//! # async fn example(host: HostServices) -> Result<(), ScratchError> {
//! let editor = InplaceEditor::new(host, EditorConfig::new());
//!
//! let handlers = SessionHandlers::new().on_save(|text| println!("saved: {text}"));
//! editor.create_session("node-1", "# Draft", handlers).await?;
//!
//! let outcome = editor.release_session("node-1", true).await;
//! println!("final content: {:?}", outcome.content);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod editor;
pub mod error;
pub mod health;
pub mod ledger;
pub mod pool;
pub mod session;
pub mod surface;
pub mod types;

pub use config::{EditorConfig, HealthConfig, PoolConfig, SurfaceConfig};
pub use editor::{EditorStatus, HostServices, InplaceEditor};
pub use error::ScratchError;
pub use health::{HealthIssue, HealthMonitor, HealthSnapshot, IssueCategory, Severity};
pub use ledger::{KindSummary, OperationSample, PerformanceLedger, PerformanceSummary};
pub use pool::{BackingResource, ResourceStatus, ScratchResourcePool};
pub use session::{CoordinatorSnapshot, SessionCoordinator, SessionStatus, StateFingerprint};
pub use surface::{AdapterStatus, EditingContainer, EditingSurfaceAdapter, KeyAction};
pub use types::{
    CancelHandler, ContainerId, ContentHandler, CorrelationKey, OperationKind, ReleaseOutcome,
    ResourceId, SessionHandlers, StrategyKind,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the editor
    pub use crate::{
        EditingContainer, EditorConfig, HostServices, InplaceEditor, ReleaseOutcome,
        ScratchError, SessionHandlers, StrategyKind,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
