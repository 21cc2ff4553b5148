//! Host workspace: display surfaces and the views inside them

use crate::error::HostError;
use crate::types::{DocumentHandle, SurfaceId};
use crate::view::EditableView;
use async_trait::async_trait;
use std::sync::Arc;

/// Display surface management provided by the host
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Create a surface that is never shown in the host's own layout
    async fn create_offscreen_surface(&self) -> Result<SurfaceId, HostError>;

    /// Open `document` inside `surface`
    async fn open_document(
        &self,
        surface: SurfaceId,
        document: &DocumentHandle,
    ) -> Result<(), HostError>;

    /// Detach and destroy a surface
    async fn detach(&self, surface: SurfaceId) -> Result<(), HostError>;
}

/// Pulls the editable view out of a host surface
///
/// The host keeps ownership of the returned view for as long as the surface
/// lives; callers are expected to hold only weak references to it.
pub trait SurfaceExtractor: Send + Sync {
    /// Extract the view, or `Ok(None)` while the surface is still initializing
    fn extract(&self, surface: SurfaceId) -> Result<Option<Arc<dyn EditableView>>, HostError>;
}
