//! Host document store
//!
//! Scratch documents live in the same store as the user's own documents;
//! the core only ever touches paths under its configured scratch directory.

use crate::error::HostError;
use crate::types::{DocumentHandle, WatchId};
use async_trait::async_trait;
use std::sync::Arc;

/// Callback invoked after the host modifies a watched document
pub type ModificationListener = Arc<dyn Fn(&DocumentHandle) + Send + Sync>;

/// Document storage provided by the host
///
/// Every async operation resolves (success or error) in bounded
/// host-provided time; the core applies no timeout of its own.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document; fails with [`HostError::AlreadyExists`] if `path` is taken
    async fn create(&self, path: &str, content: &str) -> Result<DocumentHandle, HostError>;

    /// Read full document content
    async fn read(&self, path: &str) -> Result<String, HostError>;

    /// Replace document content
    async fn modify(&self, document: &DocumentHandle, content: &str) -> Result<(), HostError>;

    /// Delete (or trash) a document
    async fn delete(&self, document: &DocumentHandle) -> Result<(), HostError>;

    /// Whether a document exists at `path`
    async fn exists(&self, path: &str) -> Result<bool, HostError>;

    /// Enumerate every document in the store
    async fn list_files(&self) -> Result<Vec<DocumentHandle>, HostError>;

    /// Listen for modifications of `path`
    fn watch(&self, path: &str, listener: ModificationListener) -> WatchId;

    /// Stop a watch; unknown ids are ignored
    fn unwatch(&self, id: WatchId);
}
