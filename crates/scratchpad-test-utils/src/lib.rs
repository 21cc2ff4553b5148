//! Testing utilities for Scratchpad workspace
//!
//! In-memory host fakes with fault injection, and a tracing initializer.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use scratchpad_host::{
    ChangeListener, ContentSink, CursorPosition, DocumentHandle, DocumentStore, EditableView,
    HostError, ListenerId, ModificationListener, SurfaceExtractor, SurfaceId, WatchId, Workspace,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Install a fmt subscriber honouring `RUST_LOG`; repeated calls are ignored
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Faults the in-memory store injects on demand
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreFaults {
    pub create: bool,
    pub modify: bool,
    pub delete: bool,
    pub list: bool,
    pub exists: bool,
    pub exists_panics: bool,
}

#[derive(Default)]
struct StoreState {
    docs: BTreeMap<String, String>,
    watches: HashMap<WatchId, (String, ModificationListener)>,
    faults: StoreFaults,
    creates: usize,
    deletes: usize,
    modifies: usize,
}

/// Document store backed by a map
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_faults(&self, faults: StoreFaults) {
        self.state.lock().faults = faults;
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = StoreFaults::default();
    }

    /// Seed a document without going through `create`
    pub fn insert(&self, path: &str, content: &str) {
        self.state
            .lock()
            .docs
            .insert(path.to_string(), content.to_string());
    }

    /// Remove a document behind the core's back
    pub fn remove_externally(&self, path: &str) {
        self.state.lock().docs.remove(path);
    }

    /// Modify a document as the host would, firing watchers
    pub fn modify_externally(&self, path: &str, content: &str) {
        let listeners = {
            let mut state = self.state.lock();
            state.docs.insert(path.to_string(), content.to_string());
            Self::listeners_for(&state, path)
        };
        let doc = DocumentHandle::new(path);
        for listener in listeners {
            listener(&doc);
        }
    }

    #[must_use]
    pub fn content(&self, path: &str) -> Option<String> {
        self.state.lock().docs.get(path).cloned()
    }

    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.state.lock().docs.keys().cloned().collect()
    }

    #[must_use]
    pub fn paths_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .docs
            .keys()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn create_count(&self) -> usize {
        self.state.lock().creates
    }

    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.state.lock().deletes
    }

    #[must_use]
    pub fn modify_count(&self) -> usize {
        self.state.lock().modifies
    }

    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.state.lock().watches.len()
    }

    fn listeners_for(state: &StoreState, path: &str) -> Vec<ModificationListener> {
        state
            .watches
            .values()
            .filter(|(watched, _)| watched == path)
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, path: &str, content: &str) -> Result<DocumentHandle, HostError> {
        let mut state = self.state.lock();
        if state.faults.create {
            return Err(HostError::Io(format!("create refused: {path}")));
        }
        if state.docs.contains_key(path) {
            return Err(HostError::AlreadyExists(path.to_string()));
        }
        state.docs.insert(path.to_string(), content.to_string());
        state.creates += 1;
        Ok(DocumentHandle::new(path))
    }

    async fn read(&self, path: &str) -> Result<String, HostError> {
        self.state
            .lock()
            .docs
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::NotFound(path.to_string()))
    }

    async fn modify(&self, document: &DocumentHandle, content: &str) -> Result<(), HostError> {
        let listeners = {
            let mut state = self.state.lock();
            if state.faults.modify {
                return Err(HostError::Io(format!("modify refused: {document}")));
            }
            match state.docs.get_mut(document.path()) {
                Some(existing) => content.clone_into(existing),
                None => return Err(HostError::NotFound(document.path.clone())),
            }
            state.modifies += 1;
            Self::listeners_for(&state, document.path())
        };
        for listener in listeners {
            listener(document);
        }
        Ok(())
    }

    async fn delete(&self, document: &DocumentHandle) -> Result<(), HostError> {
        let mut state = self.state.lock();
        if state.faults.delete {
            return Err(HostError::Io(format!("delete refused: {document}")));
        }
        if state.docs.remove(document.path()).is_none() {
            return Err(HostError::NotFound(document.path.clone()));
        }
        state.deletes += 1;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, HostError> {
        let state = self.state.lock();
        if state.faults.exists_panics {
            drop(state);
            panic!("store exploded while checking {path}");
        }
        if state.faults.exists {
            return Err(HostError::Unavailable("store offline".to_string()));
        }
        Ok(state.docs.contains_key(path))
    }

    async fn list_files(&self) -> Result<Vec<DocumentHandle>, HostError> {
        let state = self.state.lock();
        if state.faults.list {
            return Err(HostError::Unavailable("listing refused".to_string()));
        }
        Ok(state.docs.keys().map(DocumentHandle::new).collect())
    }

    fn watch(&self, path: &str, listener: ModificationListener) -> WatchId {
        let id = WatchId::new();
        self.state
            .lock()
            .watches
            .insert(id, (path.to_string(), listener));
        id
    }

    fn unwatch(&self, id: WatchId) {
        self.state.lock().watches.remove(&id);
    }
}

/// Text view with observable focus, cursor and listeners
#[derive(Default)]
pub struct MemoryView {
    text: Mutex<String>,
    cursor: Mutex<CursorPosition>,
    focused: AtomicBool,
    listeners: Mutex<HashMap<ListenerId, ChangeListener>>,
    writes: AtomicUsize,
}

impl MemoryView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace text without notifying listeners (document load)
    pub fn load(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }

    /// Simulate the user typing: replaces text and notifies listeners
    pub fn type_text(&self, text: &str) {
        *self.text.lock() = text.to_string();
        self.notify(text);
    }

    #[must_use]
    pub fn cursor(&self) -> CursorPosition {
        *self.cursor.lock()
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Number of `set_text` calls made through the trait
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn notify(&self, text: &str) {
        let listeners: Vec<ChangeListener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(text);
        }
    }
}

impl EditableView for MemoryView {
    fn text(&self) -> String {
        self.text.lock().clone()
    }

    fn set_text(&self, text: &str) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.text.lock() = text.to_string();
        self.notify(text);
    }

    fn focus(&self) {
        self.focused.store(true, Ordering::SeqCst);
    }

    fn set_cursor(&self, position: CursorPosition) {
        *self.cursor.lock() = position;
    }

    fn subscribe_changes(&self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.lock().insert(id, listener);
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.lock().remove(&id);
    }
}

/// Faults the in-memory workspace injects on demand
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspaceFaults {
    pub create_surface: bool,
    pub open_document: bool,
    pub detach: bool,
    pub extract: bool,
    /// Extraction never becomes ready
    pub never_ready: bool,
}

struct SurfaceEntry {
    view: Arc<MemoryView>,
    document: Option<DocumentHandle>,
    pending_polls: u32,
}

#[derive(Default)]
struct WorkspaceState {
    surfaces: HashMap<SurfaceId, SurfaceEntry>,
    faults: WorkspaceFaults,
    ready_after_polls: u32,
    created: usize,
    detached: usize,
}

/// Workspace whose surfaces load content from a [`MemoryStore`]
pub struct MemoryWorkspace {
    store: Arc<MemoryStore>,
    state: Mutex<WorkspaceState>,
}

impl MemoryWorkspace {
    #[must_use]
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            state: Mutex::new(WorkspaceState::default()),
        }
    }

    pub fn set_faults(&self, faults: WorkspaceFaults) {
        self.state.lock().faults = faults;
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = WorkspaceFaults::default();
    }

    /// Surfaces created from now on report "not ready" for `polls` extractions
    pub fn set_ready_after_polls(&self, polls: u32) {
        self.state.lock().ready_after_polls = polls;
    }

    #[must_use]
    pub fn view(&self, surface: SurfaceId) -> Option<Arc<MemoryView>> {
        self.state
            .lock()
            .surfaces
            .get(&surface)
            .map(|entry| Arc::clone(&entry.view))
    }

    #[must_use]
    pub fn document_of(&self, surface: SurfaceId) -> Option<DocumentHandle> {
        self.state
            .lock()
            .surfaces
            .get(&surface)
            .and_then(|entry| entry.document.clone())
    }

    #[must_use]
    pub fn live_surfaces(&self) -> usize {
        self.state.lock().surfaces.len()
    }

    #[must_use]
    pub fn created_count(&self) -> usize {
        self.state.lock().created
    }

    #[must_use]
    pub fn detached_count(&self) -> usize {
        self.state.lock().detached
    }
}

#[async_trait]
impl Workspace for MemoryWorkspace {
    async fn create_offscreen_surface(&self) -> Result<SurfaceId, HostError> {
        let mut state = self.state.lock();
        if state.faults.create_surface {
            return Err(HostError::Surface("surface creation refused".to_string()));
        }
        let id = SurfaceId::new();
        let pending_polls = state.ready_after_polls;
        state.surfaces.insert(
            id,
            SurfaceEntry {
                view: Arc::new(MemoryView::new()),
                document: None,
                pending_polls,
            },
        );
        state.created += 1;
        Ok(id)
    }

    async fn open_document(
        &self,
        surface: SurfaceId,
        document: &DocumentHandle,
    ) -> Result<(), HostError> {
        if self.state.lock().faults.open_document {
            return Err(HostError::Surface(format!("cannot open {document}")));
        }
        let content = self.store.read(document.path()).await?;
        let mut state = self.state.lock();
        let entry = state
            .surfaces
            .get_mut(&surface)
            .ok_or_else(|| HostError::NotFound(surface.to_string()))?;
        entry.view.load(&content);
        entry.document = Some(document.clone());
        Ok(())
    }

    async fn detach(&self, surface: SurfaceId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        if state.faults.detach {
            return Err(HostError::Surface(format!("detach refused: {surface}")));
        }
        if state.surfaces.remove(&surface).is_none() {
            return Err(HostError::NotFound(surface.to_string()));
        }
        state.detached += 1;
        Ok(())
    }
}

impl SurfaceExtractor for MemoryWorkspace {
    fn extract(&self, surface: SurfaceId) -> Result<Option<Arc<dyn EditableView>>, HostError> {
        let mut state = self.state.lock();
        if state.faults.extract {
            return Err(HostError::Surface("extraction failed".to_string()));
        }
        let never_ready = state.faults.never_ready;
        let entry = state
            .surfaces
            .get_mut(&surface)
            .ok_or_else(|| HostError::NotFound(surface.to_string()))?;
        if never_ready {
            return Ok(None);
        }
        if entry.pending_polls > 0 {
            entry.pending_polls -= 1;
            return Ok(None);
        }
        let view: Arc<dyn EditableView> = entry.view.clone();
        Ok(Some(view))
    }
}

/// Content sink that records every commit
#[derive(Default)]
pub struct RecordingSink {
    applied: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn applied(&self) -> Vec<(String, String)> {
        self.applied.lock().clone()
    }

    #[must_use]
    pub fn last_for(&self, key: &str) -> Option<String> {
        self.applied
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, content)| content.clone())
    }
}

impl ContentSink for RecordingSink {
    fn apply(&self, key: &str, content: &str) -> Result<(), HostError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(HostError::Io(format!("content model rejected {key}")));
        }
        self.applied
            .lock()
            .push((key.to_string(), content.to_string()));
        Ok(())
    }
}

/// Store, workspace and sink wired together
pub struct TestHost {
    pub store: Arc<MemoryStore>,
    pub workspace: Arc<MemoryWorkspace>,
    pub sink: Arc<RecordingSink>,
}

impl TestHost {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let workspace = Arc::new(MemoryWorkspace::new(Arc::clone(&store)));
        Self {
            store,
            workspace,
            sink: Arc::new(RecordingSink::new()),
        }
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}
