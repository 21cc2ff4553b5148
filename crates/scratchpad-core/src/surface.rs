//! Editing surface adapter
//!
//! Extracts the editable view from a backing resource's surface and wraps
//! it in an [`EditingContainer`] the caller can embed. The adapter owns the
//! container and the handler references wired onto it; it only holds a weak
//! reference to the view itself, whose lifetime belongs to the host.

use crate::config::SurfaceConfig;
use crate::error::ScratchError;
use crate::types::{CancelHandler, ContainerId, ContentHandler, SessionHandlers};
use parking_lot::Mutex;
use scratchpad_host::{EditableView, Key, KeyChord, ListenerId, SurfaceExtractor, SurfaceId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::time::Instant;

/// What a key press on the container resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Save chord (Ctrl/Cmd+Enter)
    Save,
    /// Escape
    Cancel,
    /// Not bound by the container
    Ignored,
}

#[derive(Default)]
struct Listeners {
    change: Option<ListenerId>,
    on_save: Option<ContentHandler>,
    on_cancel: Option<CancelHandler>,
}

impl Listeners {
    fn count(&self) -> usize {
        usize::from(self.change.is_some())
            + usize::from(self.on_save.is_some())
            + usize::from(self.on_cancel.is_some())
    }
}

struct ContainerInner {
    id: ContainerId,
    surface: SurfaceId,
    view: Weak<dyn EditableView>,
    listeners: Mutex<Listeners>,
    muted: AtomicBool,
    attached: AtomicBool,
}

/// Clears the mute flag on drop, including when the host view panics
struct MuteGuard<'a>(&'a AtomicBool);

impl<'a> MuteGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for MuteGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Caller-visible container holding an extracted editable view
///
/// Cheap to clone; clones share state. Once the adapter unbinds it, every
/// operation becomes a no-op and [`content`](Self::content) returns empty.
#[derive(Clone)]
pub struct EditingContainer {
    inner: Arc<ContainerInner>,
}

impl EditingContainer {
    fn new(surface: SurfaceId, view: &Arc<dyn EditableView>) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                id: ContainerId::new(),
                surface,
                view: Arc::downgrade(view),
                listeners: Mutex::new(Listeners::default()),
                muted: AtomicBool::new(false),
                attached: AtomicBool::new(true),
            }),
        }
    }

    /// Container ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.inner.id
    }

    /// Surface the view was extracted from
    #[inline]
    #[must_use]
    pub fn surface(&self) -> SurfaceId {
        self.inner.surface
    }

    /// Whether the container is still bound and its view alive
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst) && self.inner.view.strong_count() > 0
    }

    fn view(&self) -> Option<Arc<dyn EditableView>> {
        if !self.inner.attached.load(Ordering::SeqCst) {
            return None;
        }
        self.inner.view.upgrade()
    }

    /// Buffer text; empty when detached
    #[must_use]
    pub fn content(&self) -> String {
        self.view().map(|view| view.text()).unwrap_or_default()
    }

    /// Replace buffer text without notifying the change handler
    pub fn set_content(&self, text: &str) {
        let Some(view) = self.view() else {
            return;
        };
        let _muted = MuteGuard::engage(&self.inner.muted);
        view.set_text(text);
    }

    /// Focus the view with the cursor after the last character
    pub fn focus(&self) {
        let Some(view) = self.view() else {
            return;
        };
        view.focus();
        view.set_cursor(view.end_position());
    }

    /// Dispatch a key press to the bound save/cancel handlers
    pub fn handle_key(&self, chord: &KeyChord) -> KeyAction {
        if !self.is_attached() {
            return KeyAction::Ignored;
        }
        match chord.key {
            Key::Escape if !(chord.ctrl || chord.meta || chord.alt) => {
                let handler = self.inner.listeners.lock().on_cancel.clone();
                if let Some(handler) = handler {
                    handler();
                }
                KeyAction::Cancel
            }
            Key::Enter if chord.ctrl || chord.meta => {
                let handler = self.inner.listeners.lock().on_save.clone();
                if let Some(handler) = handler {
                    handler(&self.content());
                }
                KeyAction::Save
            }
            _ => KeyAction::Ignored,
        }
    }

    /// Number of listeners currently wired
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().count()
    }

    fn attach(&self, handlers: &SessionHandlers) -> Result<(), ScratchError> {
        let view = self.view().ok_or(ScratchError::NotBound)?;
        self.remove_listeners(&view);

        let change = handlers.on_change.clone().map(|handler| {
            let container = Arc::downgrade(&self.inner);
            view.subscribe_changes(Arc::new(move |text: &str| {
                let Some(container) = container.upgrade() else {
                    return;
                };
                if container.muted.load(Ordering::SeqCst)
                    || !container.attached.load(Ordering::SeqCst)
                {
                    return;
                }
                handler(text);
            }))
        });

        let mut listeners = self.inner.listeners.lock();
        listeners.change = change;
        listeners.on_save = handlers.on_save.clone();
        listeners.on_cancel = handlers.on_cancel.clone();
        Ok(())
    }

    fn remove_listeners(&self, view: &Arc<dyn EditableView>) {
        let previous = std::mem::take(&mut *self.inner.listeners.lock());
        if let Some(id) = previous.change {
            view.unsubscribe(id);
        }
    }

    fn detach(&self) {
        if let Some(view) = self.view() {
            self.remove_listeners(&view);
        } else {
            *self.inner.listeners.lock() = Listeners::default();
        }
        self.inner.attached.store(false, Ordering::SeqCst);
    }
}

impl PartialEq for EditingContainer {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for EditingContainer {}

impl std::fmt::Debug for EditingContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditingContainer")
            .field("id", &self.inner.id)
            .field("surface", &self.inner.surface)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

/// Point-in-time adapter status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterStatus {
    /// Whether a container is bound
    pub bound: bool,
    /// Bound container
    pub container: Option<ContainerId>,
    /// Surface of the bound container
    pub surface: Option<SurfaceId>,
    /// Whether the host still holds the view
    pub view_alive: bool,
    /// Listeners wired onto the container
    pub listeners: usize,
}

/// Binds host surfaces into editing containers
pub struct EditingSurfaceAdapter {
    extractor: Arc<dyn SurfaceExtractor>,
    config: SurfaceConfig,
    bound: Mutex<Option<EditingContainer>>,
}

impl EditingSurfaceAdapter {
    /// Create adapter
    #[must_use]
    pub fn new(extractor: Arc<dyn SurfaceExtractor>, config: SurfaceConfig) -> Self {
        Self {
            extractor,
            config,
            bound: Mutex::new(None),
        }
    }

    /// Extract the view of `surface` into a new container
    ///
    /// Waits for the surface to finish initializing, polling at the
    /// configured interval up to the ready timeout. A previously bound
    /// container is unbound first.
    ///
    /// # Errors
    /// - `ScratchError::SurfaceNotReady` if no view appeared in time
    pub async fn bind(&self, surface: SurfaceId) -> Result<EditingContainer, ScratchError> {
        if self.unbind() {
            tracing::debug!("unbound previous container before binding");
        }

        let started = Instant::now();
        let timeout = self.config.ready_timeout();
        let view = loop {
            match self.extractor.extract(surface) {
                Ok(Some(view)) => break view,
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(surface = %surface, error = %err, "surface extraction attempt failed");
                }
            }
            let waited = started.elapsed();
            if waited >= timeout {
                let waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
                tracing::error!(surface = %surface, waited_ms, "surface never became ready");
                return Err(ScratchError::SurfaceNotReady { surface, waited_ms });
            }
            tokio::time::sleep(self.config.poll_interval().min(timeout - waited)).await;
        };

        let container = EditingContainer::new(surface, &view);
        tracing::debug!(surface = %surface, container = %container.id(), "surface bound");
        *self.bound.lock() = Some(container.clone());
        Ok(container)
    }

    /// Buffer text of the bound container; empty when unbound
    #[must_use]
    pub fn get_content(&self) -> String {
        self.container()
            .map(|container| container.content())
            .unwrap_or_default()
    }

    /// Replace buffer text of the bound container
    pub fn set_content(&self, text: &str) {
        match self.container() {
            Some(container) => container.set_content(text),
            None => tracing::debug!("set_content ignored: no container bound"),
        }
    }

    /// Focus the bound container, cursor at end of content
    pub fn focus(&self) {
        if let Some(container) = self.container() {
            container.focus();
        }
    }

    /// Wire change/save/cancel handlers onto the bound container
    ///
    /// Replaces any handlers wired earlier.
    ///
    /// # Errors
    /// - `ScratchError::NotBound` if no live container is bound
    pub fn add_event_listeners(&self, handlers: &SessionHandlers) -> Result<(), ScratchError> {
        let container = self.container().ok_or(ScratchError::NotBound)?;
        container.attach(handlers)?;
        tracing::debug!(container = %container.id(), handlers = handlers.count(), "listeners attached");
        Ok(())
    }

    /// Remove listeners and discard the container
    ///
    /// Returns whether a container was bound; calling it unbound is a no-op.
    pub fn unbind(&self) -> bool {
        let Some(container) = self.bound.lock().take() else {
            return false;
        };
        container.detach();
        tracing::debug!(container = %container.id(), "container unbound");
        true
    }

    /// Whether a container is bound
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound.lock().is_some()
    }

    /// Clone of the bound container
    #[must_use]
    pub fn container(&self) -> Option<EditingContainer> {
        self.bound.lock().clone()
    }

    /// Status snapshot
    #[must_use]
    pub fn status(&self) -> AdapterStatus {
        let container = self.container();
        AdapterStatus {
            bound: container.is_some(),
            container: container.as_ref().map(EditingContainer::id),
            surface: container.as_ref().map(EditingContainer::surface),
            view_alive: container.as_ref().is_some_and(EditingContainer::is_attached),
            listeners: container.as_ref().map_or(0, EditingContainer::listener_count),
        }
    }
}

impl std::fmt::Debug for EditingSurfaceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditingSurfaceAdapter")
            .field("config", &self.config)
            .field("bound", &self.container())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scratchpad_host::{ChangeListener, CursorPosition, Workspace};
    use scratchpad_test_utils::{init_tracing, MemoryView, TestHost, WorkspaceFaults};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    async fn surface_with(host: &TestHost, text: &str) -> SurfaceId {
        init_tracing();
        let surface = host.workspace.create_offscreen_surface().await.unwrap();
        host.workspace.view(surface).unwrap().load(text);
        surface
    }

    fn adapter(host: &TestHost) -> EditingSurfaceAdapter {
        EditingSurfaceAdapter::new(host.workspace.clone(), SurfaceConfig::default())
    }

    #[tokio::test]
    async fn bind_exposes_content() {
        let host = TestHost::new();
        let surface = surface_with(&host, "hello").await;
        let adapter = adapter(&host);

        let container = adapter.bind(surface).await.unwrap();
        assert_eq!(container.content(), "hello");
        assert_eq!(adapter.get_content(), "hello");
        assert!(adapter.is_bound());
        assert_eq!(adapter.status().surface, Some(surface));
    }

    #[tokio::test(start_paused = true)]
    async fn bind_waits_for_initialization() {
        let host = TestHost::new();
        host.workspace.set_ready_after_polls(3);
        let surface = surface_with(&host, "late").await;
        let adapter = adapter(&host);

        let container = adapter.bind(surface).await.unwrap();
        assert_eq!(container.content(), "late");
    }

    #[tokio::test(start_paused = true)]
    async fn bind_times_out_when_never_ready() {
        let host = TestHost::new();
        let surface = surface_with(&host, "x").await;
        host.workspace.set_faults(WorkspaceFaults {
            never_ready: true,
            ..WorkspaceFaults::default()
        });
        let adapter = adapter(&host);

        let err = adapter.bind(surface).await.unwrap_err();
        match err {
            ScratchError::SurfaceNotReady { surface: s, waited_ms } => {
                assert_eq!(s, surface);
                assert!(waited_ms >= 2_000);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!adapter.is_bound());
    }

    #[tokio::test]
    async fn unbound_adapter_is_harmless() {
        let host = TestHost::new();
        let adapter = adapter(&host);

        assert_eq!(adapter.get_content(), "");
        adapter.set_content("ignored");
        adapter.focus();
        assert!(!adapter.unbind());
        assert!(matches!(
            adapter.add_event_listeners(&SessionHandlers::new()),
            Err(ScratchError::NotBound)
        ));
    }

    #[tokio::test]
    async fn focus_puts_cursor_at_end() {
        let host = TestHost::new();
        let surface = surface_with(&host, "line one\nline two").await;
        let adapter = adapter(&host);
        adapter.bind(surface).await.unwrap();

        let view = host.workspace.view(surface).unwrap();
        view.set_cursor(CursorPosition { line: 0, ch: 2 });
        adapter.focus();

        assert!(view.is_focused());
        assert_eq!(view.cursor(), CursorPosition { line: 1, ch: 8 });
    }

    #[tokio::test]
    async fn change_handler_sees_user_edits_but_not_programmatic_writes() {
        let host = TestHost::new();
        let surface = surface_with(&host, "").await;
        let adapter = adapter(&host);
        adapter.bind(surface).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        adapter
            .add_event_listeners(
                &SessionHandlers::new().on_change(move |text| sink.lock().push(text.to_string())),
            )
            .unwrap();

        adapter.set_content("from sync");
        host.workspace.view(surface).unwrap().type_text("typed");

        assert_eq!(*seen.lock(), vec!["typed".to_string()]);
        assert_eq!(adapter.get_content(), "typed");
    }

    #[tokio::test]
    async fn key_chords_route_to_handlers() {
        let host = TestHost::new();
        let surface = surface_with(&host, "body").await;
        let adapter = adapter(&host);
        let container = adapter.bind(surface).await.unwrap();

        let saved = Arc::new(Mutex::new(None));
        let cancels = Arc::new(AtomicUsize::new(0));
        let saved_sink = Arc::clone(&saved);
        let cancel_count = Arc::clone(&cancels);
        adapter
            .add_event_listeners(
                &SessionHandlers::new()
                    .on_save(move |text| *saved_sink.lock() = Some(text.to_string()))
                    .on_cancel(move || {
                        cancel_count.fetch_add(1, Ordering::SeqCst);
                    }),
            )
            .unwrap();

        assert_eq!(
            container.handle_key(&KeyChord::plain(Key::Enter).with_ctrl()),
            KeyAction::Save
        );
        assert_eq!(
            container.handle_key(&KeyChord::plain(Key::Enter).with_meta()),
            KeyAction::Save
        );
        assert_eq!(container.handle_key(&KeyChord::plain(Key::Enter)), KeyAction::Ignored);
        assert_eq!(container.handle_key(&KeyChord::plain(Key::Escape)), KeyAction::Cancel);
        assert_eq!(container.handle_key(&KeyChord::plain(Key::Char('a'))), KeyAction::Ignored);

        assert_eq!(saved.lock().as_deref(), Some("body"));
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unbind_removes_listeners_symmetrically() {
        let host = TestHost::new();
        let surface = surface_with(&host, "x").await;
        let adapter = adapter(&host);
        let container = adapter.bind(surface).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        adapter
            .add_event_listeners(&SessionHandlers::new().on_change(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        let view = host.workspace.view(surface).unwrap();
        assert_eq!(view.listener_count(), 1);
        assert_eq!(container.listener_count(), 1);

        assert!(adapter.unbind());
        assert!(!adapter.unbind());
        assert_eq!(view.listener_count(), 0);
        assert!(!container.is_attached());
        assert_eq!(container.content(), "");
        assert_eq!(container.handle_key(&KeyChord::plain(Key::Escape)), KeyAction::Ignored);

        view.type_text("after");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rewiring_replaces_previous_listeners() {
        let host = TestHost::new();
        let surface = surface_with(&host, "x").await;
        let adapter = adapter(&host);
        adapter.bind(surface).await.unwrap();

        adapter
            .add_event_listeners(&SessionHandlers::new().on_change(|_| {}))
            .unwrap();
        adapter
            .add_event_listeners(&SessionHandlers::new().on_change(|_| {}))
            .unwrap();
        assert_eq!(host.workspace.view(surface).unwrap().listener_count(), 1);
    }

    #[tokio::test]
    async fn container_goes_empty_when_host_drops_surface() {
        let host = TestHost::new();
        let surface = surface_with(&host, "x").await;
        let adapter = adapter(&host);
        let container = adapter.bind(surface).await.unwrap();

        host.workspace.detach(surface).await.unwrap();
        assert!(!container.is_attached());
        assert_eq!(adapter.get_content(), "");
        assert!(!adapter.status().view_alive);
    }

    #[tokio::test(start_paused = true)]
    async fn extraction_errors_are_retried_until_timeout() {
        let host = TestHost::new();
        let surface = surface_with(&host, "x").await;
        host.workspace.set_faults(WorkspaceFaults {
            extract: true,
            ..WorkspaceFaults::default()
        });
        let adapter = EditingSurfaceAdapter::new(
            host.workspace.clone(),
            SurfaceConfig {
                ready_timeout_ms: 100,
                poll_interval_ms: 10,
            },
        );

        let started = Instant::now();
        assert!(adapter.bind(surface).await.is_err());
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    /// View whose next `set_text` panics before touching the buffer
    #[derive(Default)]
    struct PanickyView {
        inner: MemoryView,
        panic_next_write: AtomicBool,
    }

    impl EditableView for PanickyView {
        fn text(&self) -> String {
            self.inner.text()
        }

        fn set_text(&self, text: &str) {
            if self.panic_next_write.swap(false, Ordering::SeqCst) {
                panic!("host view rejected write");
            }
            self.inner.set_text(text);
        }

        fn focus(&self) {
            self.inner.focus();
        }

        fn set_cursor(&self, position: CursorPosition) {
            self.inner.set_cursor(position);
        }

        fn subscribe_changes(&self, listener: ChangeListener) -> ListenerId {
            self.inner.subscribe_changes(listener)
        }

        fn unsubscribe(&self, id: ListenerId) {
            self.inner.unsubscribe(id);
        }
    }

    #[test]
    fn panicking_write_does_not_leave_changes_muted() {
        init_tracing();
        let panicky = Arc::new(PanickyView::default());
        let view: Arc<dyn EditableView> = panicky.clone();
        let container = EditingContainer::new(SurfaceId::new(), &view);
        let changes = Arc::new(AtomicUsize::new(0));
        let handlers = {
            let changes = changes.clone();
            SessionHandlers::new().on_change(move |_| {
                changes.fetch_add(1, Ordering::SeqCst);
            })
        };
        container.attach(&handlers).unwrap();

        panicky.panic_next_write.store(true, Ordering::SeqCst);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            container.set_content("lost");
        }));
        assert!(outcome.is_err());

        panicky.inner.type_text("typed after failure");
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        container.set_content("programmatic");
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }
}
