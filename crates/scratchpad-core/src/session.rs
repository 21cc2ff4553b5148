//! Session coordinator
//!
//! Ties one correlation key to the backing resource and bound container.
//! At most one session is active; creating a new one releases the old one
//! first, saving its content.
//!
//! Every public operation takes the coordinator's operation lock, so
//! create/release/sync/recover never interleave.

use crate::error::ScratchError;
use crate::pool::{BackingResource, ResourceStatus, ScratchResourcePool};
use crate::surface::{AdapterStatus, EditingContainer, EditingSurfaceAdapter};
use crate::types::{ContainerId, CorrelationKey, ReleaseOutcome, ResourceId, SessionHandlers};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use scratchpad_host::{ContentSink, HostError};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct ActiveSession {
    key: CorrelationKey,
    started_at: Instant,
    started_wall: DateTime<Utc>,
    container: EditingContainer,
    last_synced: String,
}

/// Point-in-time coordinator status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Key of the active session
    pub active_key: Option<CorrelationKey>,
    /// When the active session started
    pub started_at: Option<DateTime<Utc>>,
    /// Time since the active session started
    pub age: Option<Duration>,
    /// Buffer differs from the last content pushed or synced
    pub dirty: bool,
    /// Adapter state
    pub adapter: AdapterStatus,
}

/// Identity of the coordinator's state at one instant
///
/// Two fingerprints are equal when the same session holds the same
/// resource in the same way. Fixes computed from an older observation are
/// only applied while the fingerprint still matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFingerprint {
    active_key: Option<CorrelationKey>,
    container: Option<ContainerId>,
    resource: Option<ResourceId>,
    in_use: bool,
}

impl StateFingerprint {
    /// Key of the session that was active
    #[must_use]
    pub fn active_key(&self) -> Option<&CorrelationKey> {
        self.active_key.as_ref()
    }
}

/// Pool and session state read together under the operation lock
#[derive(Debug)]
pub struct CoordinatorSnapshot {
    /// Pool state
    pub resource: ResourceStatus,
    /// Session state
    pub session: SessionStatus,
    /// Disagreement between session and adapter
    pub violation: Option<String>,
    /// Whether the tracked document is still in the store
    pub document_present: Result<bool, HostError>,
    /// State identity
    pub fingerprint: StateFingerprint,
}

/// Coordinates the pool and the adapter on behalf of callers
pub struct SessionCoordinator {
    pool: ScratchResourcePool,
    adapter: EditingSurfaceAdapter,
    sink: Option<Arc<dyn ContentSink>>,
    state: Mutex<Option<ActiveSession>>,
    ops: tokio::sync::Mutex<()>,
}

impl SessionCoordinator {
    /// Create coordinator
    ///
    /// `sink` receives saved and synced content keyed by correlation key.
    #[must_use]
    pub fn new(
        pool: ScratchResourcePool,
        adapter: EditingSurfaceAdapter,
        sink: Option<Arc<dyn ContentSink>>,
    ) -> Self {
        Self {
            pool,
            adapter,
            sink,
            state: Mutex::new(None),
            ops: tokio::sync::Mutex::new(()),
        }
    }

    /// Underlying resource pool
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ScratchResourcePool {
        &self.pool
    }

    /// Underlying surface adapter
    #[inline]
    #[must_use]
    pub fn adapter(&self) -> &EditingSurfaceAdapter {
        &self.adapter
    }

    /// Enter an editing session for `key`
    ///
    /// Releases (and saves) any active session first. On failure every
    /// partially acquired piece is released again and the coordinator is
    /// left idle.
    ///
    /// # Errors
    /// - `ScratchError::SessionCreationFailed` wrapping the pool or adapter
    ///   failure
    pub async fn create_session(
        &self,
        key: impl Into<CorrelationKey>,
        content: &str,
        handlers: SessionHandlers,
    ) -> Result<EditingContainer, ScratchError> {
        let key = key.into();
        let _ops = self.ops.lock().await;

        if let Some(previous) = self.active_key() {
            tracing::info!(previous = %previous, next = %key, "superseding active session");
            self.release_active(true).await;
        }

        self.enter(&key, content, &handlers)
            .await
            .map_err(|err| err.for_session(key.as_str()))
    }

    async fn enter(
        &self,
        key: &CorrelationKey,
        content: &str,
        handlers: &SessionHandlers,
    ) -> Result<EditingContainer, ScratchError> {
        let resource = self.pool.acquire(content).await?;

        let container = match self.adapter.bind(resource.surface).await {
            Ok(container) => container,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "binding failed, releasing resource");
                self.pool.release(None).await;
                return Err(err);
            }
        };

        if container.content() != content {
            container.set_content(content);
        }

        if let Err(err) = self.adapter.add_event_listeners(handlers) {
            tracing::warn!(key = %key, error = %err, "wiring handlers failed, releasing resource");
            self.adapter.unbind();
            self.pool.release(None).await;
            return Err(err);
        }
        self.adapter.focus();

        *self.state.lock() = Some(ActiveSession {
            key: key.clone(),
            started_at: Instant::now(),
            started_wall: Utc::now(),
            container: container.clone(),
            last_synced: content.to_string(),
        });
        tracing::info!(
            key = %key,
            document = %resource.document,
            container = %container.id(),
            "session started"
        );
        Ok(container)
    }

    /// Leave the session for `key`
    ///
    /// A key that is not the active session is ignored and yields a no-op
    /// outcome. Otherwise the coordinator always ends idle, even when a
    /// teardown step fails; `success` reports whether every step was clean.
    pub async fn release_session(&self, key: &str, save: bool) -> ReleaseOutcome {
        let _ops = self.ops.lock().await;

        if let Err(stale) = self.check_active(key) {
            tracing::debug!(error = %stale, "release ignored");
            return ReleaseOutcome::noop();
        }

        let outcome = self.release_active(save).await;
        tracing::info!(key, save, success = outcome.success, "session released");
        outcome
    }

    /// Push externally changed `content` into the active session
    ///
    /// Only writes when the buffer differs. Returns `false` for a stale key,
    /// whose content is dropped.
    pub async fn sync_content(&self, key: &str, content: &str) -> bool {
        let _ops = self.ops.lock().await;

        if let Err(stale) = self.check_active(key) {
            tracing::warn!(error = %stale, "sync ignored");
            return false;
        }

        if self.adapter.get_content() != content {
            self.adapter.set_content(content);
            self.apply_to_sink(key, content);
        }
        self.pool.touch();
        if let Some(session) = self.state.lock().as_mut() {
            session.last_synced = content.to_string();
        }
        true
    }

    /// Abandon the active session and scrub every scratch resource
    ///
    /// Content is not saved. Never fails.
    pub async fn recover_from_exception(&self) -> usize {
        let _ops = self.ops.lock().await;
        self.recover_locked().await
    }

    /// Run exception recovery if the state still matches `expected`
    ///
    /// Returns `None` without touching anything when the state moved on.
    pub async fn recover_if_unchanged(&self, expected: &StateFingerprint) -> Option<usize> {
        let _ops = self.ops.lock().await;
        if !self.unchanged_since(expected) {
            return None;
        }
        Some(self.recover_locked().await)
    }

    /// Release the session recorded in `expected` if it is still active and
    /// nothing else changed
    pub async fn release_if_unchanged(
        &self,
        expected: &StateFingerprint,
        save: bool,
    ) -> Option<ReleaseOutcome> {
        let _ops = self.ops.lock().await;
        let key = expected.active_key.as_ref()?;
        if !self.unchanged_since(expected) {
            return None;
        }
        let outcome = self.release_active(save).await;
        tracing::info!(key = %key, save, success = outcome.success, "session released");
        Some(outcome)
    }

    /// Scrub the pool if it is still idle of sessions and unchanged
    pub async fn scrub_if_unchanged(&self, expected: &StateFingerprint) -> Option<usize> {
        let _ops = self.ops.lock().await;
        if expected.active_key.is_some() || !self.unchanged_since(expected) {
            return None;
        }
        Some(self.pool.force_recover().await)
    }

    /// Caller must hold `ops`
    async fn recover_locked(&self) -> usize {
        if let Some(session) = self.state.lock().take() {
            tracing::warn!(key = %session.key, "abandoning session during recovery");
        }
        self.adapter.unbind();
        self.pool.release(None).await;
        let removed = self.pool.force_recover().await;
        tracing::info!(removed, "exception recovery complete");
        removed
    }

    /// Release the active session without saving and dispose the pool
    pub async fn destroy(&self) {
        let _ops = self.ops.lock().await;
        self.release_active(false).await;
        self.pool.dispose().await;
        tracing::debug!("session coordinator destroyed");
    }

    /// Read pool and session state without interleaving any operation
    ///
    /// Waits for an in-flight create/release/sync to finish first.
    pub async fn snapshot(&self) -> CoordinatorSnapshot {
        let _ops = self.ops.lock().await;
        let resource = self.pool.status();
        let session = self.status();
        let violation = self.consistency_violation();
        let fingerprint = self.fingerprint();
        let document_present = self.pool.verify().await;
        CoordinatorSnapshot {
            resource,
            session,
            violation,
            document_present,
            fingerprint,
        }
    }

    /// Identity of the current state
    #[must_use]
    pub fn fingerprint(&self) -> StateFingerprint {
        let resource = self.pool.current();
        let state = self.state.lock();
        StateFingerprint {
            active_key: state.as_ref().map(|s| s.key.clone()),
            container: state.as_ref().map(|s| s.container.id()),
            resource: resource.as_ref().map(|r| r.id),
            in_use: resource.as_ref().is_some_and(BackingResource::is_in_use),
        }
    }

    /// Key of the active session
    #[must_use]
    pub fn active_key(&self) -> Option<CorrelationKey> {
        self.state.lock().as_ref().map(|s| s.key.clone())
    }

    /// Whether a session is active
    #[must_use]
    pub fn has_active_session(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Status snapshot
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let now = Instant::now();
        let (active_key, started_at, age, last_synced) = match self.state.lock().as_ref() {
            Some(s) => (
                Some(s.key.clone()),
                Some(s.started_wall),
                Some(now.saturating_duration_since(s.started_at)),
                Some(s.last_synced.clone()),
            ),
            None => (None, None, None, None),
        };
        let dirty = match last_synced {
            Some(synced) => self.guarded_content().is_some_and(|current| current != synced),
            None => false,
        };

        SessionStatus {
            active_key,
            started_at,
            age,
            dirty,
            adapter: self.adapter.status(),
        }
    }

    /// Describe a disagreement between session state and adapter state
    #[must_use]
    pub fn consistency_violation(&self) -> Option<String> {
        let session_container = self.state.lock().as_ref().map(|s| s.container.id());
        let bound = self.adapter.container().map(|c| c.id());

        match (session_container, bound) {
            (Some(_), None) => Some("session is active but no container is bound".to_string()),
            (None, Some(id)) => Some(format!("container {id} is bound without an active session")),
            (Some(expected), Some(actual)) if expected != actual => Some(format!(
                "session container {expected} differs from bound container {actual}"
            )),
            _ => None,
        }
    }

    fn unchanged_since(&self, expected: &StateFingerprint) -> bool {
        let current = self.fingerprint();
        if current == *expected {
            return true;
        }
        tracing::debug!(?expected, ?current, "state changed since it was observed");
        false
    }

    fn check_active(&self, key: &str) -> Result<(), ScratchError> {
        let active = self.active_key();
        if active.as_ref().is_some_and(|k| k.as_str() == key) {
            return Ok(());
        }
        Err(ScratchError::StaleSessionOperation {
            requested: key.to_string(),
            active: active.map(|k| k.to_string()),
        })
    }

    /// Caller must hold `ops`
    async fn release_active(&self, save: bool) -> ReleaseOutcome {
        let Some(session) = self.state.lock().take() else {
            return ReleaseOutcome::noop();
        };

        let mut success = true;
        let content = if save {
            let content = self.guarded_content().unwrap_or_else(|| {
                success = false;
                String::new()
            });
            success &= self.apply_to_sink(session.key.as_str(), &content);
            Some(content)
        } else {
            None
        };

        self.adapter.unbind();
        success &= self.pool.release(None).await;

        ReleaseOutcome { content, success }
    }

    /// Buffer text, `None` if the host view panicked while reading it
    fn guarded_content(&self) -> Option<String> {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.adapter.get_content())) {
            Ok(content) => Some(content),
            Err(_) => {
                tracing::error!("reading buffer content panicked");
                None
            }
        }
    }

    fn apply_to_sink(&self, key: &str, content: &str) -> bool {
        let Some(sink) = &self.sink else {
            return true;
        };
        match sink.apply(key, content) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key, error = %err, "content sink rejected update");
                false
            }
        }
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("active_key", &self.active_key())
            .field("pool", &self.pool.strategy())
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolConfig, SurfaceConfig};
    use crate::types::StrategyKind;
    use pretty_assertions::assert_eq;
    use scratchpad_host::{Key, KeyChord};
    use scratchpad_test_utils::{init_tracing, StoreFaults, TestHost, WorkspaceFaults};

    fn coordinator(host: &TestHost, strategy: StrategyKind) -> SessionCoordinator {
        init_tracing();
        let pool = ScratchResourcePool::new(
            host.store.clone(),
            host.workspace.clone(),
            strategy,
            PoolConfig::default(),
        );
        let adapter = EditingSurfaceAdapter::new(host.workspace.clone(), SurfaceConfig::default());
        SessionCoordinator::new(pool, adapter, Some(host.sink.clone()))
    }

    #[tokio::test]
    async fn create_then_release_with_save() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Ephemeral);

        let container = coordinator
            .create_session("n1", "hello", SessionHandlers::new())
            .await
            .unwrap();
        assert_eq!(container.content(), "hello");
        assert_eq!(coordinator.active_key(), Some("n1".into()));
        assert!(coordinator.pool().is_in_use());

        let view = host.workspace.view(container.surface()).unwrap();
        assert!(view.is_focused());
        view.type_text("hello world");

        let outcome = coordinator.release_session("n1", true).await;
        assert_eq!(outcome.content.as_deref(), Some("hello world"));
        assert!(outcome.success);
        assert_eq!(host.sink.last_for("n1").as_deref(), Some("hello world"));
        assert!(!coordinator.has_active_session());
        assert!(host.store.paths().is_empty());
    }

    #[tokio::test]
    async fn release_without_save_skips_sink() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Persistent);

        coordinator
            .create_session("n1", "draft", SessionHandlers::new())
            .await
            .unwrap();
        let outcome = coordinator.release_session("n1", false).await;

        assert_eq!(outcome, ReleaseOutcome { content: None, success: true });
        assert!(host.sink.applied().is_empty());
        assert!(!coordinator.pool().is_in_use());
    }

    #[tokio::test]
    async fn stale_release_is_noop() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Persistent);

        assert_eq!(coordinator.release_session("ghost", true).await, ReleaseOutcome::noop());

        coordinator
            .create_session("n1", "text", SessionHandlers::new())
            .await
            .unwrap();
        assert_eq!(coordinator.release_session("n2", true).await, ReleaseOutcome::noop());
        assert_eq!(coordinator.active_key(), Some("n1".into()));
        assert!(host.sink.applied().is_empty());
    }

    #[tokio::test]
    async fn new_session_supersedes_and_saves_previous() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Persistent);

        let first = coordinator
            .create_session("a", "alpha", SessionHandlers::new())
            .await
            .unwrap();
        host.workspace.view(first.surface()).unwrap().type_text("alpha edited");

        let second = coordinator
            .create_session("b", "beta", SessionHandlers::new())
            .await
            .unwrap();

        assert_eq!(host.sink.last_for("a").as_deref(), Some("alpha edited"));
        assert_eq!(coordinator.active_key(), Some("b".into()));
        assert_ne!(first.id(), second.id());
        assert_eq!(first.listener_count(), 0);
        assert_eq!(second.content(), "beta");
        assert_eq!(host.store.paths_with_prefix(".scratchpad/").len(), 1);
    }

    #[tokio::test]
    async fn handlers_fire_for_user_input() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Ephemeral);
        let changes = Arc::new(Mutex::new(Vec::new()));
        let saved = Arc::new(Mutex::new(None));

        let handlers = {
            let changes = changes.clone();
            let saved = saved.clone();
            SessionHandlers::new()
                .on_change(move |text| changes.lock().push(text.to_string()))
                .on_save(move |text| *saved.lock() = Some(text.to_string()))
        };
        let container = coordinator.create_session("n1", "a", handlers).await.unwrap();

        host.workspace.view(container.surface()).unwrap().type_text("ab");
        container.handle_key(&KeyChord::plain(Key::Enter).with_ctrl());

        assert_eq!(*changes.lock(), vec!["ab".to_string()]);
        assert_eq!(saved.lock().as_deref(), Some("ab"));
    }

    #[tokio::test]
    async fn sync_updates_only_when_buffer_differs() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Ephemeral);
        let changes = Arc::new(Mutex::new(0usize));
        let handlers = {
            let changes = changes.clone();
            SessionHandlers::new().on_change(move |_| *changes.lock() += 1)
        };
        let container = coordinator.create_session("n1", "same", handlers).await.unwrap();
        let view = host.workspace.view(container.surface()).unwrap();
        let writes = view.write_count();

        assert!(coordinator.sync_content("n1", "same").await);
        assert_eq!(view.write_count(), writes);
        assert!(host.sink.applied().is_empty());

        assert!(coordinator.sync_content("n1", "external").await);
        assert_eq!(container.content(), "external");
        assert_eq!(host.sink.last_for("n1").as_deref(), Some("external"));
        // Programmatic writes do not echo back as user changes.
        assert_eq!(*changes.lock(), 0);
        assert!(!coordinator.status().dirty);
    }

    #[tokio::test]
    async fn stale_sync_is_ignored() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Ephemeral);
        let container = coordinator
            .create_session("n1", "keep", SessionHandlers::new())
            .await
            .unwrap();

        assert!(!coordinator.sync_content("other", "overwrite").await);
        assert_eq!(container.content(), "keep");
        assert!(host.sink.applied().is_empty());
    }

    #[tokio::test]
    async fn dirty_tracks_user_edits() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Ephemeral);
        let container = coordinator
            .create_session("n1", "base", SessionHandlers::new())
            .await
            .unwrap();
        assert!(!coordinator.status().dirty);

        host.workspace.view(container.surface()).unwrap().type_text("base+");
        let status = coordinator.status();
        assert!(status.dirty);
        assert_eq!(status.active_key, Some("n1".into()));
        assert!(status.adapter.bound);
    }

    #[tokio::test]
    async fn creation_failure_leaves_idle_state() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Ephemeral);
        host.store.set_faults(StoreFaults {
            create: true,
            ..StoreFaults::default()
        });

        let err = coordinator
            .create_session("n1", "text", SessionHandlers::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ScratchError::SessionCreationFailed { ref key, .. } if key == "n1"));
        assert!(err.is_creation_failure());
        assert!(!coordinator.has_active_session());
        assert!(!coordinator.adapter().is_bound());
        assert!(coordinator.pool().current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn bind_timeout_releases_resource() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Ephemeral);
        host.workspace.set_faults(WorkspaceFaults {
            never_ready: true,
            ..WorkspaceFaults::default()
        });

        let err = coordinator
            .create_session("n1", "text", SessionHandlers::new())
            .await
            .unwrap_err();

        match err {
            ScratchError::SessionCreationFailed { source, .. } => {
                assert!(matches!(*source, ScratchError::SurfaceNotReady { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!coordinator.has_active_session());
        assert!(host.store.paths().is_empty());
        assert_eq!(host.workspace.live_surfaces(), 0);
    }

    #[tokio::test]
    async fn sink_failure_still_releases() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Ephemeral);
        coordinator
            .create_session("n1", "text", SessionHandlers::new())
            .await
            .unwrap();
        host.sink.set_failing(true);

        let outcome = coordinator.release_session("n1", true).await;
        assert!(!outcome.success);
        assert_eq!(outcome.content.as_deref(), Some("text"));
        assert!(!coordinator.has_active_session());
        assert!(!coordinator.adapter().is_bound());
        assert!(host.store.paths().is_empty());
    }

    #[tokio::test]
    async fn cleanup_failure_still_ends_idle() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Ephemeral);
        coordinator
            .create_session("n1", "text", SessionHandlers::new())
            .await
            .unwrap();
        host.store.set_faults(StoreFaults {
            delete: true,
            ..StoreFaults::default()
        });

        let outcome = coordinator.release_session("n1", false).await;
        assert!(!outcome.success);
        assert!(!coordinator.has_active_session());
        assert!(coordinator.consistency_violation().is_none());
    }

    #[tokio::test]
    async fn recovery_scrubs_everything() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Persistent);
        coordinator
            .create_session("n1", "text", SessionHandlers::new())
            .await
            .unwrap();
        host.store.insert(".scratchpad/inplace-edit-orphan.md", "left over");

        let removed = coordinator.recover_from_exception().await;

        assert!(removed >= 1);
        assert!(!coordinator.has_active_session());
        assert!(!coordinator.adapter().is_bound());
        assert!(coordinator.pool().current().is_none());
        assert!(host.store.paths_with_prefix(".scratchpad/").is_empty());
        assert!(host.sink.applied().is_empty());
    }

    #[tokio::test]
    async fn consistency_violation_detects_unbound_session() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Persistent);
        coordinator
            .create_session("n1", "text", SessionHandlers::new())
            .await
            .unwrap();
        assert!(coordinator.consistency_violation().is_none());

        coordinator.adapter().unbind();
        let violation = coordinator.consistency_violation().unwrap();
        assert!(violation.contains("no container"));
    }

    #[tokio::test]
    async fn guarded_fixes_skip_a_replaced_session() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Persistent);
        coordinator
            .create_session("n1", "one", SessionHandlers::new())
            .await
            .unwrap();
        let observed = coordinator.snapshot().await.fingerprint;
        assert_eq!(observed.active_key(), Some(&"n1".into()));

        coordinator.release_session("n1", false).await;
        let container = coordinator
            .create_session("n2", "two", SessionHandlers::new())
            .await
            .unwrap();

        assert!(coordinator.recover_if_unchanged(&observed).await.is_none());
        assert!(coordinator.release_if_unchanged(&observed, true).await.is_none());
        assert_eq!(coordinator.active_key(), Some("n2".into()));
        assert!(container.is_attached());
        assert!(host.sink.applied().is_empty());
    }

    #[tokio::test]
    async fn guarded_fixes_apply_to_unchanged_state() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Ephemeral);
        let container = coordinator
            .create_session("n1", "one", SessionHandlers::new())
            .await
            .unwrap();
        host.workspace.view(container.surface()).unwrap().type_text("one!");

        let observed = coordinator.fingerprint();
        assert!(coordinator.scrub_if_unchanged(&observed).await.is_none());
        let outcome = coordinator.release_if_unchanged(&observed, true).await.unwrap();

        assert_eq!(outcome.content.as_deref(), Some("one!"));
        assert!(!coordinator.has_active_session());
        let idle = coordinator.fingerprint();
        assert_ne!(idle, observed);
        assert_eq!(coordinator.scrub_if_unchanged(&idle).await, Some(0));
    }

    #[tokio::test]
    async fn snapshot_reports_missing_document() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Persistent);
        coordinator
            .create_session("n1", "text", SessionHandlers::new())
            .await
            .unwrap();
        let path = coordinator.pool().current().unwrap().document.path().to_string();
        host.store.remove_externally(&path);

        let snapshot = coordinator.snapshot().await;
        assert!(matches!(snapshot.document_present, Ok(false)));
        assert_eq!(snapshot.session.active_key, Some("n1".into()));
        assert!(snapshot.resource.in_use);
        assert!(snapshot.violation.is_none());
    }

    #[tokio::test]
    async fn destroy_disposes_pool() {
        let host = TestHost::new();
        let coordinator = coordinator(&host, StrategyKind::Persistent);
        coordinator
            .create_session("n1", "text", SessionHandlers::new())
            .await
            .unwrap();

        coordinator.destroy().await;

        assert!(!coordinator.has_active_session());
        assert!(coordinator.pool().status().disposed);
        let err = coordinator
            .create_session("n2", "text", SessionHandlers::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScratchError::SessionCreationFailed { ref source, .. } if matches!(**source, ScratchError::Disposed)));
    }
}
