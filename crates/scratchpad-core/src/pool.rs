//! Scratch resource pool
//!
//! Owns the single backing document + display surface pair:
//! - Ephemeral strategy: create on every acquire, delete on release
//! - Persistent strategy: create once, reset content between uses
//! - Forced recovery scan for leaked scratch documents
//! - Optional idle expiry on a fixed interval

use crate::config::PoolConfig;
use crate::error::ScratchError;
use crate::types::{ResourceId, StrategyKind};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use scratchpad_host::{
    DocumentHandle, DocumentStore, HostError, ModificationListener, SurfaceId, WatchId, Workspace,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Scratch document and the surface it is open in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingResource {
    /// Resource ID
    pub id: ResourceId,
    /// Backing document
    pub document: DocumentHandle,
    /// Off-screen surface showing the document
    pub surface: SurfaceId,
    /// Owning strategy
    pub strategy: StrategyKind,
    /// Creation instant
    pub created_at: Instant,
    /// Creation wall-clock time
    pub created_wall: DateTime<Utc>,
    /// Last acquire, release or observed modification
    pub last_access: Instant,
    /// Start of the current use, if in use
    pub acquired_at: Option<Instant>,
}

impl BackingResource {
    /// Whether a session currently owns the resource
    ///
    /// An ephemeral resource only exists while in use.
    #[inline]
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        match self.strategy {
            StrategyKind::Ephemeral => true,
            StrategyKind::Persistent => self.acquired_at.is_some(),
        }
    }

    /// Time since creation
    #[inline]
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Time since last access
    #[inline]
    #[must_use]
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_access)
    }

    /// Duration of the current use
    #[inline]
    #[must_use]
    pub fn in_use_for(&self, now: Instant) -> Option<Duration> {
        if !self.is_in_use() {
            return None;
        }
        Some(now.saturating_duration_since(self.acquired_at.unwrap_or(self.created_at)))
    }
}

/// Point-in-time pool status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStatus {
    /// Strategy in effect
    pub strategy: StrategyKind,
    /// Whether a backing resource exists
    pub exists: bool,
    /// Whether the resource is in use
    pub in_use: bool,
    /// Resource ID
    pub resource_id: Option<ResourceId>,
    /// Backing document path
    pub document: Option<String>,
    /// Bound surface
    pub surface: Option<SurfaceId>,
    /// Time since creation
    pub age: Option<Duration>,
    /// Time since last access
    pub idle: Option<Duration>,
    /// Duration of the current use
    pub in_use_for: Option<Duration>,
    /// Resources created over the pool's lifetime
    pub created_total: u64,
    /// Acquires served by an existing resource
    pub reused_total: u64,
    /// Cleanup failures over the pool's lifetime
    pub cleanup_failures: u64,
    /// Cleanup failures not yet cleared by a recovery scan
    pub unresolved_cleanup_failures: u64,
    /// Most recent cleanup failure
    pub last_cleanup_error: Option<String>,
    /// Whether the expiry task is running
    pub expiry_running: bool,
    /// Whether the pool was disposed
    pub disposed: bool,
}

#[derive(Debug, Default)]
struct PoolState {
    resource: Option<BackingResource>,
    watch: Option<WatchId>,
    created_total: u64,
    reused_total: u64,
    cleanup_failures: u64,
    unresolved_cleanup_failures: u64,
    last_cleanup_error: Option<String>,
}

struct PoolInner {
    store: Arc<dyn DocumentStore>,
    workspace: Arc<dyn Workspace>,
    config: PoolConfig,
    strategy: StrategyKind,
    state: Mutex<PoolState>,
    /// Serializes acquire/release/recover; expiry only ever `try_lock`s it
    ops: tokio::sync::Mutex<()>,
    disposed: AtomicBool,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

/// Exclusive owner of the backing resource
pub struct ScratchResourcePool {
    inner: Arc<PoolInner>,
}

impl ScratchResourcePool {
    /// Create pool; nothing is allocated until the first acquire
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        workspace: Arc<dyn Workspace>,
        strategy: StrategyKind,
        config: PoolConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                store,
                workspace,
                config,
                strategy,
                state: Mutex::new(PoolState::default()),
                ops: tokio::sync::Mutex::new(()),
                disposed: AtomicBool::new(false),
                expiry: Mutex::new(None),
            }),
        }
    }

    /// Strategy in effect
    #[inline]
    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        self.inner.strategy
    }

    /// Pool configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Create the persistent document and surface ahead of first use
    ///
    /// Idempotent. The ephemeral strategy has nothing to prepare and
    /// returns `Ok(None)`.
    ///
    /// # Errors
    /// - `ScratchError::ResourceCreationFailed` if creation fails
    /// - `ScratchError::Disposed` after [`dispose`](Self::dispose)
    pub async fn initialize(&self) -> Result<Option<BackingResource>, ScratchError> {
        self.inner.ensure_live()?;
        if self.inner.strategy == StrategyKind::Ephemeral {
            return Ok(None);
        }
        let _ops = self.inner.ops.lock().await;
        if let Some(existing) = self.current() {
            tracing::debug!(document = %existing.document, "persistent resource already initialized");
            return Ok(Some(existing));
        }
        let placeholder = self.inner.config.placeholder.clone();
        let resource = self.inner.create_resource(&placeholder).await?;
        self.inner.install(resource.clone());
        Ok(Some(resource))
    }

    /// Acquire the backing resource loaded with `content`
    ///
    /// Ephemeral: tears down any previous resource, then creates a fresh
    /// one. Persistent: creates on first use, afterwards overwrites the
    /// document and marks it in use.
    ///
    /// # Errors
    /// - `ScratchError::ResourceCreationFailed` if the document or surface
    ///   cannot be prepared; nothing created along the way is left behind
    /// - `ScratchError::Disposed` after [`dispose`](Self::dispose)
    pub async fn acquire(&self, content: &str) -> Result<BackingResource, ScratchError> {
        self.inner.ensure_live()?;
        let _ops = self.inner.ops.lock().await;
        match self.inner.strategy {
            StrategyKind::Ephemeral => self.inner.acquire_ephemeral(content).await,
            StrategyKind::Persistent => self.inner.acquire_persistent(content).await,
        }
    }

    /// Release the backing resource
    ///
    /// Ephemeral: deletes the document and detaches the surface. Persistent:
    /// overwrites the document with `restore` (or the configured placeholder)
    /// and keeps it for reuse. Safe to call repeatedly. Failures are logged
    /// and counted, never returned; the result says whether every step
    /// completed cleanly.
    pub async fn release(&self, restore: Option<&str>) -> bool {
        let _ops = self.inner.ops.lock().await;
        self.inner.release_locked(restore).await
    }

    /// Remove every scratch document in the store and clear local state
    ///
    /// Used when normal release failed and bookkeeping may be stale. Never
    /// fails; returns the number of documents removed.
    pub async fn force_recover(&self) -> usize {
        let _ops = self.inner.ops.lock().await;
        self.inner.force_recover_locked().await
    }

    /// Tear down the resource if it is unused and idle past the limit
    ///
    /// Dropped (returns `false`) while another pool operation is running.
    pub async fn expire_idle(&self) -> bool {
        self.inner.expire_idle().await
    }

    /// Whether the tracked document still exists in the store
    ///
    /// `Ok(true)` when no resource is tracked.
    ///
    /// # Errors
    /// Propagates the store's error; callers on the health path report it.
    pub async fn verify(&self) -> Result<bool, HostError> {
        let Some(resource) = self.current() else {
            return Ok(true);
        };
        self.inner.store.exists(resource.document.path()).await
    }

    /// Refresh last-access time
    pub fn touch(&self) {
        if let Some(resource) = self.inner.state.lock().resource.as_mut() {
            resource.last_access = Instant::now();
        }
    }

    /// Copy of the current resource
    #[must_use]
    pub fn current(&self) -> Option<BackingResource> {
        self.inner.state.lock().resource.clone()
    }

    /// Whether a session currently owns the resource
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.inner
            .state
            .lock()
            .resource
            .as_ref()
            .is_some_and(BackingResource::is_in_use)
    }

    /// Status snapshot
    #[must_use]
    pub fn status(&self) -> ResourceStatus {
        let now = Instant::now();
        let expiry_running = self.is_expiry_running();
        let state = self.inner.state.lock();
        let resource = state.resource.as_ref();
        ResourceStatus {
            strategy: self.inner.strategy,
            exists: resource.is_some(),
            in_use: resource.is_some_and(BackingResource::is_in_use),
            resource_id: resource.map(|r| r.id),
            document: resource.map(|r| r.document.path.clone()),
            surface: resource.map(|r| r.surface),
            age: resource.map(|r| r.age(now)),
            idle: resource.map(|r| r.idle(now)),
            in_use_for: resource.and_then(|r| r.in_use_for(now)),
            created_total: state.created_total,
            reused_total: state.reused_total,
            cleanup_failures: state.cleanup_failures,
            unresolved_cleanup_failures: state.unresolved_cleanup_failures,
            last_cleanup_error: state.last_cleanup_error.clone(),
            expiry_running,
            disposed: self.inner.disposed.load(Ordering::SeqCst),
        }
    }

    /// Start the periodic expiry task
    ///
    /// No-op when already running, after disposal, or outside a tokio
    /// runtime.
    pub fn start_expiry(&self) {
        if self.inner.disposed.load(Ordering::SeqCst) {
            tracing::warn!("expiry not started: pool disposed");
            return;
        }
        let mut slot = self.inner.expiry.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("expiry not started: no tokio runtime");
            return;
        };
        let period = self.inner.config.expiry_check_interval();
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(runtime.spawn(expiry_task(weak, period)));
        tracing::debug!(period_secs = period.as_secs(), "expiry task started");
    }

    /// Stop the periodic expiry task
    pub fn stop_expiry(&self) {
        if let Some(task) = self.inner.expiry.lock().take() {
            task.abort();
            tracing::debug!("expiry task stopped");
        }
    }

    /// Whether the expiry task is running
    #[must_use]
    pub fn is_expiry_running(&self) -> bool {
        self.inner
            .expiry
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop expiry and destroy the resource; later acquires fail
    pub async fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.stop_expiry();
        let _ops = self.inner.ops.lock().await;
        if let Some(resource) = self.inner.take_resource() {
            self.inner.teardown(resource).await;
        }
        tracing::info!(strategy = %self.inner.strategy, "scratch resource pool disposed");
    }
}

impl std::fmt::Debug for ScratchResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchResourcePool")
            .field("strategy", &self.inner.strategy)
            .field("resource", &self.current())
            .finish_non_exhaustive()
    }
}

async fn expiry_task(pool: Weak<PoolInner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(inner) = pool.upgrade() else {
            break;
        };
        if inner.disposed.load(Ordering::SeqCst) {
            break;
        }
        inner.expire_idle().await;
    }
}

impl PoolInner {
    fn ensure_live(&self) -> Result<(), ScratchError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ScratchError::Disposed);
        }
        Ok(())
    }

    fn document_path(&self) -> String {
        let prefix = self.config.path_prefix();
        match self.strategy {
            StrategyKind::Ephemeral => format!(
                "{prefix}-{}.{}",
                ulid::Ulid::new().to_string().to_lowercase(),
                self.config.extension
            ),
            StrategyKind::Persistent => format!("{prefix}-persistent.{}", self.config.extension),
        }
    }

    async fn acquire_ephemeral(
        self: &Arc<Self>,
        content: &str,
    ) -> Result<BackingResource, ScratchError> {
        if let Some(previous) = self.take_resource() {
            tracing::info!(document = %previous.document, "replacing previous ephemeral resource");
            self.teardown(previous).await;
        }
        let resource = self.create_resource(content).await?;
        self.install(resource.clone());
        Ok(resource)
    }

    async fn acquire_persistent(
        self: &Arc<Self>,
        content: &str,
    ) -> Result<BackingResource, ScratchError> {
        let existing = self.state.lock().resource.clone();

        if let Some(resource) = existing {
            match self.store.modify(&resource.document, content).await {
                Ok(()) => {
                    let now = Instant::now();
                    let mut state = self.state.lock();
                    if let Some(current) = state.resource.as_mut() {
                        current.acquired_at = Some(now);
                        current.last_access = now;
                        let reused = current.clone();
                        state.reused_total += 1;
                        return Ok(reused);
                    }
                    // Tracked resource vanished while the document was reset.
                    drop(state);
                }
                Err(err) => {
                    tracing::warn!(
                        document = %resource.document,
                        error = %err,
                        "persistent document could not be reset, recreating"
                    );
                    if let Some(stale) = self.take_resource() {
                        self.teardown(stale).await;
                    }
                }
            }
        }

        let mut resource = self.create_resource(content).await?;
        let now = Instant::now();
        resource.acquired_at = Some(now);
        resource.last_access = now;
        self.install(resource.clone());
        Ok(resource)
    }

    async fn release_locked(&self, restore: Option<&str>) -> bool {
        match self.strategy {
            StrategyKind::Ephemeral => {
                let Some(resource) = self.take_resource() else {
                    tracing::debug!("release: no ephemeral resource");
                    return true;
                };
                self.teardown(resource).await
            }
            StrategyKind::Persistent => {
                let Some(resource) = self.state.lock().resource.clone() else {
                    tracing::debug!("release: no persistent resource");
                    return true;
                };
                if !resource.is_in_use() {
                    tracing::debug!(document = %resource.document, "release: resource already idle");
                    return true;
                }
                let content = restore.unwrap_or(self.config.placeholder.as_str());
                let clean = match self.store.modify(&resource.document, content).await {
                    Ok(()) => true,
                    Err(source) => {
                        self.note_cleanup_failure(&ScratchError::CleanupFailure {
                            stage: "reset persistent document",
                            source,
                        });
                        false
                    }
                };
                let now = Instant::now();
                if let Some(current) = self.state.lock().resource.as_mut() {
                    if current.id == resource.id {
                        current.acquired_at = None;
                        current.last_access = now;
                    }
                }
                tracing::debug!(document = %resource.document, clean, "persistent resource released");
                clean
            }
        }
    }

    async fn force_recover_locked(&self) -> usize {
        let mut removed = 0;
        let mut clean = true;

        if let Some(resource) = self.take_resource() {
            let document = resource.document.clone();
            clean &= self.teardown(resource).await;
            tracing::info!(document = %document, "recovery: tracked resource torn down");
            removed += 1;
        }

        let prefix = self.config.path_prefix();
        match self.store.list_files().await {
            Ok(files) => {
                for document in files.iter().filter(|d| d.path().starts_with(&prefix)) {
                    match self.store.delete(document).await {
                        Ok(()) => {
                            tracing::info!(document = %document, "recovery: removed leaked scratch document");
                            removed += 1;
                        }
                        Err(err) if err.is_not_found() => {}
                        Err(source) => {
                            clean = false;
                            self.note_cleanup_failure(&ScratchError::CleanupFailure {
                                stage: "recovery delete",
                                source,
                            });
                        }
                    }
                }
            }
            Err(source) => {
                clean = false;
                self.note_cleanup_failure(&ScratchError::CleanupFailure {
                    stage: "recovery scan",
                    source,
                });
            }
        }

        if clean {
            self.state.lock().unresolved_cleanup_failures = 0;
        }
        tracing::info!(removed, clean, "scratch resource recovery finished");
        removed
    }

    async fn expire_idle(&self) -> bool {
        let Ok(_ops) = self.ops.try_lock() else {
            tracing::debug!("expiry skipped: pool operation in progress");
            return false;
        };
        let max_idle = self.config.max_idle();
        let now = Instant::now();
        let expired = self
            .state
            .lock()
            .resource
            .as_ref()
            .is_some_and(|r| !r.is_in_use() && r.idle(now) > max_idle);
        if !expired {
            return false;
        }
        let Some(resource) = self.take_resource() else {
            return false;
        };
        tracing::info!(
            document = %resource.document,
            idle_secs = resource.idle(now).as_secs(),
            "expiring idle scratch resource"
        );
        self.teardown(resource).await;
        true
    }

    async fn create_resource(&self, content: &str) -> Result<BackingResource, ScratchError> {
        let document = self.create_document(content).await?;

        let surface = match self.workspace.create_offscreen_surface().await {
            Ok(surface) => surface,
            Err(source) => {
                self.delete_document(&document).await;
                tracing::error!(error = %source, "scratch surface creation failed");
                return Err(ScratchError::ResourceCreationFailed {
                    stage: "create surface",
                    source,
                });
            }
        };

        if let Err(source) = self.workspace.open_document(surface, &document).await {
            self.detach_surface(surface).await;
            self.delete_document(&document).await;
            tracing::error!(error = %source, document = %document, "opening scratch document failed");
            return Err(ScratchError::ResourceCreationFailed {
                stage: "open document",
                source,
            });
        }

        let now = Instant::now();
        let resource = BackingResource {
            id: ResourceId::new(),
            document,
            surface,
            strategy: self.strategy,
            created_at: now,
            created_wall: Utc::now(),
            last_access: now,
            acquired_at: None,
        };
        tracing::info!(
            resource = %resource.id,
            document = %resource.document,
            strategy = %self.strategy,
            "scratch resource created"
        );
        Ok(resource)
    }

    async fn create_document(&self, content: &str) -> Result<DocumentHandle, ScratchError> {
        let path = self.document_path();
        match self.store.create(&path, content).await {
            Ok(document) => Ok(document),
            Err(HostError::AlreadyExists(_)) => {
                // Left behind by an earlier run that never cleaned up.
                tracing::warn!(document = %path, "replacing leftover scratch document");
                let leftover = DocumentHandle::new(path.clone());
                if let Err(source) = self.store.delete(&leftover).await {
                    return Err(ScratchError::ResourceCreationFailed {
                        stage: "remove leftover document",
                        source,
                    });
                }
                self.store.create(&path, content).await.map_err(|source| {
                    ScratchError::ResourceCreationFailed {
                        stage: "create document",
                        source,
                    }
                })
            }
            Err(source) => {
                tracing::error!(error = %source, document = %path, "scratch document creation failed");
                Err(ScratchError::ResourceCreationFailed {
                    stage: "create document",
                    source,
                })
            }
        }
    }

    fn install(self: &Arc<Self>, resource: BackingResource) {
        let weak = Arc::downgrade(self);
        let id = resource.id;
        let listener: ModificationListener = Arc::new(move |_document| {
            if let Some(inner) = weak.upgrade() {
                if let Some(current) = inner.state.lock().resource.as_mut() {
                    if current.id == id {
                        current.last_access = Instant::now();
                    }
                }
            }
        });
        let watch = self.store.watch(resource.document.path(), listener);

        let mut state = self.state.lock();
        debug_assert!(state.resource.is_none(), "second live backing resource");
        state.resource = Some(resource);
        state.watch = Some(watch);
        state.created_total += 1;
    }

    fn take_resource(&self) -> Option<BackingResource> {
        let (resource, watch) = {
            let mut state = self.state.lock();
            (state.resource.take(), state.watch.take())
        };
        if let Some(watch) = watch {
            self.store.unwatch(watch);
        }
        resource
    }

    /// Delete document and detach surface; returns whether both succeeded
    async fn teardown(&self, resource: BackingResource) -> bool {
        let detached = self.detach_surface(resource.surface).await;
        let deleted = self.delete_document(&resource.document).await;
        tracing::info!(
            resource = %resource.id,
            document = %resource.document,
            clean = detached && deleted,
            "scratch resource destroyed"
        );
        detached && deleted
    }

    async fn delete_document(&self, document: &DocumentHandle) -> bool {
        match self.store.delete(document).await {
            Ok(()) => true,
            Err(err) if err.is_not_found() => {
                tracing::debug!(document = %document, "scratch document already gone");
                true
            }
            Err(source) => {
                self.note_cleanup_failure(&ScratchError::CleanupFailure {
                    stage: "delete document",
                    source,
                });
                false
            }
        }
    }

    async fn detach_surface(&self, surface: SurfaceId) -> bool {
        match self.workspace.detach(surface).await {
            Ok(()) => true,
            Err(err) if err.is_not_found() => true,
            Err(source) => {
                self.note_cleanup_failure(&ScratchError::CleanupFailure {
                    stage: "detach surface",
                    source,
                });
                false
            }
        }
    }

    fn note_cleanup_failure(&self, error: &ScratchError) {
        tracing::warn!(error = %error, "scratch cleanup step failed");
        let mut state = self.state.lock();
        state.cleanup_failures += 1;
        state.unresolved_cleanup_failures += 1;
        state.last_cleanup_error = Some(error.to_string());
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Some(task) = self.expiry.get_mut().take() {
            task.abort();
        }
    }
}
