//! In-place editor facade
//!
//! Wires the pool, adapter, coordinator and health monitor together over a
//! set of host services, and times every operation into the ledger.

use crate::config::EditorConfig;
use crate::error::ScratchError;
use crate::health::{HealthMonitor, HealthSnapshot};
use crate::pool::{ResourceStatus, ScratchResourcePool};
use crate::session::{SessionCoordinator, SessionStatus};
use crate::surface::{EditingContainer, EditingSurfaceAdapter};
use crate::types::{CorrelationKey, OperationKind, ReleaseOutcome, SessionHandlers};
use scratchpad_host::{ContentSink, DocumentStore, SurfaceExtractor, Workspace};
use std::sync::Arc;
use tokio::time::Instant;

/// Host capabilities the editor runs on
#[derive(Clone)]
pub struct HostServices {
    /// Document storage
    pub store: Arc<dyn DocumentStore>,
    /// Surface lifecycle
    pub workspace: Arc<dyn Workspace>,
    /// Surface view extraction
    pub extractor: Arc<dyn SurfaceExtractor>,
    /// Receiver of saved and synced content
    pub sink: Option<Arc<dyn ContentSink>>,
}

impl HostServices {
    /// Create host services without a content sink
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        workspace: Arc<dyn Workspace>,
        extractor: Arc<dyn SurfaceExtractor>,
    ) -> Self {
        Self {
            store,
            workspace,
            extractor,
            sink: None,
        }
    }

    /// With content sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ContentSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices")
            .field("sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

/// Editor-level status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorStatus {
    /// Whether a session is active
    pub has_active_session: bool,
    /// Key of the active session
    pub active_key: Option<CorrelationKey>,
    /// Pool state
    pub resource: ResourceStatus,
    /// Coordinator state
    pub session_manager: SessionStatus,
}

/// Entry point for in-place editing
#[derive(Debug)]
pub struct InplaceEditor {
    config: EditorConfig,
    coordinator: SessionCoordinator,
    monitor: HealthMonitor,
}

impl InplaceEditor {
    /// Create editor
    ///
    /// Starts the expiry task when `config.pool.auto_expiry` is set, so
    /// this must be called inside a Tokio runtime in that case.
    #[must_use]
    pub fn new(host: HostServices, config: EditorConfig) -> Self {
        let pool = ScratchResourcePool::new(
            host.store,
            host.workspace,
            config.strategy,
            config.pool.clone(),
        );
        if config.pool.auto_expiry {
            pool.start_expiry();
        }
        let adapter = EditingSurfaceAdapter::new(host.extractor, config.surface);
        let coordinator = SessionCoordinator::new(pool, adapter, host.sink);
        let monitor = HealthMonitor::new(config.health);

        tracing::info!(strategy = %config.strategy, auto_expiry = config.pool.auto_expiry, "in-place editor created");
        Self {
            config,
            coordinator,
            monitor,
        }
    }

    /// Configuration in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Session coordinator
    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    /// Health monitor
    #[inline]
    #[must_use]
    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    /// Prepare the persistent resource ahead of the first session
    ///
    /// # Errors
    /// - `ScratchError::ResourceCreationFailed` if creation fails
    pub async fn initialize(&self) -> Result<(), ScratchError> {
        self.coordinator.pool().initialize().await.map(|_| ())
    }

    /// Start editing `content` under `key`
    ///
    /// # Errors
    /// - `ScratchError::SessionCreationFailed` if the session could not be
    ///   entered; the editor is left idle
    pub async fn create_session(
        &self,
        key: impl Into<CorrelationKey>,
        content: &str,
        handlers: SessionHandlers,
    ) -> Result<EditingContainer, ScratchError> {
        let started = Instant::now();
        let result = self.coordinator.create_session(key, content, handlers).await;
        self.monitor
            .record_operation(OperationKind::CreateSession, started.elapsed(), result.is_ok());
        if let Err(err) = &result {
            tracing::error!(error = %err, "session creation failed");
        }
        result
    }

    /// Stop editing `key`, optionally saving
    pub async fn release_session(&self, key: &str, save: bool) -> ReleaseOutcome {
        let started = Instant::now();
        let outcome = self.coordinator.release_session(key, save).await;
        self.monitor
            .record_operation(OperationKind::ReleaseSession, started.elapsed(), outcome.success);
        outcome
    }

    /// Push external `content` into the session for `key`
    ///
    /// Returns `false` when `key` is not the active session. That case is
    /// recorded as a failed operation.
    pub async fn sync_content(&self, key: &str, content: &str) -> bool {
        let started = Instant::now();
        let applied = self.coordinator.sync_content(key, content).await;
        self.monitor
            .record_operation(OperationKind::SyncContent, started.elapsed(), applied);
        applied
    }

    /// Status snapshot
    #[must_use]
    pub fn status(&self) -> EditorStatus {
        let session_manager = self.coordinator.status();
        EditorStatus {
            has_active_session: session_manager.active_key.is_some(),
            active_key: session_manager.active_key.clone(),
            resource: self.coordinator.pool().status(),
            session_manager,
        }
    }

    /// Evaluate health
    pub async fn check_health(&self) -> HealthSnapshot {
        self.monitor.check_health(&self.coordinator).await
    }

    /// Apply fixes for `snapshot`; returns whether anything was done
    pub async fn auto_fix(&self, snapshot: &HealthSnapshot) -> bool {
        let started = Instant::now();
        let fixed = self.monitor.auto_fix(snapshot, &self.coordinator).await;
        if fixed {
            self.monitor
                .record_operation(OperationKind::Recovery, started.elapsed(), true);
        }
        fixed
    }

    /// Multi-line diagnostic report
    pub async fn generate_diagnostic_report(&self) -> String {
        self.monitor.diagnostic_report(&self.coordinator).await
    }

    /// Abandon the active session and remove every scratch document
    pub async fn recover_from_exception(&self) {
        let started = Instant::now();
        self.coordinator.recover_from_exception().await;
        self.monitor
            .record_operation(OperationKind::Recovery, started.elapsed(), true);
    }

    /// Release everything; the editor is unusable afterwards
    pub async fn destroy(&self) {
        self.coordinator.destroy().await;
        tracing::info!("in-place editor destroyed");
    }
}
