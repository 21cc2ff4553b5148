//! Functional tests for health grading, auto-fix and recovery.
//!
//! Core guarantees exercised here:
//! - Divergence between resource and session state is graded high and
//!   repaired by auto-fix.
//! - The error-rate threshold is strict: exactly at the limit is fine.
//! - Recovery always returns the editor to an idle, healthy state with no
//!   scratch documents left in the store.
//! - Idle persistent resources are expired in the background and recreated
//!   on demand.
//! - A health check never observes a half-created session, and auto-fix
//!   never tears down a session that started after the check.

use scratchpad_core::prelude::*;
use scratchpad_core::{IssueCategory, OperationKind, PoolConfig, Severity};
use scratchpad_test_utils::{init_tracing, TestHost};
use std::time::Duration;

fn editor_with(host: &TestHost, config: EditorConfig) -> InplaceEditor {
    init_tracing();
    let services = HostServices::new(host.store.clone(), host.workspace.clone(), host.workspace.clone())
        .with_sink(host.sink.clone());
    InplaceEditor::new(services, config)
}

fn editor(host: &TestHost) -> InplaceEditor {
    editor_with(
        host,
        EditorConfig::new().with_pool(PoolConfig::default().with_auto_expiry(false)),
    )
}

/// Forcing the resource out of use under an active session is a high
/// state issue that auto-fix clears.
#[tokio::test]
async fn divergence_is_detected_and_fixed() -> anyhow::Result<()> {
    let host = TestHost::new();
    let editor = editor(&host);
    editor.create_session("n1", "text", SessionHandlers::new()).await?;

    editor.coordinator().pool().release(None).await;

    let snapshot = editor.check_health().await;
    assert!(!snapshot.healthy);
    assert!(snapshot.has_issue(IssueCategory::State, Severity::High));

    assert!(editor.auto_fix(&snapshot).await);
    let after = editor.check_health().await;
    assert!(after.healthy, "still unhealthy: {:?}", after.issues);
    assert!(!editor.status().has_active_session);
    Ok(())
}

/// A health check issued while a slow create is still binding waits for it,
/// sees a consistent session and leaves it alone.
#[tokio::test(start_paused = true)]
async fn health_check_during_create_leaves_new_session_alone() -> anyhow::Result<()> {
    let host = TestHost::new();
    let editor = editor(&host);
    host.workspace.set_ready_after_polls(5);

    let (created, (snapshot, fixed)) = tokio::join!(
        editor.create_session("n1", "text", SessionHandlers::new()),
        async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let snapshot = editor.check_health().await;
            let fixed = editor.auto_fix(&snapshot).await;
            (snapshot, fixed)
        }
    );
    let container = created?;

    assert!(!snapshot.has_issue(IssueCategory::State, Severity::High), "{:?}", snapshot.issues);
    assert!(snapshot.healthy, "{:?}", snapshot.issues);
    assert_eq!(snapshot.session.active_key, Some("n1".into()));
    assert!(!fixed);
    assert_eq!(editor.status().active_key, Some("n1".into()));
    assert!(container.is_attached());
    assert_eq!(container.content(), "text");
    Ok(())
}

/// Two failures in twenty operations is a 10% error rate and a high
/// performance issue.
#[tokio::test]
async fn error_rate_above_threshold_is_high() {
    let host = TestHost::new();
    let editor = editor(&host);
    for i in 0..20 {
        editor
            .monitor()
            .record_operation(OperationKind::SyncContent, Duration::from_millis(3), i >= 2);
    }

    let snapshot = editor.check_health().await;
    assert!((snapshot.performance.error_rate - 0.10).abs() < 1e-9);
    assert!(snapshot.has_issue(IssueCategory::Performance, Severity::High));
}

/// One failure in twenty operations sits exactly at 5% and is not flagged.
#[tokio::test]
async fn error_rate_at_threshold_is_not_flagged() {
    let host = TestHost::new();
    let editor = editor(&host);
    for i in 0..20 {
        editor
            .monitor()
            .record_operation(OperationKind::SyncContent, Duration::from_millis(3), i >= 1);
    }

    let snapshot = editor.check_health().await;
    assert!((snapshot.performance.error_rate - 0.05).abs() < 1e-9);
    assert!(!snapshot.has_issue(IssueCategory::Performance, Severity::High));
    assert!(snapshot.healthy);
}

/// Recovery abandons the session and scrubs leaked scratch documents, but
/// leaves unrelated documents alone.
#[tokio::test]
async fn recovery_scrubs_scratch_documents_only() -> anyhow::Result<()> {
    let host = TestHost::new();
    let editor = editor(&host);
    host.store.insert("notes/keep.md", "user data");
    host.store.insert(".scratchpad/inplace-edit-leaked.md", "stale");
    editor.create_session("n1", "text", SessionHandlers::new()).await?;

    editor.recover_from_exception().await;

    assert!(!editor.status().has_active_session);
    assert!(host.store.paths_with_prefix(".scratchpad/").is_empty());
    assert_eq!(host.store.content("notes/keep.md").as_deref(), Some("user data"));
    assert!(host.sink.applied().is_empty());
    assert!(editor.check_health().await.healthy);

    editor.create_session("n2", "fresh", SessionHandlers::new()).await?;
    assert_eq!(editor.status().active_key, Some("n2".into()));
    Ok(())
}

/// The report covers every section and names the current issues.
#[tokio::test]
async fn diagnostic_report_describes_state() -> anyhow::Result<()> {
    let host = TestHost::new();
    let editor = editor(&host);
    editor.create_session("n1", "text", SessionHandlers::new()).await?;
    editor.coordinator().pool().release(None).await;

    let report = editor.generate_diagnostic_report().await;

    assert!(report.starts_with("Scratchpad Diagnostic Report"));
    assert!(report.contains("Status: DEGRADED"));
    assert!(report.contains("Strategy: persistent"));
    assert!(report.contains("[HIGH] state"));
    assert!(report.contains("create_session: 1 ops"));
    Ok(())
}

/// With automatic expiry on, an idle persistent document is torn down and
/// the next session recreates it.
#[tokio::test(start_paused = true)]
async fn idle_persistent_resource_expires_in_background() -> anyhow::Result<()> {
    let host = TestHost::new();
    let editor = editor_with(
        &host,
        EditorConfig::new().with_pool(PoolConfig::default().with_expiry(1, 5)),
    );
    editor.create_session("n1", "text", SessionHandlers::new()).await?;
    editor.release_session("n1", false).await;
    assert!(editor.status().resource.exists);

    tokio::time::sleep(Duration::from_secs(8)).await;

    let status = editor.status();
    assert!(!status.resource.exists);
    assert!(status.resource.expiry_running);
    assert!(host.store.paths_with_prefix(".scratchpad/").is_empty());

    let container = editor.create_session("n2", "back", SessionHandlers::new()).await?;
    assert_eq!(container.content(), "back");
    assert_eq!(host.store.create_count(), 2);
    Ok(())
}

/// An active session is never expired, however long it stays idle.
#[tokio::test(start_paused = true)]
async fn active_session_survives_expiry() -> anyhow::Result<()> {
    let host = TestHost::new();
    let editor = editor_with(
        &host,
        EditorConfig::new().with_pool(PoolConfig::default().with_expiry(1, 5)),
    );
    let container = editor.create_session("n1", "text", SessionHandlers::new()).await?;

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(editor.status().resource.in_use);
    assert_eq!(editor.status().active_key, Some("n1".into()));
    assert_eq!(container.content(), "text");
    Ok(())
}
