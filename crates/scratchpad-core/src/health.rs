//! Health monitor
//!
//! Evaluates pool, session and performance state into a snapshot of
//! graded issues, and applies targeted fixes for the serious ones.
//!
//! Severity ladder:
//! - `Low`: informational, an idle unused resource
//! - `Medium`: stale resource or session, slow operations, unresolved
//!   cleanup failures
//! - `High`: resource/session disagreement, leaked or missing resource,
//!   error rate above threshold
//! - `Critical`: coordinator inconsistency or a failed evaluation
//!
//! A snapshot is healthy when nothing above `Low` was found.

use crate::config::HealthConfig;
use crate::error::ScratchError;
use crate::ledger::{PerformanceLedger, PerformanceSummary};
use crate::pool::ResourceStatus;
use crate::session::{SessionCoordinator, SessionStatus, StateFingerprint};
use crate::types::OperationKind;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational
    Low,
    /// Degraded, no action taken
    Medium,
    /// Warrants an automatic fix
    High,
    /// Coordinator cannot be trusted
    Critical,
}

impl Severity {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Area an issue was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueCategory {
    /// Session and resource disagree
    State,
    /// Backing resource
    Resource,
    /// Active session
    Session,
    /// Ledger figures
    Performance,
    /// The evaluation itself
    Monitor,
}

impl IssueCategory {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::State => "state",
            IssueCategory::Resource => "resource",
            IssueCategory::Session => "session",
            IssueCategory::Performance => "performance",
            IssueCategory::Monitor => "monitor",
        }
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthIssue {
    /// How serious
    pub severity: Severity,
    /// Where
    pub category: IssueCategory,
    /// What was observed
    pub message: String,
    /// Suggested remedy
    pub recommendation: String,
}

impl HealthIssue {
    fn new(
        severity: Severity,
        category: IssueCategory,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            recommendation: recommendation.into(),
        }
    }
}

/// Result of one health evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    /// Evaluation time
    pub taken_at: DateTime<Utc>,
    /// No issue above `Low`
    pub healthy: bool,
    /// Pool state
    pub resource: ResourceStatus,
    /// Coordinator state
    pub session: SessionStatus,
    /// Ledger figures
    pub performance: PerformanceSummary,
    /// Findings, most severe first
    pub issues: Vec<HealthIssue>,
    /// Coordinator state the findings were computed from
    pub state: StateFingerprint,
}

impl HealthSnapshot {
    /// Highest severity found
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }

    /// Whether an issue with exactly this category and severity exists
    #[must_use]
    pub fn has_issue(&self, category: IssueCategory, severity: Severity) -> bool {
        self.issues
            .iter()
            .any(|i| i.category == category && i.severity == severity)
    }

    /// Issues at or above `severity`
    pub fn issues_at_least(&self, severity: Severity) -> impl Iterator<Item = &HealthIssue> {
        self.issues.iter().filter(move |i| i.severity >= severity)
    }
}

/// Periodic health evaluation and auto-fix
#[derive(Debug)]
pub struct HealthMonitor {
    config: HealthConfig,
    ledger: Mutex<PerformanceLedger>,
}

impl HealthMonitor {
    /// Create monitor
    #[must_use]
    pub fn new(config: HealthConfig) -> Self {
        Self {
            ledger: Mutex::new(PerformanceLedger::new(config.ledger_capacity)),
            config,
        }
    }

    /// Thresholds in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Record one operation in the ledger
    pub fn record_operation(&self, kind: OperationKind, duration: Duration, success: bool) {
        self.ledger.lock().record(kind, duration, success);
    }

    /// Ledger figures
    #[must_use]
    pub fn performance(&self) -> PerformanceSummary {
        self.ledger.lock().summary()
    }

    /// Evaluate `coordinator`
    ///
    /// Never fails: an evaluation error or panic becomes a critical
    /// `monitor` issue in an unhealthy snapshot.
    pub async fn check_health(&self, coordinator: &SessionCoordinator) -> HealthSnapshot {
        match AssertUnwindSafe(self.evaluate(coordinator)).catch_unwind().await {
            Ok(snapshot) => {
                tracing::debug!(
                    healthy = snapshot.healthy,
                    issues = snapshot.issues.len(),
                    "health check complete"
                );
                snapshot
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(reason = %reason, "health check panicked");
                self.failed_snapshot(
                    coordinator.pool().status(),
                    coordinator.status(),
                    coordinator.fingerprint(),
                    format!("health check panicked: {reason}"),
                )
            }
        }
    }

    async fn evaluate(&self, coordinator: &SessionCoordinator) -> HealthSnapshot {
        let observed = coordinator.snapshot().await;
        let (resource, session, state) = (observed.resource, observed.session, observed.fingerprint);
        let document_present = match observed.document_present {
            Ok(present) => present,
            Err(err) => {
                let err = ScratchError::HealthCheckFailure(format!("document check failed: {err}"));
                tracing::error!(error = %err, "health check failed");
                return self.failed_snapshot(resource, session, state, err.to_string());
            }
        };
        let performance = self.performance();
        let mut issues = Vec::new();

        if let Some(violation) = observed.violation {
            issues.push(HealthIssue::new(
                Severity::Critical,
                IssueCategory::State,
                format!("coordinator inconsistent: {violation}"),
                "Run exception recovery to reset all editing state",
            ));
        }

        let session_active = session.active_key.is_some();
        if resource.in_use != session_active {
            issues.push(HealthIssue::new(
                Severity::High,
                IssueCategory::State,
                format!(
                    "resource in use is {} but session active is {}",
                    resource.in_use, session_active
                ),
                "Reset the coordinator so resource and session agree",
            ));
        }

        if !document_present {
            issues.push(HealthIssue::new(
                Severity::High,
                IssueCategory::Resource,
                format!(
                    "backing document {} is missing from the store",
                    resource.document.as_deref().unwrap_or("?")
                ),
                "Release the resource so it is recreated on next use",
            ));
        }

        self.grade_resource(&resource, &mut issues);

        if let Some(age) = session.age.filter(|age| *age > self.config.session_stale()) {
            issues.push(HealthIssue::new(
                Severity::Medium,
                IssueCategory::Session,
                format!("session has been open for {}", format_duration(age)),
                "Save or cancel the open edit",
            ));
        }

        if performance.total_operations > 0 && performance.error_rate > self.config.max_error_rate {
            issues.push(HealthIssue::new(
                Severity::High,
                IssueCategory::Performance,
                format!(
                    "error rate {:.1}% ({} of {} operations)",
                    performance.error_rate * 100.0,
                    performance.failed_operations,
                    performance.total_operations
                ),
                "Inspect host logs for failing document or surface operations",
            ));
        }
        if let Some(average) = performance
            .average_latency
            .filter(|average| *average > self.config.max_avg_latency())
        {
            issues.push(HealthIssue::new(
                Severity::Medium,
                IssueCategory::Performance,
                format!("average operation latency {}", format_duration(average)),
                "Check host responsiveness and surface startup time",
            ));
        }

        issues.sort_by(|a, b| b.severity.cmp(&a.severity));
        HealthSnapshot {
            taken_at: Utc::now(),
            healthy: issues.iter().all(|i| i.severity <= Severity::Low),
            resource,
            session,
            performance,
            issues,
            state,
        }
    }

    fn grade_resource(&self, resource: &ResourceStatus, issues: &mut Vec<HealthIssue>) {
        let stale = self.config.resource_stale();
        match (resource.in_use_for, resource.idle) {
            (Some(held), _) if held > stale * 2 => issues.push(HealthIssue::new(
                Severity::High,
                IssueCategory::Resource,
                format!("resource held for {}, likely leaked", format_duration(held)),
                "Release the stale resource",
            )),
            (Some(held), _) if held > stale => issues.push(HealthIssue::new(
                Severity::Medium,
                IssueCategory::Resource,
                format!("resource held for {}", format_duration(held)),
                "Finish or cancel the current edit",
            )),
            (None, Some(idle)) if idle > self.config.idle_notice() => issues.push(HealthIssue::new(
                Severity::Low,
                IssueCategory::Resource,
                format!("resource idle for {}", format_duration(idle)),
                "Idle resources are torn down by the expiry task",
            )),
            _ => {}
        }

        if resource.unresolved_cleanup_failures > 0 {
            issues.push(HealthIssue::new(
                Severity::Medium,
                IssueCategory::Resource,
                format!(
                    "{} unresolved cleanup failure(s), last: {}",
                    resource.unresolved_cleanup_failures,
                    resource.last_cleanup_error.as_deref().unwrap_or("unknown")
                ),
                "Run exception recovery to remove leftover scratch documents",
            ));
        }
    }

    fn failed_snapshot(
        &self,
        resource: ResourceStatus,
        session: SessionStatus,
        state: StateFingerprint,
        reason: String,
    ) -> HealthSnapshot {
        HealthSnapshot {
            taken_at: Utc::now(),
            healthy: false,
            resource,
            session,
            performance: self.performance(),
            issues: vec![HealthIssue::new(
                Severity::Critical,
                IssueCategory::Monitor,
                reason,
                "Run exception recovery and check host availability",
            )],
            state,
        }
    }

    /// Apply fixes for the issues in `snapshot`
    ///
    /// Critical issues or a `state` high issue trigger full exception
    /// recovery. A high `resource` issue releases the observed session with
    /// its content saved, or scrubs the pool when no session was active.
    ///
    /// Nothing is done when the coordinator's state no longer matches the
    /// snapshot. Returns whether a fix was applied.
    pub async fn auto_fix(&self, snapshot: &HealthSnapshot, coordinator: &SessionCoordinator) -> bool {
        let needs_reset = snapshot.issues.iter().any(|i| {
            i.severity == Severity::Critical
                || (i.severity == Severity::High && i.category == IssueCategory::State)
        });
        let applied = if needs_reset {
            tracing::warn!("auto-fix: running exception recovery");
            coordinator.recover_if_unchanged(&snapshot.state).await.is_some()
        } else if snapshot.has_issue(IssueCategory::Resource, Severity::High) {
            match snapshot.state.active_key() {
                Some(key) => {
                    tracing::warn!(key = %key, "auto-fix: releasing session holding a bad resource");
                    coordinator.release_if_unchanged(&snapshot.state, true).await.is_some()
                }
                None => {
                    tracing::warn!("auto-fix: scrubbing unused resource");
                    coordinator.scrub_if_unchanged(&snapshot.state).await.is_some()
                }
            }
        } else {
            return false;
        };

        if !applied {
            tracing::info!("auto-fix skipped, state changed since the health check");
        }
        applied
    }

    /// Multi-line report for support diagnostics
    pub async fn diagnostic_report(&self, coordinator: &SessionCoordinator) -> String {
        let snapshot = self.check_health(coordinator).await;
        render_report(&snapshot)
    }
}

fn render_report(snapshot: &HealthSnapshot) -> String {
    let mut out = String::new();
    let status = match snapshot.max_severity() {
        _ if snapshot.healthy => "HEALTHY".to_string(),
        Some(severity) => format!("DEGRADED (max severity: {severity})"),
        None => "DEGRADED".to_string(),
    };

    let _ = writeln!(out, "Scratchpad Diagnostic Report");
    let _ = writeln!(out, "Generated: {}", snapshot.taken_at.to_rfc3339());
    let _ = writeln!(out, "Status: {status}");

    let session = &snapshot.session;
    let _ = writeln!(out, "\nSession");
    match &session.active_key {
        Some(key) => {
            let _ = writeln!(out, "  Active key: {key}");
            if let Some(age) = session.age {
                let _ = writeln!(out, "  Age: {}", format_duration(age));
            }
            let _ = writeln!(out, "  Unsaved changes: {}", yes_no(session.dirty));
        }
        None => {
            let _ = writeln!(out, "  Active key: none");
        }
    }
    let _ = writeln!(
        out,
        "  Container bound: {} (listeners: {})",
        yes_no(session.adapter.bound),
        session.adapter.listeners
    );

    let resource = &snapshot.resource;
    let _ = writeln!(out, "\nResource");
    let _ = writeln!(out, "  Strategy: {}", resource.strategy);
    let _ = writeln!(
        out,
        "  Exists: {}  In use: {}",
        yes_no(resource.exists),
        yes_no(resource.in_use)
    );
    if let Some(document) = &resource.document {
        let _ = writeln!(out, "  Document: {document}");
    }
    if let Some(age) = resource.age {
        let _ = writeln!(out, "  Age: {}", format_duration(age));
    }
    if let Some(idle) = resource.idle {
        let _ = writeln!(out, "  Idle: {}", format_duration(idle));
    }
    let _ = writeln!(
        out,
        "  Created: {}  Reused: {}",
        resource.created_total, resource.reused_total
    );
    let _ = writeln!(
        out,
        "  Cleanup failures: {} (unresolved: {})",
        resource.cleanup_failures, resource.unresolved_cleanup_failures
    );
    if let Some(error) = &resource.last_cleanup_error {
        let _ = writeln!(out, "  Last cleanup error: {error}");
    }
    let _ = writeln!(
        out,
        "  Expiry task: {}",
        if resource.expiry_running { "running" } else { "stopped" }
    );

    let performance = &snapshot.performance;
    let _ = writeln!(out, "\nPerformance");
    let _ = writeln!(
        out,
        "  Operations: {} (failed: {}, error rate: {:.2}%)",
        performance.total_operations,
        performance.failed_operations,
        performance.error_rate * 100.0
    );
    if let Some(average) = performance.average_latency {
        let _ = writeln!(out, "  Average latency: {}", format_duration(average));
    }
    for (kind, figures) in &performance.per_kind {
        let _ = writeln!(
            out,
            "  {kind}: {} ops, {} failed, avg {}",
            figures.count,
            figures.failures,
            figures.average_latency.map_or_else(|| "-".to_string(), format_duration)
        );
    }

    let _ = writeln!(out, "\nIssues");
    if snapshot.issues.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for issue in &snapshot.issues {
        let _ = writeln!(
            out,
            "  [{}] {}: {}",
            issue.severity.as_str().to_uppercase(),
            issue.category,
            issue.message
        );
    }

    let _ = writeln!(out, "\nRecommendations");
    let mut recommendations: Vec<&str> = Vec::new();
    for issue in &snapshot.issues {
        if !recommendations.contains(&issue.recommendation.as_str()) {
            recommendations.push(&issue.recommendation);
        }
    }
    if recommendations.is_empty() {
        let _ = writeln!(out, "  - No action needed");
    }
    for recommendation in recommendations {
        let _ = writeln!(out, "  - {recommendation}");
    }

    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.as_millis());
    }
    let (hours, minutes, seconds) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m {seconds}s"),
        _ => format!("{hours}h {minutes}m {seconds}s"),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
