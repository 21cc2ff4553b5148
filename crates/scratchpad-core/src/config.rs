//! Scratchpad configuration
//!
//! Durations are stored as integer seconds/milliseconds so the structs stay
//! trivially serializable; use the accessor methods for `Duration` values.

use crate::types::StrategyKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Backing resource strategy, fixed for the lifetime of the editor
    pub strategy: StrategyKind,
    /// Resource pool settings
    pub pool: PoolConfig,
    /// Surface extraction settings
    pub surface: SurfaceConfig,
    /// Health thresholds
    pub health: HealthConfig,
}

impl EditorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With strategy
    #[inline]
    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// With pool settings
    #[inline]
    #[must_use]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// With surface settings
    #[inline]
    #[must_use]
    pub fn with_surface(mut self, surface: SurfaceConfig) -> Self {
        self.surface = surface;
        self
    }

    /// With health thresholds
    #[inline]
    #[must_use]
    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }
}

/// Resource pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Store directory holding scratch documents
    pub scratch_dir: String,
    /// File name prefix identifying scratch documents
    pub file_prefix: String,
    /// File extension
    pub extension: String,
    /// Content written to the persistent document between sessions
    pub placeholder: String,
    /// Seconds between expiry checks
    pub expiry_check_interval_secs: u64,
    /// Idle seconds after which an unused resource is torn down
    pub max_idle_secs: u64,
    /// Start the expiry task when the editor is constructed
    pub auto_expiry: bool,
}

impl PoolConfig {
    /// Expiry check period
    #[inline]
    #[must_use]
    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_check_interval_secs.max(1))
    }

    /// Maximum idle time
    #[inline]
    #[must_use]
    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_secs)
    }

    /// Path prefix every scratch document starts with
    #[must_use]
    pub fn path_prefix(&self) -> String {
        if self.scratch_dir.is_empty() {
            self.file_prefix.clone()
        } else {
            format!("{}/{}", self.scratch_dir.trim_end_matches('/'), self.file_prefix)
        }
    }

    /// With scratch directory
    #[inline]
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<String>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// With expiry timing
    #[inline]
    #[must_use]
    pub fn with_expiry(mut self, check_interval_secs: u64, max_idle_secs: u64) -> Self {
        self.expiry_check_interval_secs = check_interval_secs;
        self.max_idle_secs = max_idle_secs;
        self
    }

    /// With automatic expiry on or off
    #[inline]
    #[must_use]
    pub fn with_auto_expiry(mut self, enabled: bool) -> Self {
        self.auto_expiry = enabled;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            scratch_dir: ".scratchpad".to_string(),
            file_prefix: "inplace-edit".to_string(),
            extension: "md".to_string(),
            placeholder: String::new(),
            expiry_check_interval_secs: 60,
            max_idle_secs: 300,
            auto_expiry: true,
        }
    }
}

/// Surface extraction settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Upper bound on waiting for a surface to initialize
    pub ready_timeout_ms: u64,
    /// Delay between extraction attempts
    pub poll_interval_ms: u64,
}

impl SurfaceConfig {
    /// Ready timeout
    #[inline]
    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Poll interval
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 2_000,
            poll_interval_ms: 25,
        }
    }
}

/// Health monitor thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// In-use resource age considered stale
    pub resource_stale_secs: u64,
    /// Session age considered stale
    pub session_stale_secs: u64,
    /// Idle time after which an unused resource is reported
    pub idle_notice_secs: u64,
    /// Error rate above which performance is flagged
    pub max_error_rate: f64,
    /// Rolling average latency above which performance is flagged
    pub max_avg_latency_ms: u64,
    /// Samples kept in the performance ledger
    pub ledger_capacity: usize,
}

impl HealthConfig {
    /// Resource staleness threshold
    #[inline]
    #[must_use]
    pub fn resource_stale(&self) -> Duration {
        Duration::from_secs(self.resource_stale_secs)
    }

    /// Session staleness threshold
    #[inline]
    #[must_use]
    pub fn session_stale(&self) -> Duration {
        Duration::from_secs(self.session_stale_secs)
    }

    /// Idle notice threshold
    #[inline]
    #[must_use]
    pub fn idle_notice(&self) -> Duration {
        Duration::from_secs(self.idle_notice_secs)
    }

    /// Latency threshold
    #[inline]
    #[must_use]
    pub fn max_avg_latency(&self) -> Duration {
        Duration::from_millis(self.max_avg_latency_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            resource_stale_secs: 300,
            session_stale_secs: 1_800,
            idle_notice_secs: 600,
            max_error_rate: 0.05,
            max_avg_latency_ms: 1_000,
            ledger_capacity: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EditorConfig::default();
        assert_eq!(config.strategy, StrategyKind::Persistent);
        assert_eq!(config.pool.expiry_check_interval(), Duration::from_secs(60));
        assert_eq!(config.pool.max_idle(), Duration::from_secs(300));
        assert_eq!(config.health.ledger_capacity, 100);
        assert!((config.health.max_error_rate - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn path_prefix_joins_directory() {
        let pool = PoolConfig::default();
        assert_eq!(pool.path_prefix(), ".scratchpad/inplace-edit");

        let bare = PoolConfig::default().with_scratch_dir("");
        assert_eq!(bare.path_prefix(), "inplace-edit");

        let trailing = PoolConfig::default().with_scratch_dir("tmp/");
        assert_eq!(trailing.path_prefix(), "tmp/inplace-edit");
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let json = r#"{ "strategy": "ephemeral", "pool": { "max_idle_secs": 30 } }"#;
        let config: EditorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.strategy, StrategyKind::Ephemeral);
        assert_eq!(config.pool.max_idle_secs, 30);
        assert_eq!(config.pool.expiry_check_interval_secs, 60);
        assert_eq!(config.surface, SurfaceConfig::default());
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let surface = SurfaceConfig {
            ready_timeout_ms: 0,
            poll_interval_ms: 0,
        };
        assert_eq!(surface.poll_interval(), Duration::from_millis(1));
        let pool = PoolConfig::default().with_expiry(0, 0);
        assert_eq!(pool.expiry_check_interval(), Duration::from_secs(1));
    }
}
