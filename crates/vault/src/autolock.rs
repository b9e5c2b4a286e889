//! Idle-timeout tracking (spec §5): each user-originated call into the
//! engine resets the clock; once the configured timeout elapses with no
//! activity, the engine locks itself.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoLockConfig {
    pub enabled: bool,
    pub idle_timeout_seconds: u64,
    pub check_interval_seconds: u64,
}

impl Default for AutoLockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_timeout_seconds: 300,
            check_interval_seconds: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActivityTracker {
    last_activity: Arc<RwLock<OffsetDateTime>>,
    config: AutoLockConfig,
}

impl ActivityTracker {
    #[must_use]
    pub fn new(config: AutoLockConfig) -> Self {
        Self {
            last_activity: Arc::new(RwLock::new(OffsetDateTime::now_utc())),
            config,
        }
    }

    pub async fn record_activity(&self) {
        let mut last_activity = self.last_activity.write().await;
        *last_activity = OffsetDateTime::now_utc();
    }

    pub async fn last_activity(&self) -> OffsetDateTime {
        *self.last_activity.read().await
    }

    #[allow(clippy::cast_possible_wrap)]
    pub async fn should_auto_lock(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let idle_for = OffsetDateTime::now_utc() - self.last_activity().await;
        idle_for > Duration::seconds(self.config.idle_timeout_seconds as i64)
    }

    #[must_use]
    pub const fn config(&self) -> &AutoLockConfig {
        &self.config
    }

    #[allow(clippy::cast_possible_wrap)]
    pub async fn time_until_lock(&self) -> Option<Duration> {
        if !self.config.enabled {
            return None;
        }
        let timeout = Duration::seconds(self.config.idle_timeout_seconds as i64);
        let idle_for = OffsetDateTime::now_utc() - self.last_activity().await;
        if idle_for >= timeout {
            Some(Duration::ZERO)
        } else {
            Some(timeout - idle_for)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(idle_timeout_seconds: u64) -> AutoLockConfig {
        AutoLockConfig {
            enabled: true,
            idle_timeout_seconds,
            check_interval_seconds: 1,
        }
    }

    #[tokio::test]
    async fn fresh_tracker_does_not_auto_lock() {
        let tracker = ActivityTracker::new(config(300));
        assert!(!tracker.should_auto_lock().await);
    }

    #[tokio::test]
    async fn disabled_tracker_never_auto_locks() {
        let mut cfg = config(0);
        cfg.enabled = false;
        let tracker = ActivityTracker::new(cfg);
        assert!(!tracker.should_auto_lock().await);
        assert_eq!(tracker.time_until_lock().await, None);
    }

    #[tokio::test]
    async fn zero_timeout_locks_immediately() {
        let tracker = ActivityTracker::new(config(0));
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(tracker.should_auto_lock().await);
    }

    #[tokio::test]
    async fn record_activity_resets_the_clock() {
        let tracker = ActivityTracker::new(config(10));
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        tracker.record_activity().await;
        assert!(!tracker.should_auto_lock().await);
    }
}
