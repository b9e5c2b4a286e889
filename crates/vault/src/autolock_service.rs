//! Background poller that drives the engine's idle-timeout lock (spec §5).

use crate::autolock::{ActivityTracker, AutoLockConfig};
use async_trait::async_trait;
use std::sync::Arc;
use time::Duration;
use tokio::sync::RwLock;
use tokio::time::{Duration as TokioDuration, sleep};
use tracing::{debug, info, warn};

#[async_trait]
pub trait AutoLockCallback: Send + Sync {
    async fn on_auto_lock(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub struct AutoLockService {
    pub activity_tracker: ActivityTracker,
    callback: Arc<dyn AutoLockCallback>,
    is_running: Arc<RwLock<bool>>,
}

impl AutoLockService {
    #[must_use]
    pub fn new(config: AutoLockConfig, callback: Arc<dyn AutoLockCallback>) -> Self {
        Self {
            activity_tracker: ActivityTracker::new(config),
            callback,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> tokio::task::JoinHandle<()> {
        let activity_tracker = self.activity_tracker.clone();
        let callback = Arc::clone(&self.callback);
        let is_running = Arc::clone(&self.is_running);

        *is_running.write().await = true;

        tokio::spawn(async move {
            let check_interval = TokioDuration::from_secs(activity_tracker.config().check_interval_seconds);

            info!("auto-lock service started");

            while *is_running.read().await {
                if activity_tracker.should_auto_lock().await {
                    info!("auto-lock triggered due to inactivity");

                    match callback.on_auto_lock().await {
                        Ok(()) => debug!("auto-lock callback executed successfully"),
                        Err(e) => warn!("auto-lock callback failed: {e}"),
                    }

                    // Reset activity so the callback's own work doesn't
                    // immediately re-trigger the next iteration.
                    activity_tracker.record_activity().await;
                }

                sleep(check_interval).await;
            }

            info!("auto-lock service stopped");
        })
    }

    pub async fn stop(&self) {
        *self.is_running.write().await = false;
    }

    pub async fn record_activity(&self) {
        self.activity_tracker.record_activity().await;
    }

    pub async fn time_until_lock(&self) -> Option<Duration> {
        self.activity_tracker.time_until_lock().await
    }

    pub async fn is_enabled(&self) -> bool {
        self.activity_tracker.config().enabled
    }
}
