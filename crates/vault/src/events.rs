//! Audit log collaborator and the change-event channel (spec §6): the engine
//! never decides how an event is displayed or stored, only what happened and
//! when.

use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCategory {
    Security,
    Vault,
    Auth,
    Sync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub timestamp: OffsetDateTime,
    pub category: AuditCategory,
    pub level: AuditLevel,
    pub message: String,
}

/// Receives every structured event the engine emits at key-lifecycle and
/// mutation boundaries. The crate ships no concrete sink (file, syslog,
/// remote) — callers plug one in.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// An `AuditSink` that forwards every event through `tracing`, matching how
/// the rest of the crate logs.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let category = match event.category {
            AuditCategory::Security => "security",
            AuditCategory::Vault => "vault",
            AuditCategory::Auth => "auth",
            AuditCategory::Sync => "sync",
        };
        match event.level {
            AuditLevel::Info => tracing::info!(category, "{}", event.message),
            AuditLevel::Warning => tracing::warn!(category, "{}", event.message),
            AuditLevel::Error => tracing::error!(category, "{}", event.message),
        }
    }
}

/// The four state changes a UI can subscribe to without polling the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Unlocked,
    Locked,
    ItemsChanged,
    SyncStatusChanged,
}

/// Thin wrapper over a broadcast channel; `subscribe` is cheap and may be
/// called by any number of observers, each getting every event from the
/// point they subscribed.
#[derive(Clone)]
pub struct ChangeEventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeEventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        Self { sender }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // No active subscribers is a normal state (e.g. headless CLI use),
        // not an error.
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Bundles the audit sink and the change-event bus the engine writes to, so
/// engine constructors take one argument instead of two.
#[derive(Clone)]
pub struct EventSinks {
    pub audit: Arc<dyn AuditSink>,
    pub changes: ChangeEventBus,
}

impl EventSinks {
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            audit,
            changes: ChangeEventBus::new(),
        }
    }

    pub fn audit(&self, category: AuditCategory, level: AuditLevel, message: impl Into<String>) {
        self.audit.record(AuditEvent {
            timestamp: OffsetDateTime::now_utc(),
            category,
            level,
            message: message.into(),
        });
    }

    pub fn notify(&self, event: ChangeEvent) {
        self.changes.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CollectingSink(Mutex<Vec<AuditEvent>>);

    impl AuditSink for CollectingSink {
        fn record(&self, event: AuditEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn audit_records_category_and_level() {
        let sink = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let sinks = EventSinks::new(sink.clone());
        sinks.audit(AuditCategory::Vault, AuditLevel::Info, "unlocked");
        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, AuditCategory::Vault);
        assert_eq!(events[0].message, "unlocked");
    }

    #[tokio::test]
    async fn subscribers_receive_published_change_events() {
        let bus = ChangeEventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(ChangeEvent::Unlocked);
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::Unlocked);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = ChangeEventBus::new();
        bus.publish(ChangeEvent::Locked);
    }
}
