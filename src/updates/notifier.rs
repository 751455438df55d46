//! Re-render notifier for entity state changes.
//!
//! When an entity adopts a new mode it needs to tell the host so the
//! displayed state gets refreshed right away instead of on the next poll.

use std::sync::Arc;
use tokio::sync::Notify;

/// Requests a re-render of one entity's displayed state.
///
/// This is the bridge between entities and the host adapter. The entity
/// calls `notify()`; the host task waiting in `notified()` wakes up and
/// publishes the current state.
///
/// Notifications coalesce: several `notify()` calls before the host wakes
/// result in a single render of the latest state.
///
/// # Usage
/// ```ignore
/// // Host renderer task, one per entity:
/// loop {
///     tokio::select! {
///         _ = shutdown.cancelled() => break,
///         _ = notifier.notified() => publish_state(&entity),
///     }
/// }
/// ```
#[derive(Clone)]
pub struct RenderNotifier {
    signal: Arc<Notify>,
    unique_id: Arc<str>,
}

impl RenderNotifier {
    /// Create a new notifier for the entity with the given unique id.
    pub fn new(unique_id: impl Into<Arc<str>>) -> Self {
        Self {
            signal: Arc::new(Notify::new()),
            unique_id: unique_id.into(),
        }
    }

    /// Unique id of the entity this notifier belongs to.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Request a re-render. Non-blocking.
    pub fn notify(&self) {
        self.signal.notify_one();
    }

    /// Wait until a re-render has been requested.
    pub async fn notified(&self) {
        self.signal.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_notify_before_wait_is_not_lost() {
        let notifier = RenderNotifier::new("comfoair_bypass");
        notifier.notify();

        tokio::time::timeout(Duration::from_secs(1), notifier.notified())
            .await
            .expect("pending notification should wake the waiter");
    }

    #[tokio::test]
    async fn test_notifications_coalesce() {
        let notifier = RenderNotifier::new("comfoair_bypass");
        notifier.notify();
        notifier.notify();

        notifier.notified().await;
        let second = tokio::time::timeout(Duration::from_millis(50), notifier.notified()).await;
        assert!(second.is_err());
    }

    #[test]
    fn test_unique_id() {
        let notifier = RenderNotifier::new("comfoair_temperature_profile");
        assert_eq!(notifier.unique_id(), "comfoair_temperature_profile");
    }
}
