//! Publish/subscribe bus for sensor values.
//!
//! Every subscriber owns a queue and a delivery task, so values reach one
//! subscriber in publish order and a slow callback never holds up the
//! publisher or other subscribers.

use crate::device::SensorId;
use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Callback invoked with each value pushed for a sensor.
type UpdateCallback = Arc<dyn Fn(i64) + Send + Sync>;

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<i64>,
}

#[derive(Default)]
struct Inner {
    subscribers: RwLock<HashMap<SensorId, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl Inner {
    fn remove(&self, sensor: SensorId, id: u64) {
        let mut subscribers = self.subscribers.write();
        if let Some(list) = subscribers.get_mut(&sensor) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                subscribers.remove(&sensor);
            }
        }
    }
}

/// Sensor update bus keyed by [`SensorId`].
///
/// Cheap to clone; clones share the same subscriber table.
#[derive(Clone, Default)]
pub struct UpdateChannel {
    inner: Arc<Inner>,
}

impl UpdateChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback` to values of `sensor`.
    ///
    /// Spawns the delivery task on the current tokio runtime. Dropping the
    /// returned [`Subscription`] unsubscribes; values already queued are
    /// still delivered.
    pub fn subscribe<F>(&self, sensor: SensorId, callback: F) -> Subscription
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        let callback: UpdateCallback = Arc::new(callback);
        let (tx, mut rx) = mpsc::unbounded_channel::<i64>();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            while let Some(value) = rx.recv().await {
                callback(value);
            }
        });

        self.inner
            .subscribers
            .write()
            .entry(sensor)
            .or_default()
            .push(Subscriber { id, tx });
        debug!("[Updates] Subscriber {} added for sensor {}", id, sensor);

        Subscription {
            sensor,
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Push a value to every subscriber of `sensor`.
    ///
    /// Returns the number of subscribers the value was queued for.
    pub fn publish(&self, sensor: SensorId, value: i64) -> usize {
        let mut subscribers = self.inner.subscribers.write();
        let Some(list) = subscribers.get_mut(&sensor) else {
            debug!("[Updates] No subscriber for sensor {} (value {})", sensor, value);
            return 0;
        };

        list.retain(|s| {
            let alive = s.tx.send(value).is_ok();
            if !alive {
                warn!(
                    "[Updates] Dropping dead subscriber {} for sensor {}",
                    s.id, sensor
                );
            }
            alive
        });
        let delivered = list.len();
        if list.is_empty() {
            subscribers.remove(&sensor);
        }
        delivered
    }

    /// Number of live subscriptions for `sensor`.
    pub fn subscriber_count(&self, sensor: SensorId) -> usize {
        self.inner
            .subscribers
            .read()
            .get(&sensor)
            .map_or(0, Vec::len)
    }
}

/// Handle of one subscription. Unsubscribes on drop.
pub struct Subscription {
    sensor: SensorId,
    id: u64,
    inner: Weak<Inner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove(self.sensor, self.id);
            debug!(
                "[Updates] Subscriber {} removed for sensor {}",
                self.id, self.sensor
            );
        }
    }
}
