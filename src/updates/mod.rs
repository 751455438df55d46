//! Push-based sensor updates.
//!
//! Sensor values coming from the device are fanned out to subscribers keyed
//! by [`SensorId`](crate::device::SensorId). Entities that changed state
//! signal the host through a [`RenderNotifier`].

pub mod channel;
pub mod notifier;

pub use channel::{Subscription, UpdateChannel};
pub use notifier::RenderNotifier;
