//! ComfoConnect device identifiers and the link used to talk to the unit.
//!
//! The wire protocol itself lives behind the [`DeviceLink`] trait. Entities
//! only ever hand it opaque sensor and command ids.

mod mqtt_link;

pub use mqtt_link::{
    CommandRequest, GatewayTopics, MqttDeviceLink, RegisterRequest, parse_sensor_value,
};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a device-reported quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(pub u16);

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a device-accepted instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub u16);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Bypass activation state (0 = auto, 1 = on, 2 = off)
pub const SENSOR_BYPASS_ACTIVATIONSTATE: SensorId = SensorId(66);
/// Temperature profile (0 = normal, 1 = cold, 2 = warm)
pub const SENSOR_PROFILE_TEMPERATURE: SensorId = SensorId(67);

pub const CMD_BYPASS_AUTO: CommandId = CommandId(0x0110);
pub const CMD_BYPASS_ON: CommandId = CommandId(0x0111);
pub const CMD_BYPASS_OFF: CommandId = CommandId(0x0112);

pub const CMD_TEMPPROF_NORMAL: CommandId = CommandId(0x0120);
pub const CMD_TEMPPROF_COOL: CommandId = CommandId(0x0121);
pub const CMD_TEMPPROF_WARM: CommandId = CommandId(0x0122);

/// Connection to a ComfoConnect unit.
///
/// A single link is shared by every entity of a bridge, so implementations
/// must accept concurrent calls. Neither call retries; failures come back
/// as [`BridgeError::Transport`](crate::error::BridgeError::Transport).
#[async_trait]
pub trait DeviceLink: Send + Sync + 'static {
    /// Ask the device to start pushing values for `sensor`.
    ///
    /// May wait on network I/O, so callers keep it off the update path.
    async fn register_sensor(&self, sensor: SensorId) -> Result<()>;

    /// Send an instruction to the device. Fire-and-forget: the resulting
    /// state change, if any, arrives later as a sensor update.
    async fn send_command(&self, command: CommandId) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::BridgeError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// DeviceLink double that records every call.
    #[derive(Default)]
    pub struct RecordingLink {
        pub registered: Mutex<Vec<SensorId>>,
        pub commands: Mutex<Vec<CommandId>>,
        pub fail: AtomicBool,
    }

    impl RecordingLink {
        pub fn failing() -> Self {
            let link = Self::default();
            link.fail.store(true, Ordering::SeqCst);
            link
        }

        pub fn registered(&self) -> Vec<SensorId> {
            self.registered.lock().clone()
        }

        pub fn commands(&self) -> Vec<CommandId> {
            self.commands.lock().clone()
        }
    }

    #[async_trait]
    impl DeviceLink for RecordingLink {
        async fn register_sensor(&self, sensor: SensorId) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BridgeError::Transport("gateway unreachable".into()));
            }
            self.registered.lock().push(sensor);
            Ok(())
        }

        async fn send_command(&self, command: CommandId) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BridgeError::Transport("gateway unreachable".into()));
            }
            self.commands.lock().push(command);
            Ok(())
        }
    }
}
