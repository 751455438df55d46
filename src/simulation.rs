//! Simulated ComfoConnect unit for development without hardware.
//!
//! Keeps one state code per mode sensor, answers registrations with the
//! current code and applies commands the way the real unit reports them:
//! as a later push on the mode's sensor.

use crate::device::{CommandId, SensorId};
use crate::select::{BypassMode, SelectMode, TemperatureProfile};
use std::collections::BTreeMap;

/// A single sensor push from the simulated unit.
pub type SensorPush = (SensorId, i64);

/// In-memory ComfoAir unit.
#[derive(Debug, Clone)]
pub struct SimulatedUnit {
    states: BTreeMap<SensorId, i64>,
}

impl Default for SimulatedUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedUnit {
    /// Unit in bypass `auto` and temperature profile `normal`.
    pub fn new() -> Self {
        let mut states = BTreeMap::new();
        states.insert(BypassMode::SENSOR, BypassMode::Auto as i64);
        states.insert(TemperatureProfile::SENSOR, TemperatureProfile::Normal as i64);
        Self { states }
    }

    pub fn state(&self, sensor: SensorId) -> Option<i64> {
        self.states.get(&sensor).copied()
    }

    /// Current value to push after `sensor` was registered.
    pub fn register(&self, sensor: SensorId) -> Option<SensorPush> {
        self.state(sensor).map(|code| (sensor, code))
    }

    /// Apply a command. Returns the push it causes, `None` when the unit
    /// does not know the command.
    pub fn apply(&mut self, command: CommandId) -> Option<SensorPush> {
        let (sensor, code) =
            resolve::<BypassMode>(command).or_else(|| resolve::<TemperatureProfile>(command))?;
        self.states.insert(sensor, code);
        Some((sensor, code))
    }

    /// Move the bypass to its next state, as the unit does on its own in
    /// `auto`.
    pub fn drift_bypass(&mut self) -> SensorPush {
        let sensor = BypassMode::SENSOR;
        let count = BypassMode::options().len() as i64;
        let code = self.state(sensor).map_or(0, |code| (code + 1) % count);
        self.states.insert(sensor, code);
        (sensor, code)
    }
}

/// Find the state code a command of mode `M` leads to.
fn resolve<M: SelectMode>(command: CommandId) -> Option<SensorPush> {
    (0..M::options().len() as i64)
        .filter_map(|code| M::from_state_code(code).map(|mode| (code, mode)))
        .find(|(_, mode)| mode.command() == command)
        .map(|(code, _)| (M::SENSOR, code))
}
