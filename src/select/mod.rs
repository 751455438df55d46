//! Select entities for ComfoAir operating modes.
//!
//! Each controllable mode is a closed enum implementing [`SelectMode`]. The
//! enum is the whole per-mode configuration: its discriminants are the
//! device state codes, its lowercase variant names are the options shown to
//! the user, and `command()` maps a choice to the device instruction.
//! [`ModeEntity`] is the one generic entity driving any such mode.

pub mod bypass;
pub mod entity;
pub mod temperature_profile;

pub use bypass::BypassMode;
pub use entity::ModeEntity;
pub use temperature_profile::TemperatureProfile;

use crate::device::{CommandId, SensorId};
use crate::error::Result;
use crate::updates::{RenderNotifier, UpdateChannel};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use strum::VariantNames;

pub type BypassEntity = ModeEntity<BypassMode>;
pub type TemperatureProfileEntity = ModeEntity<TemperatureProfile>;

/// Static description of one device operating mode.
pub trait SelectMode:
    Copy
    + Eq
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Into<&'static str>
    + VariantNames
    + Send
    + Sync
    + 'static
{
    /// Sensor reporting the current state code.
    const SENSOR: SensorId;
    /// Appended to the bridge name to form the display name.
    const NAME_SUFFIX: &'static str;
    /// Appended to the bridge unique id.
    const UNIQUE_ID_SUFFIX: &'static str;
    const ICON: &'static str;

    /// Decode a device state code. `None` for codes outside the table.
    fn from_state_code(code: i64) -> Option<Self>;

    /// Device instruction selecting this mode.
    fn command(self) -> CommandId;

    /// Selectable options, ordered by state code.
    fn options() -> &'static [&'static str] {
        Self::VARIANTS
    }

    fn from_option(option: &str) -> Option<Self> {
        option.parse().ok()
    }

    fn option(self) -> &'static str {
        self.into()
    }
}

/// Host-facing view of a select entity.
///
/// Object safe so the host adapter can drive every mode through
/// `Arc<dyn SelectEntity>`.
#[async_trait]
pub trait SelectEntity: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn unique_id(&self) -> &str;

    fn icon(&self) -> &'static str;

    fn sensor(&self) -> SensorId;

    /// Fixed, ordered option list.
    fn options(&self) -> &'static [&'static str];

    /// Current option, `None` until the first valid update arrives.
    fn current_option(&self) -> Option<&'static str>;

    /// Wire the entity to the host's re-render signal.
    fn set_render_notifier(&self, notifier: RenderNotifier);

    /// Subscribe to the entity's sensor and register it with the device.
    ///
    /// Runs once per entity; later calls are no-ops. Registration errors
    /// are returned unchanged and leave the state unknown.
    async fn activate(self: Arc<Self>, channel: &UpdateChannel) -> Result<()>;

    /// Send the command for `choice`. The displayed option only changes
    /// once the device reports the new state.
    async fn select_option(&self, choice: &str) -> Result<()>;
}
