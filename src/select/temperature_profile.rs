//! Temperature profile mode.

use super::SelectMode;
use crate::device::{
    CMD_TEMPPROF_COOL, CMD_TEMPPROF_NORMAL, CMD_TEMPPROF_WARM, CommandId,
    SENSOR_PROFILE_TEMPERATURE, SensorId,
};
use strum::{Display, EnumString, FromRepr, IntoStaticStr, VariantNames};

/// Temperature profile as reported by sensor 67.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    FromRepr,
    IntoStaticStr,
    VariantNames,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum TemperatureProfile {
    Normal = 0,
    Cold = 1,
    Warm = 2,
}

impl SelectMode for TemperatureProfile {
    const SENSOR: SensorId = SENSOR_PROFILE_TEMPERATURE;
    const NAME_SUFFIX: &'static str = "temperature profile";
    const UNIQUE_ID_SUFFIX: &'static str = "temperature_profile";
    const ICON: &'static str = "mdi:thermometer-minus";

    fn from_state_code(code: i64) -> Option<Self> {
        u8::try_from(code).ok().and_then(Self::from_repr)
    }

    fn command(self) -> CommandId {
        match self {
            TemperatureProfile::Normal => CMD_TEMPPROF_NORMAL,
            TemperatureProfile::Cold => CMD_TEMPPROF_COOL,
            TemperatureProfile::Warm => CMD_TEMPPROF_WARM,
        }
    }
}
