//! Bypass valve mode.

use super::SelectMode;
use crate::device::{
    CMD_BYPASS_AUTO, CMD_BYPASS_OFF, CMD_BYPASS_ON, CommandId, SENSOR_BYPASS_ACTIVATIONSTATE,
    SensorId,
};
use strum::{Display, EnumString, FromRepr, IntoStaticStr, VariantNames};

/// Bypass activation state as reported by sensor 66.
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
pub enum BypassMode {
    Auto = 0,
    On = 1,
    Off = 2,
}

impl SelectMode for BypassMode {
    const SENSOR: SensorId = SENSOR_BYPASS_ACTIVATIONSTATE;
    const NAME_SUFFIX: &'static str = "bypass";
    const UNIQUE_ID_SUFFIX: &'static str = "bypass";
    const ICON: &'static str = "mdi:arrow-decision-auto";

    fn from_state_code(code: i64) -> Option<Self> {
        u8::try_from(code).ok().and_then(Self::from_repr)
    }

    fn command(self) -> CommandId {
        match self {
            BypassMode::Auto => CMD_BYPASS_AUTO,
            BypassMode::On => CMD_BYPASS_ON,
            BypassMode::Off => CMD_BYPASS_OFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_ordered_by_state_code() {
        assert_eq!(BypassMode::options(), &["auto", "on", "off"]);
        for (code, option) in BypassMode::options().iter().enumerate() {
            let mode = BypassMode::from_state_code(code as i64).unwrap();
            assert_eq!(mode.option(), *option);
        }
    }

    #[test]
    fn test_state_codes_outside_table() {
        assert_eq!(BypassMode::from_state_code(3), None);
        assert_eq!(BypassMode::from_state_code(-1), None);
        assert_eq!(BypassMode::from_state_code(256), None);
    }

    #[test]
    fn test_commands() {
        assert_eq!(BypassMode::Auto.command(), CMD_BYPASS_AUTO);
        assert_eq!(BypassMode::On.command(), CMD_BYPASS_ON);
        assert_eq!(BypassMode::Off.command(), CMD_BYPASS_OFF);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(BypassMode::from_option("on"), Some(BypassMode::On));
        assert_eq!(BypassMode::from_option("ON"), None);
        assert_eq!(BypassMode::from_option("warm"), None);
    }
}
