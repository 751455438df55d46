use crate::device::SensorId;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Unknown state code {code} for sensor {sensor}")]
    UnknownStateCode { sensor: SensorId, code: i64 },

    #[error("Invalid selection '{choice}' for {entity} (options: {options:?})")]
    InvalidSelection {
        entity: String,
        choice: String,
        options: &'static [&'static str],
    },

    #[error("Device transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Mqtt(#[from] rumqttc::ClientError),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
