//! DeviceLink over a ComfoConnect MQTT gateway.
//!
//! The gateway owns the actual LAN session with the unit. This side only
//! publishes register/command requests and reads back `{prefix}/sensor/{id}`.

use super::{CommandId, DeviceLink, SensorId};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use log::debug;
use rumqttc::{AsyncClient, QoS};
use serde::{Deserialize, Serialize};

/// Payload of `{prefix}/register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub sensor: SensorId,
}

/// Payload of `{prefix}/command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: CommandId,
}

/// Topic layout of the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayTopics {
    prefix: String,
}

impl GatewayTopics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sensor_topic(&self, sensor: SensorId) -> String {
        format!("{}/sensor/{}", self.prefix, sensor)
    }

    /// Wildcard filter matching every sensor topic.
    pub fn sensor_filter(&self) -> String {
        format!("{}/sensor/+", self.prefix)
    }

    pub fn register_topic(&self) -> String {
        format!("{}/register", self.prefix)
    }

    pub fn command_topic(&self) -> String {
        format!("{}/command", self.prefix)
    }

    /// Extract the sensor id from a `{prefix}/sensor/{id}` topic.
    pub fn parse_sensor_topic(&self, topic: &str) -> Option<SensorId> {
        let id = topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix("/sensor/")?;
        id.parse().ok().map(SensorId)
    }
}

/// Sensor values are published as decimal text; some gateways send floats
/// with a zero fraction (`"1.0"`).
pub fn parse_sensor_value(payload: &str) -> Option<i64> {
    let payload = payload.trim();
    if let Ok(value) = payload.parse::<i64>() {
        return Some(value);
    }
    let value = payload.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value.is_finite()).then_some(value as i64)
}

/// [`DeviceLink`] publishing requests to the gateway.
#[derive(Clone)]
pub struct MqttDeviceLink {
    client: AsyncClient,
    topics: GatewayTopics,
}

impl MqttDeviceLink {
    pub fn new(client: AsyncClient, topics: GatewayTopics) -> Self {
        Self { client, topics }
    }

    async fn publish_json<T: Serialize>(&self, topic: &str, payload: &T) -> Result<()> {
        let payload = serde_json::to_vec(payload)?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }
}

#[async_trait]
impl DeviceLink for MqttDeviceLink {
    async fn register_sensor(&self, sensor: SensorId) -> Result<()> {
        debug!("[MQTT] Registering sensor {}", sensor);
        self.publish_json(&self.topics.register_topic(), &RegisterRequest { sensor })
            .await
    }

    async fn send_command(&self, command: CommandId) -> Result<()> {
        debug!("[MQTT] Sending command {}", command);
        self.publish_json(&self.topics.command_topic(), &CommandRequest { command })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        let topics = GatewayTopics::new("comfoconnect");
        assert_eq!(topics.sensor_topic(SensorId(66)), "comfoconnect/sensor/66");
        assert_eq!(topics.sensor_filter(), "comfoconnect/sensor/+");
        assert_eq!(topics.register_topic(), "comfoconnect/register");
        assert_eq!(topics.command_topic(), "comfoconnect/command");
    }

    #[test]
    fn test_parse_sensor_topic() {
        let topics = GatewayTopics::new("comfoconnect");
        assert_eq!(
            topics.parse_sensor_topic("comfoconnect/sensor/67"),
            Some(SensorId(67))
        );
        assert_eq!(topics.parse_sensor_topic("comfoconnect/sensor/abc"), None);
        assert_eq!(topics.parse_sensor_topic("other/sensor/67"), None);
        assert_eq!(topics.parse_sensor_topic("comfoconnect/command"), None);
    }

    #[test]
    fn test_parse_sensor_value() {
        assert_eq!(parse_sensor_value("2"), Some(2));
        assert_eq!(parse_sensor_value(" 1\n"), Some(1));
        assert_eq!(parse_sensor_value("1.0"), Some(1));
        assert_eq!(parse_sensor_value("1.5"), None);
        assert_eq!(parse_sensor_value("on"), None);
    }

    #[test]
    fn test_request_payloads() {
        let json = serde_json::to_string(&RegisterRequest {
            sensor: SensorId(66),
        })
        .unwrap();
        assert_eq!(json, r#"{"sensor":66}"#);

        let request: CommandRequest = serde_json::from_str(r#"{"command":288}"#).unwrap();
        assert_eq!(request.command, CommandId(0x0120));
    }
}
