//! Home Assistant MQTT discovery for select entities.

use crate::select::SelectEntity;
use serde::Serialize;

pub const PAYLOAD_ONLINE: &str = "online";
pub const PAYLOAD_OFFLINE: &str = "offline";

/// Topic layout on the Home Assistant side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTopics {
    base: String,
    discovery_prefix: String,
}

impl HostTopics {
    pub fn new(base: impl Into<String>, discovery_prefix: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            discovery_prefix: discovery_prefix.into(),
        }
    }

    pub fn config_topic(&self, unique_id: &str) -> String {
        format!("{}/select/{}/config", self.discovery_prefix, unique_id)
    }

    pub fn state_topic(&self, unique_id: &str) -> String {
        format!("{}/select/{}/state", self.base, unique_id)
    }

    pub fn command_topic(&self, unique_id: &str) -> String {
        format!("{}/select/{}/set", self.base, unique_id)
    }

    /// Wildcard filter matching every command topic.
    pub fn command_filter(&self) -> String {
        format!("{}/select/+/set", self.base)
    }

    pub fn availability_topic(&self) -> String {
        format!("{}/status", self.base)
    }

    /// Extract the entity unique id from a command topic.
    pub fn parse_command_topic<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let unique_id = topic
            .strip_prefix(self.base.as_str())?
            .strip_prefix("/select/")?
            .strip_suffix("/set")?;
        (!unique_id.is_empty() && !unique_id.contains('/')).then_some(unique_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

/// Discovery payload of one select entity.
#[derive(Debug, Clone, Serialize)]
pub struct SelectDiscovery {
    pub name: String,
    pub unique_id: String,
    pub icon: &'static str,
    pub options: &'static [&'static str],
    pub state_topic: String,
    pub command_topic: String,
    pub availability_topic: String,
    pub device: DeviceInfo,
}

impl SelectDiscovery {
    pub fn new(
        entity: &dyn SelectEntity,
        topics: &HostTopics,
        bridge_id: &str,
        bridge_name: &str,
    ) -> Self {
        Self {
            name: entity.name().to_string(),
            unique_id: entity.unique_id().to_string(),
            icon: entity.icon(),
            options: entity.options(),
            state_topic: topics.state_topic(entity.unique_id()),
            command_topic: topics.command_topic(entity.unique_id()),
            availability_topic: topics.availability_topic(),
            device: DeviceInfo {
                identifiers: vec![bridge_id.to_string()],
                name: bridge_name.to_string(),
                manufacturer: "Zehnder",
                model: "ComfoAir Q",
            },
        }
    }
}
