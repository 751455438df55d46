//! MQTT side of the bridge: ComfoConnect gateway updates in, Home Assistant
//! select entities out.

mod client;
mod discovery;
mod integration;

pub use client::{MqttClient, MqttEvent, MqttMessage};
pub use discovery::{HostTopics, PAYLOAD_OFFLINE, PAYLOAD_ONLINE, SelectDiscovery};
pub use integration::{MqttIntegration, Route, Router, availability_will};
