use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parse `.env` content into key/value pairs.
///
/// Values may contain spaces without quotes; one pair of surrounding quotes
/// is stripped. Blank lines, comments and lines without `=` are skipped.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Load environment variables from a `.env` file in the working directory.
/// Variables already set in the environment win.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    let Ok(content) = fs::read_to_string(env_path) else {
        return;
    };

    for (key, value) in parse_dotenv(&content) {
        if std::env::var(&key).is_err() {
            // SAFETY: called from main before the tokio runtime starts any threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub bridge: BridgeConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// The ComfoConnect unit exposed by this bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Display name prefix for every entity
    pub name: String,
    /// Unique id prefix for every entity
    pub unique_id: String,
    /// Topic prefix of the ComfoConnect MQTT gateway
    pub topic_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Home Assistant MQTT discovery prefix
    pub prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "comfoconnect-select".to_string(),
                username: None,
                password: None,
            },
            bridge: BridgeConfig {
                name: "ComfoAirQ".to_string(),
                unique_id: "comfoairq".to_string(),
                topic_prefix: "comfoconnect".to_string(),
            },
            discovery: DiscoveryConfig {
                prefix: "homeassistant".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from defaults overridden by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = lookup("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Some(username) = lookup("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }

        if let Some(name) = lookup("COMFOCONNECT_NAME") {
            config.bridge.name = name;
        }
        if let Some(unique_id) = lookup("COMFOCONNECT_UNIQUE_ID") {
            config.bridge.unique_id = unique_id;
        }
        if let Some(prefix) = lookup("COMFOCONNECT_TOPIC_PREFIX") {
            config.bridge.topic_prefix = prefix;
        }

        if let Some(prefix) = lookup("HA_DISCOVERY_PREFIX") {
            config.discovery.prefix = prefix;
        }

        config
    }

    /// Reject values that would produce broken topics or ids.
    pub fn validate(&self) -> Result<()> {
        let topic_parts = [
            ("COMFOCONNECT_TOPIC_PREFIX", &self.bridge.topic_prefix),
            ("HA_DISCOVERY_PREFIX", &self.discovery.prefix),
            ("COMFOCONNECT_UNIQUE_ID", &self.bridge.unique_id),
        ];
        for (key, value) in topic_parts {
            if value.is_empty() {
                return Err(BridgeError::InvalidConfig(format!("{key} must not be empty")));
            }
            if value.contains(['+', '#']) {
                return Err(BridgeError::InvalidConfig(format!(
                    "{key} must not contain MQTT wildcards: {value}"
                )));
            }
        }
        if self.bridge.unique_id.contains('/') {
            return Err(BridgeError::InvalidConfig(format!(
                "COMFOCONNECT_UNIQUE_ID must not contain '/': {}",
                self.bridge.unique_id
            )));
        }
        Ok(())
    }
}
