//! MQTT integration orchestrator.
//!
//! One MQTT connection carries both sides of the bridge:
//! - gateway sensor topics are fed into the [`UpdateChannel`]
//! - select entities are announced to Home Assistant, their state is
//!   published on every re-render, and command topics are routed to
//!   [`SelectEntity::select_option`].

use super::client::{MqttClient, MqttEvent, MqttMessage};
use super::discovery::{HostTopics, PAYLOAD_OFFLINE, PAYLOAD_ONLINE, SelectDiscovery};
use crate::config::Config;
use crate::device::{GatewayTopics, SensorId, parse_sensor_value};
use crate::error::Result;
use crate::select::SelectEntity;
use crate::updates::{RenderNotifier, UpdateChannel};
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, LastWill, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Where an incoming message has to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    SensorValue { sensor: SensorId, value: i64 },
    Selection { unique_id: &'a str, choice: &'a str },
    Ignored,
}

/// Maps incoming topics to gateway updates or user selections.
#[derive(Debug, Clone)]
pub struct Router {
    gateway: GatewayTopics,
    host: HostTopics,
}

impl Router {
    pub fn new(gateway: GatewayTopics, host: HostTopics) -> Self {
        Self { gateway, host }
    }

    pub fn route<'a>(&self, msg: &'a MqttMessage) -> Route<'a> {
        if let Some(sensor) = self.gateway.parse_sensor_topic(&msg.topic) {
            return match parse_sensor_value(&msg.payload) {
                Some(value) => Route::SensorValue { sensor, value },
                None => {
                    warn!(
                        "[MQTT] Non-integer value for sensor {}: {:?}",
                        sensor, msg.payload
                    );
                    Route::Ignored
                }
            };
        }
        if let Some(unique_id) = self.host.parse_command_topic(&msg.topic) {
            return Route::Selection {
                unique_id,
                choice: msg.payload.trim(),
            };
        }
        Route::Ignored
    }

    /// Topics to (re)subscribe after each connection.
    pub fn subscriptions(&self) -> Vec<String> {
        vec![self.gateway.sensor_filter(), self.host.command_filter()]
    }
}

/// Last will marking every entity unavailable when the bridge drops off.
pub fn availability_will(config: &Config) -> LastWill {
    let topics = HostTopics::new(&config.bridge.topic_prefix, &config.discovery.prefix);
    LastWill::new(
        topics.availability_topic(),
        PAYLOAD_OFFLINE,
        QoS::AtLeastOnce,
        true,
    )
}

/// MQTT Integration orchestrator.
///
/// Owns the update channel and the select entities, keeping MQTT internals
/// out of main.rs.
pub struct MqttIntegration {
    config: Config,
    channel: UpdateChannel,
    entities: Vec<Arc<dyn SelectEntity>>,
    router: Router,
    host: HostTopics,
    tracker: TaskTracker,
}

impl MqttIntegration {
    pub fn new(config: Config) -> Self {
        let gateway = GatewayTopics::new(&config.bridge.topic_prefix);
        let host = HostTopics::new(&config.bridge.topic_prefix, &config.discovery.prefix);
        Self {
            router: Router::new(gateway, host.clone()),
            host,
            config,
            channel: UpdateChannel::new(),
            entities: Vec::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Add a select entity to the integration.
    pub fn with_entity(mut self, entity: Arc<dyn SelectEntity>) -> Self {
        self.entities.push(entity);
        self
    }

    /// Start the integration on a background task.
    ///
    /// Runs until `shutdown` is cancelled, then marks the entities offline
    /// and waits for in-flight activations and selections.
    pub fn start(self, mqtt_client: MqttClient, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(mqtt_client, shutdown).await;
        })
    }

    async fn run(self, mqtt_client: MqttClient, shutdown: CancellationToken) {
        if self.entities.is_empty() {
            info!("[MQTT] No entities configured, skipping integration");
            return;
        }

        info!(
            "[MQTT] Connecting to {}:{}",
            self.config.mqtt.broker_host, self.config.mqtt.broker_port
        );

        let publisher = mqtt_client.client();
        let (event_tx, mut event_rx) = mpsc::channel::<MqttEvent>(64);
        let mqtt_loop = tokio::spawn(mqtt_client.run(event_tx));

        self.start_renderers(&publisher, &shutdown);

        let mut activated = false;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = event_rx.recv() => match event {
                    Some(MqttEvent::Connected) => {
                        self.on_connected(&publisher);
                        if !activated {
                            self.activate_entities();
                            activated = true;
                        }
                    }
                    Some(MqttEvent::Message(msg)) => self.handle_message(&msg),
                    None => {
                        error!("[MQTT] Event loop stopped");
                        break;
                    }
                },
            }
        }

        info!("[MQTT] Shutting down integration");
        let availability = self.host.availability_topic();
        if let Err(e) = publish_retained(&publisher, &availability, PAYLOAD_OFFLINE).await {
            warn!("[MQTT] Failed to publish availability: {}", e);
        }
        self.tracker.close();
        if tokio::time::timeout(Duration::from_secs(5), self.tracker.wait())
            .await
            .is_err()
        {
            warn!("[MQTT] Pending tasks did not finish before shutdown");
        }
        // Give the event loop a moment to flush the offline message
        tokio::time::sleep(Duration::from_millis(100)).await;
        mqtt_loop.abort();
    }

    /// Subscribe, announce entities and republish known states.
    ///
    /// Only queues requests: the event loop may be blocked forwarding
    /// events to this task.
    fn on_connected(&self, publisher: &AsyncClient) {
        for topic in self.router.subscriptions() {
            if let Err(e) = publisher.try_subscribe(&topic, QoS::AtLeastOnce) {
                warn!("[MQTT] Failed to subscribe to {}: {:?}", topic, e);
            }
        }

        for entity in &self.entities {
            let discovery = SelectDiscovery::new(
                entity.as_ref(),
                &self.host,
                &self.config.bridge.unique_id,
                &self.config.bridge.name,
            );
            let topic = self.host.config_topic(entity.unique_id());
            let result = match serde_json::to_string(&discovery) {
                Ok(payload) => queue_retained(publisher, &topic, &payload),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                warn!("[MQTT] Failed to announce {}: {}", entity.name(), e);
            }
            if let Some((topic, option)) = state_message(&self.host, entity.as_ref()) {
                if let Err(e) = queue_retained(publisher, &topic, option) {
                    warn!("[MQTT] Failed to publish {} state: {}", entity.name(), e);
                }
            }
        }

        let availability = self.host.availability_topic();
        if let Err(e) = queue_retained(publisher, &availability, PAYLOAD_ONLINE) {
            warn!("[MQTT] Failed to publish availability: {}", e);
        }

        info!(
            "[MQTT] Integration ready with {} select entit{}",
            self.entities.len(),
            if self.entities.len() == 1 { "y" } else { "ies" }
        );
    }

    /// Activate every entity on its own task so device registration never
    /// stalls message routing.
    fn activate_entities(&self) {
        for entity in &self.entities {
            let entity = entity.clone();
            let channel = self.channel.clone();
            self.tracker.spawn(async move {
                let name = entity.name().to_string();
                let sensor = entity.sensor();
                if let Err(e) = entity.activate(&channel).await {
                    error!(
                        "[Select] Failed to activate {} (sensor {}): {}",
                        name, sensor, e
                    );
                }
            });
        }
    }

    /// Spawn one task per entity publishing its state on each re-render.
    fn start_renderers(&self, publisher: &AsyncClient, shutdown: &CancellationToken) {
        for entity in &self.entities {
            let notifier = RenderNotifier::new(entity.unique_id());
            entity.set_render_notifier(notifier.clone());

            let entity = entity.clone();
            let publisher = publisher.clone();
            let host = self.host.clone();
            let shutdown = shutdown.clone();
            self.tracker.spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = notifier.notified() => {
                            publish_state(&publisher, &host, entity.as_ref()).await;
                        }
                    }
                }
            });
        }
    }

    fn handle_message(&self, msg: &MqttMessage) {
        match self.router.route(msg) {
            Route::SensorValue { sensor, value } => {
                let delivered = self.channel.publish(sensor, value);
                debug!(
                    "[MQTT] Sensor {} = {} ({} subscriber(s))",
                    sensor, value, delivered
                );
            }
            Route::Selection { unique_id, choice } => {
                let Some(entity) = self
                    .entities
                    .iter()
                    .find(|e| e.unique_id() == unique_id)
                    .cloned()
                else {
                    warn!("[MQTT] Selection for unknown entity {}", unique_id);
                    return;
                };
                let choice = choice.to_string();
                self.tracker.spawn(async move {
                    if let Err(e) = entity.select_option(&choice).await {
                        error!(
                            "[Select] Failed to set {} to {}: {}",
                            entity.name(),
                            choice,
                            e
                        );
                    }
                });
            }
            Route::Ignored => {
                debug!("[MQTT] Ignoring message on {}", msg.topic);
            }
        }
    }
}

async fn publish_retained(publisher: &AsyncClient, topic: &str, payload: &str) -> Result<()> {
    publisher
        .publish(topic, QoS::AtLeastOnce, true, payload.as_bytes())
        .await?;
    Ok(())
}

/// Like [`publish_retained`], but fails instead of waiting when the
/// request queue is full.
fn queue_retained(publisher: &AsyncClient, topic: &str, payload: &str) -> Result<()> {
    publisher.try_publish(topic, QoS::AtLeastOnce, true, payload.as_bytes())?;
    Ok(())
}

/// State topic and current option. `None` while the state is unknown.
fn state_message(host: &HostTopics, entity: &dyn SelectEntity) -> Option<(String, &'static str)> {
    let option = entity.current_option()?;
    Some((host.state_topic(entity.unique_id()), option))
}

async fn publish_state(publisher: &AsyncClient, host: &HostTopics, entity: &dyn SelectEntity) {
    let Some((topic, option)) = state_message(host, entity) else {
        return;
    };
    match publish_retained(publisher, &topic, option).await {
        Ok(()) => debug!("[MQTT] {} state: {}", entity.name(), option),
        Err(e) => warn!("[MQTT] Failed to publish {} state: {}", entity.name(), e),
    }
}
