//! Simulated ComfoConnect MQTT gateway.
//!
//! Usage:
//!   cargo run --bin device-sim
//!   cargo run --bin device-sim -- --drift-secs 30
//!
//! Answers register and command requests on the gateway topics and pushes
//! sensor values back, so the bridge can be exercised without a unit.

use clap::Parser;
use comfoconnect_select::config::{Config, load_dotenv};
use comfoconnect_select::device::{CommandRequest, GatewayTopics, RegisterRequest};
use comfoconnect_select::mqtt::{MqttClient, MqttEvent, MqttMessage};
use comfoconnect_select::simulation::{SensorPush, SimulatedUnit};
use log::{info, warn};
use rumqttc::{AsyncClient, QoS};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "device-sim")]
#[command(about = "Simulated ComfoConnect gateway for development")]
struct Cli {
    /// Gateway topic prefix
    #[arg(long, env = "COMFOCONNECT_TOPIC_PREFIX", default_value = "comfoconnect")]
    prefix: String,

    /// Cycle the bypass state every N seconds (0 disables)
    #[arg(long, default_value_t = 0)]
    drift_secs: u64,
}

async fn push(client: &AsyncClient, topics: &GatewayTopics, (sensor, code): SensorPush) {
    let topic = topics.sensor_topic(sensor);
    info!("[Sim] Sensor {} = {}", sensor, code);
    if let Err(e) = client
        .publish(topic, QoS::AtLeastOnce, false, code.to_string())
        .await
    {
        warn!("[Sim] Failed to push sensor {}: {}", sensor, e);
    }
}

async fn handle(
    msg: &MqttMessage,
    unit: &mut SimulatedUnit,
    client: &AsyncClient,
    topics: &GatewayTopics,
) {
    if msg.topic == topics.register_topic() {
        match serde_json::from_str::<RegisterRequest>(&msg.payload) {
            Ok(request) => match unit.register(request.sensor) {
                Some(value) => push(client, topics, value).await,
                None => warn!("[Sim] Unknown sensor {}", request.sensor),
            },
            Err(e) => warn!("[Sim] Invalid register request: {}", e),
        }
    } else if msg.topic == topics.command_topic() {
        match serde_json::from_str::<CommandRequest>(&msg.payload) {
            Ok(request) => match unit.apply(request.command) {
                Some(value) => push(client, topics, value).await,
                None => warn!("[Sim] Unknown command {}", request.command),
            },
            Err(e) => warn!("[Sim] Invalid command request: {}", e),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    config.mqtt.client_id = format!("{}-sim", config.mqtt.client_id);
    let topics = GatewayTopics::new(cli.prefix);

    info!(
        "Starting simulated gateway on {}:{} ({})",
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        topics.prefix()
    );

    let mqtt_client = MqttClient::new(&config.mqtt, None);
    let client = mqtt_client.client();
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let mqtt_loop = tokio::spawn(mqtt_client.run(event_tx));

    let mut unit = SimulatedUnit::new();
    let drift_enabled = cli.drift_secs > 0;
    let period = Duration::from_secs(cli.drift_secs.max(1));
    let mut drift = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(MqttEvent::Connected) => {
                    for topic in [topics.register_topic(), topics.command_topic()] {
                        if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce).await {
                            warn!("[Sim] Failed to subscribe to {}: {}", topic, e);
                        }
                    }
                }
                Some(MqttEvent::Message(msg)) => handle(&msg, &mut unit, &client, &topics).await,
                None => {
                    warn!("[Sim] MQTT event loop ended");
                    break;
                }
            },
            _ = drift.tick(), if drift_enabled => {
                let value = unit.drift_bypass();
                push(&client, &topics, value).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    mqtt_loop.abort();
    info!("Simulated gateway stopped.");
}
