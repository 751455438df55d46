use clap::Parser;
use comfoconnect_select::config::{Config, load_dotenv};
use comfoconnect_select::device::{GatewayTopics, MqttDeviceLink};
use comfoconnect_select::mqtt::{MqttClient, MqttIntegration, availability_will};
use comfoconnect_select::select::{BypassEntity, TemperatureProfileEntity};
use log::{error, info};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "comfoconnect-select")]
#[command(about = "Expose ComfoAir bypass and temperature profile as Home Assistant selects")]
struct Cli {
    /// MQTT broker host (overrides MQTT_BROKER_HOST)
    #[arg(long)]
    broker_host: Option<String>,

    /// MQTT broker port (overrides MQTT_BROKER_PORT)
    #[arg(long)]
    broker_port: Option<u16>,

    /// Display name of the unit (overrides COMFOCONNECT_NAME)
    #[arg(long)]
    name: Option<String>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Before the runtime exists, so setting variables is single-threaded
    load_dotenv();
    init_logger();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(host) = cli.broker_host {
        config.mqtt.broker_host = host;
    }
    if let Some(port) = cli.broker_port {
        config.mqtt.broker_port = port;
    }
    if let Some(name) = cli.name {
        config.bridge.name = name;
    }

    if cli.print_config {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("Failed to serialize configuration: {}", e),
        }
        return;
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start tokio runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(config));
}

async fn run(config: Config) {
    info!("Starting ComfoConnect select bridge");
    info!("Configuration loaded:");
    info!("  Unit: {} ({})", config.bridge.name, config.bridge.unique_id);
    info!(
        "  Broker: {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    info!("  Gateway topics: {}/#", config.bridge.topic_prefix);
    info!("  Discovery prefix: {}", config.discovery.prefix);

    let mqtt_client = MqttClient::new(&config.mqtt, Some(availability_will(&config)));
    let link = Arc::new(MqttDeviceLink::new(
        mqtt_client.client(),
        GatewayTopics::new(&config.bridge.topic_prefix),
    ));

    let bypass = Arc::new(BypassEntity::for_bridge(link.clone(), &config.bridge));
    let profile = Arc::new(TemperatureProfileEntity::for_bridge(link, &config.bridge));

    let shutdown = CancellationToken::new();
    let integration = MqttIntegration::new(config)
        .with_entity(bypass)
        .with_entity(profile);
    let handle = integration.start(mqtt_client, shutdown.clone());

    info!("Bridge is running, press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    shutdown.cancel();
    if let Err(e) = handle.await {
        error!("Integration task failed: {}", e);
    }

    info!("ComfoConnect select bridge stopped");
}
