use anyhow::{Context, Result};
use loratrack::config::SenderConfig;
use loratrack::gps::acquisition::SerialFixSource;
use loratrack::hw::SysfsResetLine;
use loratrack::modem::rak811::Rak811;
use loratrack::modem::supervisor::{JoinSupervisor, LoraSettings};
use loratrack::modem::transport::TransportSettings;
use loratrack::sender::SenderPipeline;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("loratrack=info".parse()?)
                .add_directive("gps_sender=info".parse()?),
        )
        .json()
        .init();

    info!("Starting LoRaTrack GPS sender v{}", loratrack::VERSION);

    let config = SenderConfig::from_env()?;
    config.validate()?;

    let modem_port = serialport::new(&config.modem.port, config.modem.baud_rate)
        .timeout(config.modem.read_timeout)
        .open()
        .with_context(|| format!("Failed to open modem port {}", config.modem.port))?;
    let transport = TransportSettings {
        global_timeout: config.modem.global_timeout,
        settle_delay: config.modem.settle_delay,
    };
    let mut modem = Rak811::new(modem_port, SysfsResetLine::new(config.modem.reset_gpio), transport);
    match modem.version() {
        Ok(version) => info!(version = version.as_str(), "RAK811 firmware"),
        Err(e) => info!(error = %e, "RAK811 version query failed, continuing with reset"),
    }

    let supervisor = JoinSupervisor::new(
        modem,
        LoraSettings {
            dev_eui: config.lora.dev_eui.clone(),
            app_key: config.lora.app_key.clone(),
            data_rate: config.lora.data_rate,
            band: config.lora.band.clone(),
            max_join_attempts: config.lora.join_attempts,
            retry_delay: Duration::from_secs(1),
        },
    );

    let source = SerialFixSource::start(config.gps.clone()).context("GPS receiver not found")?;
    let mut pipeline = SenderPipeline::new(supervisor, source, config.pipeline.clone());

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    let mut worker = tokio::task::spawn_blocking(move || pipeline.run(&flag));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("SIGINT received, stopping sender");
            stop.store(true, Ordering::Relaxed);
        }
        result = &mut worker => {
            if let Err(e) = result {
                error!("Sender pipeline panicked: {}", e);
            }
            return Ok(());
        }
    }

    // A blocked modem read can outlast the grace period
    if tokio::time::timeout(Duration::from_secs(5), worker).await.is_err() {
        info!("Sender pipeline still busy, exiting anyway");
    }

    info!("LoRaTrack GPS sender stopped");
    Ok(())
}
