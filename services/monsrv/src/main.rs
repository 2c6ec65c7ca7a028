//! Monsrv entry point

use std::sync::Arc;

use anyhow::Context;
use charge_model::ProfileRegistry;
use clap::Parser;
use errors::{MonitorError, MonitorErrorTrait};
use tracing::{debug, error, info, warn, Level};

use monsrv::bootstrap::{initialize_logging, load_configuration, Args, Command};
use monsrv::{AppConfig, DeviceInstance, DeviceManager, SetMaxChargeCurrent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_configuration(&args)?;
    initialize_logging(&args, &config)?;

    let registry = ProfileRegistry::builtin().context("built-in profiles are invalid")?;
    config.validate(&registry)?;

    if args.validate {
        println!(
            "Configuration OK: {} device(s), {} profile(s)",
            config.devices.len(),
            registry.profiles().len()
        );
        return Ok(());
    }

    match args.command() {
        Command::Profiles => {
            list_profiles(&registry);
            Ok(())
        },
        Command::Run => run_service(config, registry).await,
        Command::SetMaxCurrent { device, amps } => {
            set_max_current(config, registry, &device, amps).await
        },
    }
}

/// The device-type choices offered when adding a device
fn list_profiles(registry: &ProfileRegistry) {
    for profile in registry.profiles() {
        println!("{:<16}{} ({})", profile.id, profile.display_name, profile.kind);
    }
}

/// Poll every configured device until a shutdown signal
async fn run_service(config: AppConfig, registry: ProfileRegistry) -> anyhow::Result<()> {
    let manager = Arc::new(DeviceManager::new(registry));

    for device in &config.devices {
        match manager.setup(device).await {
            Ok(instance) => spawn_state_logger(instance),
            Err(e) => log_monitor_error(&format!("Setup of '{}' failed", device.name), &e),
        }
    }

    let running = manager.instances().await.len();
    if running == 0 {
        anyhow::bail!("no device could be set up");
    }
    info!("Monsrv running with {} device(s)", running);

    let signal = common::wait_for_shutdown().await;
    info!("{} received, shutting down", signal);

    manager.shutdown_all().await;
    info!("Monsrv stopped");
    Ok(())
}

/// Log every published snapshot at debug level
fn spawn_state_logger(instance: Arc<DeviceInstance>) {
    let mut rx = instance.coordinator().subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let health = rx.borrow_and_update().health.clone();
            let readings = instance.readings();
            match serde_json::to_string(&readings) {
                Ok(json) => debug!(
                    "{}: failures={} {}",
                    instance.device_name(),
                    health.consecutive_failures,
                    json
                ),
                Err(e) => error!("{}: cannot serialize readings: {}", instance.device_name(), e),
            }
        }
    });
}

async fn set_max_current(
    config: AppConfig,
    registry: ProfileRegistry,
    device_id: &str,
    amps: f64,
) -> anyhow::Result<()> {
    let device = config
        .device(device_id)
        .ok_or_else(|| MonitorError::DeviceNotFound(device_id.to_string()))?;

    let manager = DeviceManager::new(registry);
    manager.setup(device).await?;

    let result = manager
        .set_max_charge_current(SetMaxChargeCurrent::new(device_id, amps))
        .await;
    manager.shutdown_all().await;

    match result {
        Ok(written) => {
            println!("{}: max charge current set to {} A (raw {})", device_id, amps, written);
            Ok(())
        },
        Err(e) => {
            log_monitor_error("Set max charge current failed", &e);
            Err(e.into())
        },
    }
}

fn log_monitor_error(context: &str, err: &MonitorError) {
    let level = err.log_level();
    if level == Level::ERROR {
        error!("{}: [{}] {}", context, err.error_code(), err);
    } else if level == Level::WARN {
        warn!("{}: [{}] {}", context, err.error_code(), err);
    } else {
        info!("{}: [{}] {}", context, err.error_code(), err);
    }
}
