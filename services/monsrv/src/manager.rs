//! Device Manager - instance lifecycle and control commands
//!
//! Explicit owner of every running device. Setup resolves the profile,
//! opens the transport, blocks on the first poll and starts the
//! coordinator. Teardown stops the coordinator and closes the transport
//! before the instance is dropped.
//!
//! A device id stays in the registry after its instance is torn down, so a
//! command against it reports the missing instance rather than an unknown
//! device.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use charge_modbus::{ModbusSession, RegisterTransport, SessionConfig};
use charge_model::{DeviceProfile, ProfileRegistry};
use errors::{MonitorError, MonitorResult};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::command::{set_control_register, MAX_CHARGE_CURRENT_REGISTER};
use crate::config::DeviceConfig;
use crate::coordinator::Coordinator;
use crate::instance::DeviceInstance;
use crate::poller::Poller;

/// Control command payload; both fields are required
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetMaxChargeCurrent {
    pub device_id: Option<String>,
    #[serde(alias = "current")]
    pub amps: Option<f64>,
}

impl SetMaxChargeCurrent {
    pub fn new(device_id: impl Into<String>, amps: f64) -> Self {
        Self {
            device_id: Some(device_id.into()),
            amps: Some(amps),
        }
    }
}

/// Owns every device instance, keyed by instance id
pub struct DeviceManager {
    registry: ProfileRegistry,
    instances: RwLock<HashMap<String, Arc<DeviceInstance>>>,
    /// device id -> instance id
    devices: RwLock<HashMap<String, String>>,
    /// Device ids with a setup in flight
    pending: RwLock<HashSet<String>>,
}

impl DeviceManager {
    pub fn new(registry: ProfileRegistry) -> Self {
        Self {
            registry,
            instances: RwLock::new(HashMap::new()),
            devices: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Set up a device over Modbus-TCP
    pub async fn setup(&self, config: &DeviceConfig) -> MonitorResult<Arc<DeviceInstance>> {
        // Resolve before any socket is opened
        let profile = self.registry.get(&config.device_type)?;
        config.validate()?;
        let device_id = config.id().to_string();
        self.reserve(&device_id).await?;

        let session = Arc::new(ModbusSession::new(
            SessionConfig::new(config.host.clone(), config.port, config.unit_id)
                .with_connect_timeout(config.connect_timeout())
                .with_operation_timeout(config.operation_timeout()),
        ));
        if let Err(e) = session.connect().await {
            self.release(&device_id).await;
            return Err(MonitorError::from_modbus(&config.endpoint(), e));
        }
        info!(
            "Connected to {} '{}' at {}",
            profile.display_name,
            config.name,
            config.endpoint()
        );

        let result = self.start_instance(config, profile, session).await;
        self.release(&device_id).await;
        result
    }

    /// Set up a device over an already constructed transport
    pub async fn setup_with_transport(
        &self,
        config: &DeviceConfig,
        transport: Arc<dyn RegisterTransport>,
    ) -> MonitorResult<Arc<DeviceInstance>> {
        let profile = self.registry.get(&config.device_type)?;
        let device_id = config.id().to_string();
        if let Err(e) = self.reserve(&device_id).await {
            transport.close().await;
            return Err(e);
        }

        let result = self.start_instance(config, profile, transport).await;
        self.release(&device_id).await;
        result
    }

    /// Claim a device id for a setup in flight
    ///
    /// Fails if the device already has a live instance or another setup
    /// holds the claim.
    async fn reserve(&self, device_id: &str) -> MonitorResult<()> {
        let mut pending = self.pending.write().await;
        if pending.contains(device_id) || self.is_live(device_id).await {
            return Err(MonitorError::AlreadyExists(device_id.to_string()));
        }
        pending.insert(device_id.to_string());
        Ok(())
    }

    async fn release(&self, device_id: &str) {
        self.pending.write().await.remove(device_id);
    }

    async fn is_live(&self, device_id: &str) -> bool {
        match self.devices.read().await.get(device_id) {
            Some(instance_id) => self.instances.read().await.contains_key(instance_id),
            None => false,
        }
    }

    /// First poll, scheduler start and registration; the caller holds the claim
    async fn start_instance(
        &self,
        config: &DeviceConfig,
        profile: &'static DeviceProfile,
        transport: Arc<dyn RegisterTransport>,
    ) -> MonitorResult<Arc<DeviceInstance>> {
        let coordinator = Coordinator::new(
            Poller::new(config.name.clone(), profile, Arc::clone(&transport)),
            config.poll_interval(),
        );
        if let Err(e) = coordinator.first_refresh().await {
            error!("{}: setup aborted: {}", config.name, e);
            transport.close().await;
            return Err(e);
        }
        coordinator.start().await;

        let instance = Arc::new(DeviceInstance::new(
            Uuid::new_v4().to_string(),
            config.id().to_string(),
            config.name.clone(),
            profile,
            transport,
            coordinator,
        ));

        self.instances
            .write()
            .await
            .insert(instance.instance_id().to_string(), Arc::clone(&instance));
        self.devices
            .write()
            .await
            .insert(config.id().to_string(), instance.instance_id().to_string());

        info!(
            "Device '{}' ready as {} (instance {})",
            config.name,
            profile.id,
            instance.instance_id()
        );
        Ok(instance)
    }

    /// Stop and release a device's instance; the device id stays registered
    pub async fn teardown(&self, device_id: &str) -> MonitorResult<()> {
        let instance_id = self
            .devices
            .read()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| MonitorError::DeviceNotFound(device_id.to_string()))?;

        let instance = self
            .instances
            .write()
            .await
            .remove(&instance_id)
            .ok_or_else(|| MonitorError::InstanceNotFound {
                device: device_id.to_string(),
                instance: instance_id.clone(),
            })?;

        instance.shutdown().await;
        info!("Device '{}' torn down", instance.device_name());
        Ok(())
    }

    /// Tear down every running instance
    pub async fn shutdown_all(&self) {
        let instances: Vec<_> = self.instances.write().await.drain().collect();
        for (_, instance) in instances {
            instance.shutdown().await;
            info!("Device '{}' stopped", instance.device_name());
        }
    }

    /// Resolve device id -> instance
    pub async fn instance_for_device(&self, device_id: &str) -> MonitorResult<Arc<DeviceInstance>> {
        let instance_id = self
            .devices
            .read()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| MonitorError::DeviceNotFound(device_id.to_string()))?;

        self.instances
            .read()
            .await
            .get(&instance_id)
            .cloned()
            .ok_or(MonitorError::InstanceNotFound {
                device: device_id.to_string(),
                instance: instance_id,
            })
    }

    pub async fn instances(&self) -> Vec<Arc<DeviceInstance>> {
        self.instances.read().await.values().cloned().collect()
    }

    /// Handle the "set max charge current" command
    ///
    /// Returns the register value written.
    pub async fn set_max_charge_current(&self, request: SetMaxChargeCurrent) -> MonitorResult<u16> {
        let (Some(device_id), Some(amps)) = (request.device_id, request.amps) else {
            warn!("set max charge current: missing device_id or amps");
            return Err(MonitorError::MissingField("device_id and amps".to_string()));
        };

        let instance = self.instance_for_device(&device_id).await?;
        set_control_register(
            instance.transport(),
            instance.device_name(),
            instance.profile(),
            MAX_CHARGE_CURRENT_REGISTER,
            amps,
        )
        .await
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("profiles", &self.registry.ids().collect::<Vec<_>>())
            .finish()
    }
}
