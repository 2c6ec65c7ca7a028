//! Monsrv - Renogy Modbus-TCP monitor
//!
//! Polls smart batteries and DC-DC chargers on a fixed cadence, publishes
//! decoded snapshots with derived values, and writes the charger's max
//! charge current on request.
//!
//! ```text
//! DeviceManager ──► DeviceInstance ──► Coordinator ──► Poller ──► RegisterTransport
//!       │                 │                 │             │        (ModbusSession)
//!       │                 │                 └─ watch<Arc<PolledState>>
//!       │                 └─ sensors() / readings() / device_info()
//!       └─ set_max_charge_current ──► command::set_control_register
//! ```

pub mod bootstrap;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod instance;
pub mod manager;
pub mod poller;

pub use config::{AppConfig, DeviceConfig, LoggingConfig};
pub use coordinator::{Coordinator, PollHealth, PolledState};
pub use instance::{DeviceInfo, DeviceInstance, SensorDescriptor, SensorReading};
pub use manager::{DeviceManager, SetMaxChargeCurrent};
pub use poller::{PollOutcome, Poller};
