//! Service configuration
//!
//! Layered with figment, lowest priority first: built-in defaults, the YAML
//! file, then `MONSRV_`-prefixed environment variables (`__` separates
//! nesting, e.g. `MONSRV_LOGGING__LEVEL=debug`).

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use charge_model::ProfileRegistry;
use errors::{MonitorError, MonitorResult};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/monsrv.yaml";

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "MONSRV_";

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log root, overridden by `MONSRV_LOG_DIR`
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write a daily file under `dir`
    #[serde(default)]
    pub file_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: default_log_level(),
            file_enabled: false,
        }
    }
}

/// One Modbus-TCP device to monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Stable identifier; defaults to `name`
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_unit_id", alias = "slave")]
    pub unit_id: u8,

    /// Profile id from the registry (`smart_battery`, `dc_to_dc`)
    pub device_type: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}
fn default_port() -> u16 {
    charge_modbus::constants::DEFAULT_TCP_PORT
}
fn default_unit_id() -> u8 {
    1
}
fn default_poll_interval() -> u64 {
    5
}
fn default_operation_timeout() -> u64 {
    1500
}
fn default_connect_timeout() -> u64 {
    3000
}

impl DeviceConfig {
    /// Minimal device entry with default timing
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        device_type: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            host: host.into(),
            port,
            unit_id: default_unit_id(),
            device_type: device_type.into(),
            poll_interval_secs: default_poll_interval(),
            operation_timeout_ms: default_operation_timeout(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Field-level checks that need no registry
    pub fn validate(&self) -> MonitorResult<()> {
        let field = |name: &str| format!("devices[{}].{}", self.id(), name);

        if self.name.trim().is_empty() {
            return Err(MonitorError::invalid_config("devices[].name", "must not be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(MonitorError::invalid_config(field("host"), "must not be empty"));
        }
        if self.port == 0 {
            return Err(MonitorError::invalid_config(field("port"), "must be non-zero"));
        }
        if self.poll_interval_secs == 0 {
            return Err(MonitorError::invalid_config(
                field("poll_interval_secs"),
                "must be at least 1",
            ));
        }
        if self.operation_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(MonitorError::invalid_config(field("timeout"), "must be non-zero"));
        }
        if self.operation_timeout() >= self.poll_interval() {
            return Err(MonitorError::invalid_config(
                field("operation_timeout_ms"),
                format!(
                    "{}ms must be shorter than the {}s poll interval",
                    self.operation_timeout_ms, self.poll_interval_secs
                ),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load defaults, then `path`, then environment overrides
    pub fn load(path: impl AsRef<Path>) -> MonitorResult<Self> {
        Self::figment(path.as_ref())
            .extract()
            .map_err(|e| MonitorError::config(format!("{}: {}", path.as_ref().display(), e)))
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject configurations that could not be set up
    pub fn validate(&self, registry: &ProfileRegistry) -> MonitorResult<()> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            device.validate()?;
            if !seen.insert(device.id()) {
                return Err(MonitorError::invalid_config(
                    "devices[].id",
                    format!("duplicate device id '{}'", device.id()),
                ));
            }
            registry.get(&device.device_type)?;
        }
        Ok(())
    }

    pub fn device(&self, id: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.id() == id)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use errors::{ErrorCategory, MonitorErrorTrait};
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_applies_defaults_and_slave_alias() {
        let file = write_config(
            r#"
devices:
  - name: house
    host: 192.168.1.40
    slave: 247
    device_type: smart_battery
"#,
        );
        let config = AppConfig::load(file.path()).unwrap();
        let device = &config.devices[0];

        assert_eq!(device.id(), "house");
        assert_eq!(device.unit_id, 247);
        assert_eq!(device.port, 502);
        assert_eq!(device.poll_interval(), Duration::from_secs(5));
        assert_eq!(device.operation_timeout(), Duration::from_millis(1500));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.yaml")).unwrap();
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_validate_rejects_unknown_device_type() {
        let registry = ProfileRegistry::builtin().unwrap();
        let config = AppConfig {
            devices: vec![DeviceConfig::new("garage", "10.0.0.2", 502, "inverter")],
            ..Default::default()
        };
        let err = config.validate(&registry).unwrap_err();
        assert_eq!(err.to_string(), "unknown device type: inverter");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let registry = ProfileRegistry::builtin().unwrap();
        let mut second = DeviceConfig::new("van", "10.0.0.3", 502, "dc_to_dc");
        second.id = Some("house".into());
        let config = AppConfig {
            devices: vec![
                DeviceConfig::new("house", "10.0.0.2", 502, "smart_battery"),
                second,
            ],
            ..Default::default()
        };
        assert!(config
            .validate(&registry)
            .unwrap_err()
            .to_string()
            .contains("duplicate device id 'house'"));
    }

    #[test]
    fn test_validate_timeout_bounded_by_poll_period() {
        let mut device = DeviceConfig::new("van", "10.0.0.3", 502, "dc_to_dc");
        device.poll_interval_secs = 1;
        device.operation_timeout_ms = 1000;
        assert!(device.validate().is_err());

        device.operation_timeout_ms = 900;
        assert!(device.validate().is_ok());

        device.port = 0;
        assert!(device.validate().is_err());
    }

    #[test]
    fn test_device_lookup_by_explicit_id() {
        let mut device = DeviceConfig::new("Van Charger", "10.0.0.3", 502, "dc_to_dc");
        device.id = Some("van".into());
        let config = AppConfig {
            devices: vec![device],
            ..Default::default()
        };
        assert!(config.device("van").is_some());
        assert!(config.device("Van Charger").is_none());
    }
}
