//! One polling pass over a device profile
//!
//! Registers are read one at a time in profile order through the shared
//! transport. A failed read degrades only its own key to absent. If the
//! connection itself cannot be (re)established, the rest of the pass is
//! skipped and those keys are absent too.

use std::sync::Arc;
use std::time::Instant;

use charge_calc::decode_register;
use charge_modbus::{ModbusError, RegisterTransport};
use charge_model::{DeviceProfile, Snapshot};
use tracing::{debug, warn};

/// Per-register failure recorded during a pass
#[derive(Debug, Clone)]
pub struct RegisterFailure {
    pub key: &'static str,
    pub address: u16,
    pub reason: String,
}

/// Result of one pass: the snapshot plus what went wrong producing it
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub snapshot: Snapshot,
    pub failures: Vec<RegisterFailure>,
    /// Pass aborted because the device could not be reached
    pub connection_lost: bool,
    /// At least one read got a response, even an exception
    pub answered: bool,
}

impl PollOutcome {
    /// Every key absent because of read failures
    pub fn is_total_failure(&self) -> bool {
        !self.failures.is_empty() && self.snapshot.all_absent()
    }

    pub fn first_error(&self) -> Option<&RegisterFailure> {
        self.failures.first()
    }
}

/// Reads one device profile through a transport
pub struct Poller {
    device_name: String,
    profile: &'static DeviceProfile,
    transport: Arc<dyn RegisterTransport>,
}

impl Poller {
    pub fn new(
        device_name: impl Into<String>,
        profile: &'static DeviceProfile,
        transport: Arc<dyn RegisterTransport>,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            profile,
            transport,
        }
    }

    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn transport(&self) -> &Arc<dyn RegisterTransport> {
        &self.transport
    }

    /// Read every register once; never fails, only degrades keys to absent
    pub async fn poll_once(&self) -> PollOutcome {
        let started = Instant::now();
        let mut snapshot = Snapshot::absent(self.profile);
        let mut failures = Vec::new();
        let mut connection_lost = false;
        let mut answered = false;

        for (index, spec) in self.profile.registers.iter().enumerate() {
            if connection_lost {
                failures.push(RegisterFailure {
                    key: spec.key,
                    address: spec.address,
                    reason: "skipped: device unreachable".to_string(),
                });
                continue;
            }

            let read = self
                .transport
                .read_registers(spec.address, spec.word_count())
                .await;

            answered |= match &read {
                Ok(_) => true,
                Err(e) => e.is_protocol_failure(),
            };

            let value = match read {
                Ok(words) => match decode_register(spec, &words) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!("{}: {}", self.device_name, e);
                        failures.push(RegisterFailure {
                            key: spec.key,
                            address: spec.address,
                            reason: e.to_string(),
                        });
                        None
                    },
                },
                Err(e) => {
                    warn!(
                        "{}: failed to read register {:#06X} for key '{}': {}",
                        self.device_name, spec.address, spec.key, e
                    );
                    connection_lost = is_unreachable(&e);
                    failures.push(RegisterFailure {
                        key: spec.key,
                        address: spec.address,
                        reason: e.to_string(),
                    });
                    None
                },
            };
            snapshot.set_at(index, value);
        }

        debug!(
            "{}: polled {}/{} registers in {:?}",
            self.device_name,
            snapshot.present_count(),
            snapshot.len(),
            started.elapsed()
        );

        PollOutcome {
            snapshot,
            failures,
            connection_lost,
            answered,
        }
    }
}

fn is_unreachable(err: &ModbusError) -> bool {
    err.is_connection_failure()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use async_trait::async_trait;
    use charge_modbus::{ExceptionCode, Result as ModbusResult};
    use charge_model::profiles::{DC_TO_DC_PROFILE, SMART_BATTERY_PROFILE};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    /// Table-backed transport with scripted failures
    #[derive(Default)]
    struct TableTransport {
        words: HashMap<u16, u16>,
        failing: HashMap<u16, ModbusError>,
        reads: Mutex<Vec<(u16, u16)>>,
    }

    #[async_trait]
    impl RegisterTransport for TableTransport {
        async fn read_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
            self.reads.lock().unwrap().push((address, count));
            if let Some(err) = self.failing.get(&address) {
                return Err(err.clone());
            }
            (address..address + count)
                .map(|a| {
                    self.words
                        .get(&a)
                        .copied()
                        .ok_or_else(|| ModbusError::protocol("unmapped"))
                })
                .collect()
        }

        async fn write_registers(&self, _address: u16, _values: &[u16]) -> ModbusResult<()> {
            Ok(())
        }

        async fn close(&self) {}
    }

    fn battery_table() -> TableTransport {
        TableTransport {
            words: HashMap::from([
                (0x13B2, 0xFF9C),
                (0x13B3, 132),
                (0x13B4, 1),
                (0x13B5, 20000),
                (0x13B6, 3),
                (0x13B7, 3392),
                (0x13B8, 12),
                (5018, 210),
                (5019, 215),
                (5020, 220),
                (5021, 0xFFF6),
            ]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_full_pass_decodes_every_register() {
        let transport = Arc::new(battery_table());
        let poller = Poller::new("house", &SMART_BATTERY_PROFILE, transport.clone());
        let outcome = poller.poll_once().await;

        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.snapshot.present_count(), 11);
        assert!((outcome.snapshot.get("current").unwrap() + 1.0).abs() < 1e-9);
        assert!((outcome.snapshot.get("temp4").unwrap() + 1.0).abs() < 1e-9);
        assert_eq!(outcome.snapshot.get("cycles"), Some(12.0));

        // Profile order, one read per register
        let reads = transport.reads.lock().unwrap();
        assert_eq!(reads.len(), 11);
        assert_eq!(reads[0], (0x13B2, 1));
    }

    #[tokio::test]
    async fn test_single_failure_is_isolated() {
        let mut table = battery_table();
        table.failing.insert(
            0x13B3,
            ModbusError::Exception {
                function: 0x03,
                code: ExceptionCode(0x02),
            },
        );
        let poller = Poller::new("house", &SMART_BATTERY_PROFILE, Arc::new(table));
        let outcome = poller.poll_once().await;

        assert_eq!(outcome.snapshot.get("voltage"), None);
        assert_eq!(outcome.snapshot.present_count(), 10);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].key, "voltage");
        assert!(!outcome.connection_lost);
        assert!(outcome.answered);
        assert!(!outcome.is_total_failure());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_read_is_logged_with_address_and_key() {
        let mut table = battery_table();
        table
            .failing
            .insert(0x13B3, ModbusError::timeout("no response within 1500ms"));
        let poller = Poller::new("house", &SMART_BATTERY_PROFILE, Arc::new(table));
        poller.poll_once().await;

        assert!(logs_contain("failed to read register 0x13B3 for key 'voltage'"));
    }

    #[tokio::test]
    async fn test_unreachable_device_skips_remaining_reads() {
        let mut table = battery_table();
        table
            .failing
            .insert(0x13B2, ModbusError::connection("Connection refused"));
        let transport = Arc::new(table);
        let poller = Poller::new("house", &SMART_BATTERY_PROFILE, transport.clone());
        let outcome = poller.poll_once().await;

        assert!(outcome.connection_lost);
        assert!(!outcome.answered);
        assert!(outcome.is_total_failure());
        assert_eq!(outcome.failures.len(), 11);
        assert_eq!(transport.reads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_two_word_register_read_as_pair() {
        let transport = Arc::new(TableTransport {
            words: HashMap::from([(0x011C, 0x0001), (0x011D, 0x86A0)]),
            ..Default::default()
        });
        let poller = Poller::new("van", &DC_TO_DC_PROFILE, transport.clone());
        let outcome = poller.poll_once().await;

        assert_eq!(outcome.snapshot.get("energy_total_raw"), Some(100_000.0));
        assert!(transport.reads.lock().unwrap().contains(&(0x011C, 2)));
        // Everything else unmapped, but the device answered
        assert!(!outcome.connection_lost);
        assert_eq!(outcome.snapshot.present_count(), 1);
    }
}
