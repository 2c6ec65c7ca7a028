//! Modbus TCP session with exclusive access and lazy reconnect
//!
//! Wraps a `voltage_modbus` TCP client. The client owns MBAP framing and
//! PDU encoding; the session owns when to connect, how long to wait and
//! when a stream can no longer be trusted.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::sync::Mutex;
use tokio::time::{error::Elapsed, timeout};
use tracing::{debug, info, warn};
use voltage_modbus::{ModbusClient, ModbusResult, ModbusTcpClient};

use crate::constants::{DEFAULT_TCP_PORT, MODBUS_MAX_READ_REGISTERS, MODBUS_MAX_WRITE_REGISTERS};
use crate::error::{ModbusError, Result};

/// Session parameters
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    /// Slave / unit identifier addressed by every request
    pub unit_id: u8,
    pub connect_timeout: Duration,
    /// Bound on one request/response round trip
    pub operation_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
            connect_timeout: Duration::from_secs(3),
            operation_timeout: Duration::from_millis(1500),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_operation_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = operation_timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_TCP_PORT, 1)
    }
}

/// One TCP session to a Modbus server
///
/// The client mutex is the access gate: it is held from the moment a
/// request is issued until its response (or failure) has been observed.
pub struct ModbusSession {
    config: SessionConfig,
    client: Mutex<Option<ModbusTcpClient>>,
}

impl ModbusSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Establish the TCP session if not already connected
    pub async fn connect(&self) -> Result<()> {
        let mut client = self.client.lock().await;
        self.ensure_connected(&mut client).await.map(|_| ())
    }

    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// Read `count` holding registers starting at `address` (FC03)
    pub async fn read_registers(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        if count == 0 || count > MODBUS_MAX_READ_REGISTERS {
            return Err(ModbusError::invalid_request(format!(
                "read count {} outside 1..={}",
                count, MODBUS_MAX_READ_REGISTERS
            )));
        }

        let mut guard = self.client.lock().await;
        let client = self.ensure_connected(&mut guard).await?;
        let outcome = timeout(
            self.config.operation_timeout,
            client.read_03(self.config.unit_id, address, count),
        )
        .await;

        let result = self.settle(outcome, "read", address).and_then(|words| {
            if words.len() == usize::from(count) {
                Ok(words)
            } else {
                Err(ModbusError::protocol(format!(
                    "expected {} registers at {:#06X}, got {}",
                    count,
                    address,
                    words.len()
                )))
            }
        });
        if let Err(e) = &result {
            debug!("Read {:#06X}x{} rejected: {}", address, count, e);
        }
        self.drop_if_untrusted(&mut guard, &result);
        result
    }

    /// Write consecutive registers starting at `address` (FC16), no retry
    pub async fn write_registers(&self, address: u16, values: &[u16]) -> Result<()> {
        if values.is_empty() || values.len() > usize::from(MODBUS_MAX_WRITE_REGISTERS) {
            return Err(ModbusError::invalid_request(format!(
                "write of {} registers outside 1..={}",
                values.len(),
                MODBUS_MAX_WRITE_REGISTERS
            )));
        }

        let mut guard = self.client.lock().await;
        let client = self.ensure_connected(&mut guard).await?;
        let outcome = timeout(
            self.config.operation_timeout,
            client.write_10(self.config.unit_id, address, values),
        )
        .await;

        let result = self.settle(outcome, "write", address);
        self.drop_if_untrusted(&mut guard, &result);
        result?;

        info!(
            "Wrote {} register(s) at {:#06X} on {}",
            values.len(),
            address,
            self.config.endpoint()
        );
        Ok(())
    }

    /// Release the socket; no-op if already closed or never connected
    pub async fn close(&self) {
        if let Some(mut client) = self.client.lock().await.take() {
            info!("Closing Modbus session {}", self.config.endpoint());
            if let Err(e) = client.close().await {
                debug!("Modbus session {} closed with error: {}", self.config.endpoint(), e);
            }
        }
    }

    async fn ensure_connected<'a>(
        &self,
        slot: &'a mut Option<ModbusTcpClient>,
    ) -> Result<&'a mut ModbusTcpClient> {
        if slot.is_none() {
            let client = timeout(self.config.connect_timeout, self.open())
                .await
                .map_err(|_| {
                    ModbusError::connection(format!(
                        "connect to {} timed out after {:?}",
                        self.config.endpoint(),
                        self.config.connect_timeout
                    ))
                })??;
            info!("Connected to Modbus server {}", self.config.endpoint());
            *slot = Some(client);
        }
        slot.as_mut()
            .ok_or_else(|| ModbusError::connection("Session not connected"))
    }

    async fn open(&self) -> Result<ModbusTcpClient> {
        let endpoint = self.config.endpoint();
        let addr: SocketAddr = lookup_host((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| ModbusError::connection(format!("cannot resolve {}: {}", endpoint, e)))?
            .next()
            .ok_or_else(|| ModbusError::connection(format!("no address for {}", endpoint)))?;

        ModbusTcpClient::new(addr, self.config.operation_timeout)
            .await
            .map_err(|e| ModbusError::connection(format!("{}: {}", endpoint, e)))
    }

    fn settle<T>(
        &self,
        outcome: std::result::Result<ModbusResult<T>, Elapsed>,
        operation: &str,
        address: u16,
    ) -> Result<T> {
        match outcome {
            Ok(result) => result.map_err(ModbusError::from),
            Err(_) => Err(ModbusError::timeout(format!(
                "no response to {} at {:#06X} within {:?}",
                operation, address, self.config.operation_timeout
            ))),
        }
    }

    fn drop_if_untrusted<T>(&self, slot: &mut Option<ModbusTcpClient>, result: &Result<T>) {
        if let Err(e) = result {
            if e.needs_reconnect() && slot.take().is_some() {
                warn!(
                    "Dropping Modbus session {} after error: {}",
                    self.config.endpoint(),
                    e
                );
            }
        }
    }
}

impl std::fmt::Debug for ModbusSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusSession")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
