//! Transport seam between the register engine and the wire

use async_trait::async_trait;

use crate::error::Result;
use crate::session::ModbusSession;

/// Register-level access to one device
///
/// Implementations must serialize calls: two operations on the same
/// transport never overlap on the wire.
#[async_trait]
pub trait RegisterTransport: Send + Sync {
    /// Read `count` raw 16-bit words starting at `address`
    async fn read_registers(&self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Write consecutive 16-bit words starting at `address`
    async fn write_registers(&self, address: u16, values: &[u16]) -> Result<()>;

    /// Release the underlying connection
    async fn close(&self);
}

#[async_trait]
impl RegisterTransport for ModbusSession {
    async fn read_registers(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        ModbusSession::read_registers(self, address, count).await
    }

    async fn write_registers(&self, address: u16, values: &[u16]) -> Result<()> {
        ModbusSession::write_registers(self, address, values).await
    }

    async fn close(&self) {
        ModbusSession::close(self).await
    }
}
