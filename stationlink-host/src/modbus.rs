//! Modbus-TCP transport for the display.
//!
//! The display controller only needs three function codes: read one coil,
//! write one coil and write a block of holding registers. [`ModbusIo`] is
//! that surface; [`TcpModbusConnector`] provides it over `tokio-modbus`.

use std::net::SocketAddr;

use async_trait::async_trait;
use stationlink_core::display::DISPLAY_UNIT_ID;
use stationlink_core::DeviceError;
use tokio_modbus::client::{tcp, Client as _, Context, Reader as _, Writer as _};
use tokio_modbus::slave::Slave;
use tokio_modbus::ExceptionCode;

/// An open Modbus session
#[async_trait]
pub trait ModbusIo: Send {
    async fn read_coil(&mut self, address: u16) -> Result<bool, DeviceError>;

    async fn write_coil(&mut self, address: u16, value: bool) -> Result<(), DeviceError>;

    async fn write_registers(&mut self, address: u16, words: &[u16]) -> Result<(), DeviceError>;

    /// Close the socket
    async fn shutdown(&mut self) -> Result<(), DeviceError>;

    fn peer(&self) -> SocketAddr;
}

/// Opens Modbus sessions
#[async_trait]
pub trait ModbusConnector: Send + Sync {
    async fn connect(&self, addr: SocketAddr) -> Result<Box<dyn ModbusIo>, DeviceError>;
}

/// Connects with `tokio-modbus` over TCP
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpModbusConnector;

#[async_trait]
impl ModbusConnector for TcpModbusConnector {
    async fn connect(&self, addr: SocketAddr) -> Result<Box<dyn ModbusIo>, DeviceError> {
        let ctx = tcp::connect_slave(addr, Slave(DISPLAY_UNIT_ID)).await?;
        log::debug!("Modbus session open to {}", addr);
        Ok(Box::new(TcpModbus { ctx, peer: addr }))
    }
}

pub struct TcpModbus {
    ctx: Context,
    peer: SocketAddr,
}

fn flatten<T>(
    result: Result<Result<T, ExceptionCode>, tokio_modbus::Error>,
) -> Result<T, DeviceError> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(code)) => Err(DeviceError::Exception(format!("{:?}", code))),
        Err(e) => Err(DeviceError::Transport(e.to_string())),
    }
}

#[async_trait]
impl ModbusIo for TcpModbus {
    async fn read_coil(&mut self, address: u16) -> Result<bool, DeviceError> {
        let coils = flatten(self.ctx.read_coils(address, 1).await)?;
        coils
            .first()
            .copied()
            .ok_or_else(|| DeviceError::InvalidResponse(format!("no value for coil {}", address)))
    }

    async fn write_coil(&mut self, address: u16, value: bool) -> Result<(), DeviceError> {
        flatten(self.ctx.write_single_coil(address, value).await)
    }

    async fn write_registers(&mut self, address: u16, words: &[u16]) -> Result<(), DeviceError> {
        flatten(self.ctx.write_multiple_registers(address, words).await)
    }

    async fn shutdown(&mut self) -> Result<(), DeviceError> {
        self.ctx
            .disconnect()
            .await
            .map_err(|e| DeviceError::Transport(e.to_string()))
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }
}

// =============================================================================
// Test transport
// =============================================================================
