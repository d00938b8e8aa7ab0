// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! [`DeviceGateway`] over `tokio-modbus`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tokio_modbus::ExceptionCode;
use tracing::{debug, info, warn};

use modtap_core::error::{ModtapResult, TransportError};
use modtap_core::gateway::{DeviceGateway, GatewayResult};
use modtap_core::transport::{RtuSettings, TcpSettings};
use modtap_core::types::{ConnectionHandle, ReadFunction, RegisterValue};

use crate::connect::{open_rtu, open_tcp};
use crate::error::{map_exception, map_modbus};

/// Pause between connect probe attempts.
pub const DEFAULT_PROBE_DELAY: Duration = Duration::from_secs(1);

/// Address and count of the read used to verify a fresh link.
const PROBE_ADDRESS: u16 = 1;
const PROBE_COUNT: u16 = 1;

struct Connection {
    ctx: Context,
    timeout: Duration,
    target: String,
}

/// Modbus TCP/RTU gateway.
///
/// Each connection sits behind its own async mutex, so requests on one link
/// are serialised while different links proceed independently.
pub struct ModbusGateway {
    connections: DashMap<ConnectionHandle, Arc<Mutex<Connection>>>,
    next_handle: AtomicU64,
    probe_delay: Duration,
}

impl ModbusGateway {
    /// Creates a gateway with no open connections.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_handle: AtomicU64::new(1),
            probe_delay: DEFAULT_PROBE_DELAY,
        }
    }

    /// Sets the pause between connect probe attempts.
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    /// Returns the number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn connection(&self, handle: ConnectionHandle) -> GatewayResult<Arc<Mutex<Connection>>> {
        self.connections
            .get(&handle)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::not_connected(handle))
    }

    /// Registers a fresh context, probes it and returns its handle.
    ///
    /// The handle is forgotten again if every probe attempt fails.
    async fn register(
        &self,
        ctx: Context,
        target: String,
        timeout: Duration,
        retries: u8,
        slave_id: u8,
    ) -> ModtapResult<ConnectionHandle> {
        let handle = ConnectionHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.connections.insert(
            handle,
            Arc::new(Mutex::new(Connection {
                ctx,
                timeout,
                target: target.clone(),
            })),
        );

        if let Err(e) = self.probe(handle, retries.max(1), slave_id).await {
            let _ = self.close(handle).await;
            return Err(TransportError::connection_failed(target, e.to_string()).into());
        }

        info!(%handle, target_addr = %target, slave_id, "Modbus connection open");
        Ok(handle)
    }

    /// Reads one block with the primitive `function` names, on the
    /// connection's lock and under its timeout.
    async fn read_block(
        &self,
        function: ReadFunction,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        let connection = self.connection(handle)?;
        let mut conn = connection.lock().await;
        let timeout = conn.timeout;
        let operation = function.name();
        let ctx = &mut conn.ctx;
        ctx.set_slave(Slave(slave_id));

        let values = match function {
            ReadFunction::Coils => {
                let bits = request(operation, timeout, ctx.read_coils(start_address, count)).await?;
                into_bits(start_address, count, bits)
            }
            ReadFunction::DiscreteInputs => {
                let bits = request(
                    operation,
                    timeout,
                    ctx.read_discrete_inputs(start_address, count),
                )
                .await?;
                into_bits(start_address, count, bits)
            }
            ReadFunction::HoldingRegisters => {
                let words = request(
                    operation,
                    timeout,
                    ctx.read_holding_registers(start_address, count),
                )
                .await?;
                RegisterValue::words(start_address, words)
            }
            ReadFunction::InputRegisters => {
                let words = request(
                    operation,
                    timeout,
                    ctx.read_input_registers(start_address, count),
                )
                .await?;
                RegisterValue::words(start_address, words)
            }
        };
        Ok(values)
    }

    async fn probe(&self, handle: ConnectionHandle, attempts: u8, slave_id: u8) -> GatewayResult<()> {
        for attempt in 1..=attempts {
            match self
                .read_coils(handle, PROBE_ADDRESS, PROBE_COUNT, slave_id)
                .await
            {
                // an exception response still proves the device is there
                Ok(_) | Err(TransportError::Exception { .. }) => return Ok(()),
                Err(e) if attempt == attempts => return Err(e),
                Err(e) => {
                    info!(%handle, attempt, error = %e, "Connect probe failed");
                    tokio::time::sleep(self.probe_delay).await;
                }
            }
        }
        Ok(())
    }
}

impl Default for ModbusGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModbusGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusGateway")
            .field("connections", &self.connections.len())
            .field("probe_delay", &self.probe_delay)
            .finish()
    }
}

/// Runs one request under the connection timeout and flattens its result.
async fn request<T>(
    operation: &str,
    timeout: Duration,
    future: impl Future<Output = Result<Result<T, ExceptionCode>, tokio_modbus::Error>>,
) -> GatewayResult<T> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| TransportError::timeout(operation, timeout))?
        .map_err(|e| map_modbus(e, operation, timeout))?
        .map_err(|code| map_exception(code, operation))
}

fn into_bits(start: u16, count: u16, bits: Vec<bool>) -> Vec<RegisterValue> {
    RegisterValue::bits(start, bits.into_iter().take(usize::from(count)))
}

#[async_trait]
impl DeviceGateway for ModbusGateway {
    async fn connect_tcp(&self, settings: &TcpSettings) -> ModtapResult<ConnectionHandle> {
        let ctx = open_tcp(settings).await?;
        self.register(
            ctx,
            settings.socket_addr(),
            settings.timeout,
            settings.retries,
            settings.slave_id,
        )
        .await
    }

    async fn connect_rtu(&self, settings: &RtuSettings) -> ModtapResult<ConnectionHandle> {
        let ctx = open_rtu(settings)?;
        self.register(
            ctx,
            settings.path.clone(),
            settings.timeout,
            settings.retries,
            settings.slave_id,
        )
        .await
    }

    async fn read(
        &self,
        function: ReadFunction,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        self.read_block(function, handle, start_address, count, slave_id)
            .await
    }

    async fn read_coils(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        self.read_block(ReadFunction::Coils, handle, start_address, count, slave_id)
            .await
    }

    async fn read_discrete_inputs(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        self.read_block(ReadFunction::DiscreteInputs, handle, start_address, count, slave_id)
            .await
    }

    async fn read_holding_registers(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        self.read_block(ReadFunction::HoldingRegisters, handle, start_address, count, slave_id)
            .await
    }

    async fn read_input_registers(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        self.read_block(ReadFunction::InputRegisters, handle, start_address, count, slave_id)
            .await
    }

    async fn write_single_coil(
        &self,
        handle: ConnectionHandle,
        address: u16,
        value: bool,
        slave_id: u8,
    ) -> GatewayResult<()> {
        let connection = self.connection(handle)?;
        let mut conn = connection.lock().await;
        let timeout = conn.timeout;
        conn.ctx.set_slave(Slave(slave_id));
        request(
            "write_single_coil",
            timeout,
            conn.ctx.write_single_coil(address, value),
        )
        .await
    }

    async fn write_single_register(
        &self,
        handle: ConnectionHandle,
        address: u16,
        value: u16,
        slave_id: u8,
    ) -> GatewayResult<()> {
        let connection = self.connection(handle)?;
        let mut conn = connection.lock().await;
        let timeout = conn.timeout;
        conn.ctx.set_slave(Slave(slave_id));
        request(
            "write_single_register",
            timeout,
            conn.ctx.write_single_register(address, value),
        )
        .await
    }

    async fn close(&self, handle: ConnectionHandle) -> GatewayResult<()> {
        let Some((_, connection)) = self.connections.remove(&handle) else {
            debug!(%handle, "Close of unknown handle ignored");
            return Ok(());
        };
        let mut conn = connection.lock().await;
        if let Err(e) = conn.ctx.disconnect().await {
            warn!(%handle, target_addr = %conn.target, error = %e, "Error disconnecting");
        }
        info!(%handle, target_addr = %conn.target, "Modbus connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modtap_core::transport::{Parity, StopBits};
    use modtap_core::ModtapError;

    #[tokio::test]
    async fn test_unknown_handle() {
        let gateway = ModbusGateway::new();
        let handle = ConnectionHandle::new(42);
        assert!(gateway.close(handle).await.is_ok());
        assert_eq!(
            gateway.read_holding_registers(handle, 0, 1, 1).await,
            Err(TransportError::not_connected(handle))
        );
        assert!(matches!(
            gateway.write_single_coil(handle, 0, true, 1).await,
            Err(TransportError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_every_read_function_checks_handle() {
        let gateway = ModbusGateway::new();
        let handle = ConnectionHandle::new(7);
        for function in [
            ReadFunction::Coils,
            ReadFunction::DiscreteInputs,
            ReadFunction::HoldingRegisters,
            ReadFunction::InputRegisters,
        ] {
            assert_eq!(
                gateway.read(function, handle, 0, 4, 1).await,
                Err(TransportError::not_connected(handle)),
                "{function}"
            );
        }
        assert_eq!(
            gateway.read_discrete_inputs(handle, 0, 4, 1).await,
            Err(TransportError::not_connected(handle))
        );
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let gateway = ModbusGateway::new();
        let settings = TcpSettings::new("127.0.0.1", port).with_timeout(Duration::from_millis(500));
        let err = gateway.connect_tcp(&settings).await.unwrap_err();
        assert!(matches!(
            err,
            ModtapError::Transport(TransportError::ConnectionFailed { .. })
        ));
        assert_eq!(gateway.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_silent_peer_fails_probe() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // accept and hold the socket without answering
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let gateway = ModbusGateway::new().with_probe_delay(Duration::from_millis(10));
        let settings = TcpSettings::new("127.0.0.1", port)
            .with_timeout(Duration::from_millis(100))
            .with_retries(2);
        let err = gateway.connect_tcp(&settings).await.unwrap_err();
        assert!(matches!(
            err,
            ModtapError::Transport(TransportError::ConnectionFailed { .. })
        ));
        assert_eq!(gateway.connection_count(), 0);
        server.abort();
    }

    #[tokio::test]
    async fn test_rtu_unsupported_parity() {
        let gateway = ModbusGateway::new();
        let settings = RtuSettings::new("/dev/null").with_framing(8, Parity::Space, StopBits::One);
        assert!(matches!(
            gateway.connect_rtu(&settings).await,
            Err(ModtapError::Configuration(_))
        ));
    }
}
