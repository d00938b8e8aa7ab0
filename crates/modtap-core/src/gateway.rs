// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The device gateway contract.
//!
//! A gateway owns the physical connections. The session manager only ever
//! sees [`ConnectionHandle`]s and calls the primitives below; timeouts and
//! connect retries are the gateway's business.

use async_trait::async_trait;

use crate::error::{ModtapResult, TransportError};
use crate::transport::{RtuSettings, TcpSettings};
use crate::types::{ConnectionHandle, ReadFunction, RegisterValue};

/// Result type of gateway primitives.
pub type GatewayResult<T> = Result<T, TransportError>;

/// Connect, read and write primitives per transport.
///
/// Read primitives return `(address, value)` pairs in ascending address
/// order, one per requested item.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Opens a Modbus TCP connection.
    ///
    /// Fails with a transport error, or a configuration error for settings
    /// the gateway cannot express.
    async fn connect_tcp(&self, settings: &TcpSettings) -> ModtapResult<ConnectionHandle>;

    /// Opens a Modbus RTU connection.
    async fn connect_rtu(&self, settings: &RtuSettings) -> ModtapResult<ConnectionHandle>;

    /// Reads coils.
    async fn read_coils(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>>;

    /// Reads discrete inputs.
    async fn read_discrete_inputs(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>>;

    /// Reads holding registers.
    async fn read_holding_registers(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>>;

    /// Reads input registers.
    async fn read_input_registers(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>>;

    /// Writes a single coil.
    async fn write_single_coil(
        &self,
        handle: ConnectionHandle,
        address: u16,
        value: bool,
        slave_id: u8,
    ) -> GatewayResult<()>;

    /// Writes a single holding register.
    async fn write_single_register(
        &self,
        handle: ConnectionHandle,
        address: u16,
        value: u16,
        slave_id: u8,
    ) -> GatewayResult<()>;

    /// Closes a connection. Closing an unknown handle succeeds.
    async fn close(&self, handle: ConnectionHandle) -> GatewayResult<()>;

    /// Dispatches to the read primitive for `function`.
    async fn read(
        &self,
        function: ReadFunction,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        match function {
            ReadFunction::Coils => self.read_coils(handle, start_address, count, slave_id).await,
            ReadFunction::DiscreteInputs => {
                self.read_discrete_inputs(handle, start_address, count, slave_id)
                    .await
            }
            ReadFunction::HoldingRegisters => {
                self.read_holding_registers(handle, start_address, count, slave_id)
                    .await
            }
            ReadFunction::InputRegisters => {
                self.read_input_registers(handle, start_address, count, slave_id)
                    .await
            }
        }
    }
}
