// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Mapping of `tokio-modbus` and `tokio-serial` failures onto
//! [`TransportError`].

use std::io::{self, ErrorKind};
use std::time::Duration;

use modtap_core::error::TransportError;
use tokio_modbus::ExceptionCode;

/// Converts an exception code to its wire value.
pub(crate) fn exception_code_to_u8(code: ExceptionCode) -> u8 {
    match code {
        ExceptionCode::IllegalFunction => 0x01,
        ExceptionCode::IllegalDataAddress => 0x02,
        ExceptionCode::IllegalDataValue => 0x03,
        ExceptionCode::ServerDeviceFailure => 0x04,
        ExceptionCode::Acknowledge => 0x05,
        ExceptionCode::ServerDeviceBusy => 0x06,
        ExceptionCode::MemoryParityError => 0x08,
        ExceptionCode::GatewayPathUnavailable => 0x0A,
        ExceptionCode::GatewayTargetDevice => 0x0B,
        _ => 0xFF,
    }
}

/// Maps an exception response.
pub(crate) fn map_exception(code: ExceptionCode, operation: &str) -> TransportError {
    TransportError::exception(operation, exception_code_to_u8(code))
}

/// Maps an I/O failure during a request.
pub(crate) fn map_io(error: &io::Error, operation: &str, timeout: Duration) -> TransportError {
    match error.kind() {
        ErrorKind::TimedOut => TransportError::timeout(operation, timeout),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            TransportError::closed(error.to_string())
        }
        ErrorKind::UnexpectedEof => TransportError::closed("peer closed the connection"),
        _ => TransportError::request_failed(operation, error.to_string()),
    }
}

/// Maps a transport or framing failure reported by `tokio-modbus`.
pub(crate) fn map_modbus(
    error: tokio_modbus::Error,
    operation: &str,
    timeout: Duration,
) -> TransportError {
    match error {
        tokio_modbus::Error::Transport(io_error) => map_io(&io_error, operation, timeout),
        tokio_modbus::Error::Protocol(protocol_error) => {
            TransportError::request_failed(operation, protocol_error.to_string())
        }
    }
}

/// Maps a failure to open a serial port.
pub(crate) fn map_serial(path: &str, error: &tokio_serial::Error) -> TransportError {
    let message = match error.kind {
        tokio_serial::ErrorKind::NoDevice => "no such device".to_string(),
        tokio_serial::ErrorKind::Io(ErrorKind::NotFound) => "no such device".to_string(),
        tokio_serial::ErrorKind::Io(ErrorKind::PermissionDenied) => "permission denied".to_string(),
        _ => error.to_string(),
    };
    TransportError::connection_failed(path, message)
}
