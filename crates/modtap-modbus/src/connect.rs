// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Opening TCP and serial links and attaching a Modbus client context.

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_modbus::client::{rtu, tcp, Context};
use tokio_modbus::Slave;
use tokio_serial::{
    DataBits as SerialDataBits, Parity as SerialParity, SerialPortBuilderExt,
    StopBits as SerialStopBits,
};
use tracing::debug;

use modtap_core::error::{ConfigurationError, ModtapResult, TransportError, ValidationError};
use modtap_core::transport::{Parity, RtuSettings, StopBits, TcpSettings};

use crate::error::map_serial;

/// Opens a TCP stream within the configured timeout.
pub(crate) async fn open_tcp(settings: &TcpSettings) -> ModtapResult<Context> {
    let target = settings.socket_addr();
    let stream = timeout(settings.timeout, TcpStream::connect(target.as_str()))
        .await
        .map_err(|_| {
            TransportError::connection_failed(
                &target,
                format!("timed out after {:?}", settings.timeout),
            )
        })?
        .map_err(|e| TransportError::connection_failed(&target, e.to_string()))?;

    stream.set_nodelay(true).ok();
    debug!(target_addr = %target, "TCP stream open");
    Ok(tcp::attach_slave(stream, Slave(settings.slave_id)))
}

/// Opens a serial port with the configured framing.
pub(crate) fn open_rtu(settings: &RtuSettings) -> ModtapResult<Context> {
    let framing = SerialFraming::try_from(settings)?;
    let serial = tokio_serial::new(settings.path.as_str(), settings.baud_rate)
        .data_bits(framing.data_bits)
        .parity(framing.parity)
        .stop_bits(framing.stop_bits)
        .timeout(settings.timeout)
        .open_native_async()
        .map_err(|e| map_serial(&settings.path, &e))?;

    debug!(path = %settings.path, baud_rate = settings.baud_rate, "Serial port open");
    Ok(rtu::attach_slave(serial, Slave(settings.slave_id)))
}

/// Serial framing the driver can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SerialFraming {
    pub data_bits: SerialDataBits,
    pub parity: SerialParity,
    pub stop_bits: SerialStopBits,
}

impl TryFrom<&RtuSettings> for SerialFraming {
    type Error = modtap_core::ModtapError;

    fn try_from(settings: &RtuSettings) -> Result<Self, Self::Error> {
        let data_bits = match settings.data_bits {
            5 => SerialDataBits::Five,
            6 => SerialDataBits::Six,
            7 => SerialDataBits::Seven,
            8 => SerialDataBits::Eight,
            other => {
                return Err(ValidationError::out_of_range("data_bits", i64::from(other), 5, 8).into())
            }
        };
        let parity = match settings.parity {
            Parity::None => SerialParity::None,
            Parity::Even => SerialParity::Even,
            Parity::Odd => SerialParity::Odd,
            Parity::Mark | Parity::Space => {
                return Err(ConfigurationError::unsupported_serial("parity", settings.parity).into())
            }
        };
        let stop_bits = match settings.stop_bits {
            StopBits::One => SerialStopBits::One,
            StopBits::Two => SerialStopBits::Two,
            StopBits::OnePointFive => {
                return Err(
                    ConfigurationError::unsupported_serial("stop_bits", settings.stop_bits).into(),
                )
            }
        };
        Ok(Self {
            data_bits,
            parity,
            stop_bits,
        })
    }
}
