// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! User-initiated single writes.
//!
//! Writes run on the caller's task, independent of any polling cadence. A
//! failed write is returned to the caller only; the session's polling error
//! is never touched, and a successful write leaves the registry alone too
//! (the next poll picks the new value up).

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{ModtapResult, ValidationError};
use crate::gateway::DeviceGateway;
use crate::registry::SessionRegistry;
use crate::settings::SettingsProvider;
use crate::types::{RegisterType, RegisterValue, SessionId};

/// A write requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    /// Target session.
    pub session_id: SessionId,
    /// Register address.
    pub address: u16,
    /// Register class to write.
    pub register_type: RegisterType,
    /// Raw value as entered. Coils treat any non-zero value as `true`.
    pub value: i64,
}

impl WriteRequest {
    /// Creates a write request.
    pub fn new(
        session_id: SessionId,
        address: u16,
        register_type: RegisterType,
        value: i64,
    ) -> Self {
        Self {
            session_id,
            address,
            register_type,
            value,
        }
    }
}

/// Validates and dispatches single writes.
#[derive(Clone)]
pub struct WriteCoordinator {
    registry: Arc<SessionRegistry>,
    gateway: Arc<dyn DeviceGateway>,
    settings: Arc<dyn SettingsProvider>,
}

impl WriteCoordinator {
    /// Creates a coordinator.
    pub fn new(
        registry: Arc<SessionRegistry>,
        gateway: Arc<dyn DeviceGateway>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            registry,
            gateway,
            settings,
        }
    }

    /// Performs a write and returns the value that was sent.
    ///
    /// Read-only register types, out-of-range values and the global
    /// read-only preference are rejected before the gateway is called. A
    /// session whose own register type is read-only rejects every write,
    /// whatever type the request names.
    pub async fn write(&self, request: WriteRequest) -> ModtapResult<RegisterValue> {
        let target = Self::validate(&request, self.settings.settings().read_only)?;
        let session = self.registry.get(request.session_id)?;
        if session.is_read_only() {
            return Err(ValidationError::read_only(&session.register.register_type).into());
        }
        let slave_id = session.slave_id();

        let result = match target {
            Target::Coil(value) => {
                self.gateway
                    .write_single_coil(session.handle, request.address, value, slave_id)
                    .await
            }
            Target::Register(value) => {
                self.gateway
                    .write_single_register(session.handle, request.address, value, slave_id)
                    .await
            }
        };

        match result {
            Ok(()) => {
                let written = target.value_at(request.address);
                info!(
                    session_id = %request.session_id,
                    address = request.address,
                    register_type = %request.register_type,
                    value = %written.value,
                    "Write completed"
                );
                Ok(written)
            }
            Err(e) => {
                warn!(
                    session_id = %request.session_id,
                    address = request.address,
                    register_type = %request.register_type,
                    error = %e,
                    "Write failed"
                );
                Err(e.into())
            }
        }
    }

    fn validate(request: &WriteRequest, writes_disabled: bool) -> ModtapResult<Target> {
        if writes_disabled {
            return Err(ValidationError::WritesDisabled.into());
        }
        match &request.register_type {
            RegisterType::Coil => Ok(Target::Coil(request.value != 0)),
            RegisterType::HoldingRegister => {
                ValidationError::check_range("value", request.value, 0, i64::from(u16::MAX))?;
                // range checked above
                Ok(Target::Register(request.value as u16))
            }
            RegisterType::DiscreteInput | RegisterType::InputRegister => {
                Err(ValidationError::read_only(&request.register_type).into())
            }
            RegisterType::Unsupported(name) => {
                Err(crate::error::ModtapError::unsupported_register_type(name))
            }
        }
    }
}

impl std::fmt::Debug for WriteCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteCoordinator").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Coil(bool),
    Register(u16),
}

impl Target {
    fn value_at(self, address: u16) -> RegisterValue {
        match self {
            Self::Coil(v) => RegisterValue::bit(address, v),
            Self::Register(v) => RegisterValue::word(address, v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModtapError;

    fn request(register_type: RegisterType, value: i64) -> WriteRequest {
        WriteRequest::new(SessionId::new(1), 10, register_type, value)
    }

    #[test]
    fn test_coil_coercion() {
        assert!(matches!(
            WriteCoordinator::validate(&request(RegisterType::Coil, 5), false),
            Ok(Target::Coil(true))
        ));
        assert!(matches!(
            WriteCoordinator::validate(&request(RegisterType::Coil, 0), false),
            Ok(Target::Coil(false))
        ));
    }

    #[test]
    fn test_holding_range() {
        assert!(matches!(
            WriteCoordinator::validate(&request(RegisterType::HoldingRegister, 65535), false),
            Ok(Target::Register(65535))
        ));
        for value in [-1, 65536, 70000] {
            let err = WriteCoordinator::validate(&request(RegisterType::HoldingRegister, value), false)
                .unwrap_err();
            assert!(err.is_validation(), "{value} should be rejected");
        }
    }

    #[test]
    fn test_read_only_types_rejected() {
        for register_type in [RegisterType::DiscreteInput, RegisterType::InputRegister] {
            let err = WriteCoordinator::validate(&request(register_type, 1), false).unwrap_err();
            assert!(matches!(
                err,
                ModtapError::Validation(ValidationError::ReadOnly { .. })
            ));
        }
    }

    #[test]
    fn test_unsupported_type_is_configuration_error() {
        let err = WriteCoordinator::validate(&request(RegisterType::parse("analog"), 1), false)
            .unwrap_err();
        assert!(matches!(err, ModtapError::Configuration(_)));
    }

    #[test]
    fn test_read_only_preference() {
        let err = WriteCoordinator::validate(&request(RegisterType::Coil, 1), true).unwrap_err();
        assert!(matches!(
            err,
            ModtapError::Validation(ValidationError::WritesDisabled)
        ));
    }
}
