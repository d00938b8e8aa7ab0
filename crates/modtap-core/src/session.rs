// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session state and the updates that may be applied to it.
//!
//! A [`Session`] is only ever mutated inside the registry, through a
//! [`SessionUpdate`]. User edits arrive as [`SessionPatch`]es; polling results
//! arrive tagged with the generation of the task that produced them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::display::DisplayFormat;
use crate::error::ValidationError;
use crate::transport::TransportDescriptor;
use crate::types::{ConnectionHandle, RegisterType, RegisterValue, SessionId};

// =============================================================================
// RegisterConfig
// =============================================================================

/// Which block of registers a session reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// First address of the block.
    #[serde(default)]
    pub start_address: u16,
    /// Number of items in the block.
    #[serde(default = "default_count")]
    pub count: u16,
    /// Register class.
    #[serde(default)]
    pub register_type: RegisterType,
}

fn default_count() -> u16 {
    10
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            start_address: 0,
            count: default_count(),
            register_type: RegisterType::HoldingRegister,
        }
    }
}

impl RegisterConfig {
    /// Creates a register block.
    pub fn new(register_type: RegisterType, start_address: u16, count: u16) -> Self {
        Self {
            start_address,
            count,
            register_type,
        }
    }

    /// Checks count and address bounds.
    ///
    /// An unsupported register type is not a validation failure here; the
    /// scheduler reports it as a configuration fault.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let max = self.register_type.max_read_count().unwrap_or(u16::MAX);
        ValidationError::check_range("count", i64::from(self.count), 1, i64::from(max))?;
        let last = i64::from(self.start_address) + i64::from(self.count) - 1;
        if last > i64::from(u16::MAX) {
            return Err(ValidationError::invalid(
                "count",
                format!(
                    "block {}+{} runs past address 65535",
                    self.start_address, self.count
                ),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// PollingConfig
// =============================================================================

/// Default polling interval.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Polling cadence of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Period between reads in milliseconds. Zero disables polling.
    pub interval_ms: u64,
    /// Whether polling is switched on.
    pub active: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            active: true,
        }
    }
}

impl PollingConfig {
    /// Returns `true` when a polling task should be running.
    #[inline]
    pub fn should_run(&self) -> bool {
        self.active && self.interval_ms > 0
    }

    /// Returns the interval as a duration.
    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// =============================================================================
// SessionHealth
// =============================================================================

/// Polling health of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionHealth {
    /// No polling task.
    #[default]
    Idle,
    /// Polling, last read (if any) succeeded.
    Polling,
    /// Polling, last read failed.
    Faulted,
    /// Polling halted by a configuration error.
    Unusable,
}

// =============================================================================
// SessionConfig / Session
// =============================================================================

/// Everything needed to create a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Transport the session was opened with.
    pub transport: TransportDescriptor,
    /// Gateway handle for the open connection.
    pub handle: ConnectionHandle,
    /// Display label.
    pub label: String,
    /// Register block.
    pub register: RegisterConfig,
    /// Display format.
    pub display_format: DisplayFormat,
    /// Polling cadence.
    pub polling: PollingConfig,
}

impl SessionConfig {
    /// Creates a config with default register block, format and cadence.
    pub fn new(transport: TransportDescriptor, handle: ConnectionHandle) -> Self {
        let label = transport.label();
        Self {
            transport,
            handle,
            label,
            register: RegisterConfig::default(),
            display_format: DisplayFormat::default(),
            polling: PollingConfig::default(),
        }
    }
}

/// One open device connection and its polling state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Human readable label.
    pub label: String,
    /// Transport descriptor; its slave id addresses every request.
    pub transport: TransportDescriptor,
    /// Gateway handle.
    pub handle: ConnectionHandle,
    /// Register block.
    pub register: RegisterConfig,
    /// Display format.
    pub display_format: DisplayFormat,
    /// Polling cadence.
    pub polling: PollingConfig,
    /// Values from the last successful poll, ascending by address.
    pub values: Vec<RegisterValue>,
    /// Last polling error. Write failures never land here.
    pub error: Option<String>,
    /// Polling health.
    pub health: SessionHealth,
    /// Incremented on every polling restart or stop.
    pub generation: u64,
    /// Time of the last applied poll result.
    pub last_polled_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session from its config.
    pub fn new(id: SessionId, config: SessionConfig) -> Self {
        Self {
            id,
            label: config.label,
            transport: config.transport,
            handle: config.handle,
            register: config.register,
            display_format: config.display_format,
            polling: config.polling,
            values: Vec::new(),
            error: None,
            health: SessionHealth::Idle,
            generation: 0,
            last_polled_at: None,
            created_at: Utc::now(),
        }
    }

    /// Slave id requests are addressed to.
    pub fn slave_id(&self) -> u8 {
        self.transport.slave_id()
    }

    /// `true` when the register type forbids writes.
    pub fn is_read_only(&self) -> bool {
        self.register.register_type.is_read_only()
    }

    /// Captures the parameters of one polling cadence.
    pub fn read_plan(&self) -> ReadPlan {
        ReadPlan {
            handle: self.handle,
            register_type: self.register.register_type.clone(),
            start_address: self.register.start_address,
            count: self.register.count,
            slave_id: self.slave_id(),
            interval: self.polling.interval(),
        }
    }

    /// Renders the current values in the session's display format.
    pub fn rendered_values(&self) -> Vec<(u16, String)> {
        self.display_format.render_block(&self.values)
    }
}

/// Read parameters captured when a polling task starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPlan {
    /// Gateway handle.
    pub handle: ConnectionHandle,
    /// Register class.
    pub register_type: RegisterType,
    /// First address.
    pub start_address: u16,
    /// Number of items.
    pub count: u16,
    /// Slave id.
    pub slave_id: u8,
    /// Polling period.
    pub interval: Duration,
}

// =============================================================================
// SessionPatch
// =============================================================================

/// A user edit. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    /// New start address.
    pub start_address: Option<u16>,
    /// New count.
    pub count: Option<u16>,
    /// New register type.
    pub register_type: Option<RegisterType>,
    /// New slave id.
    pub slave_id: Option<u8>,
    /// New interval.
    pub interval_ms: Option<u64>,
    /// Switch polling on or off.
    pub active: Option<bool>,
    /// New display format.
    pub display_format: Option<DisplayFormat>,
    /// New label.
    pub label: Option<String>,
}

impl SessionPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the start address.
    pub fn start_address(mut self, address: u16) -> Self {
        self.start_address = Some(address);
        self
    }

    /// Sets the count.
    pub fn count(mut self, count: u16) -> Self {
        self.count = Some(count);
        self
    }

    /// Sets the register type.
    pub fn register_type(mut self, register_type: RegisterType) -> Self {
        self.register_type = Some(register_type);
        self
    }

    /// Sets the slave id.
    pub fn slave_id(mut self, slave_id: u8) -> Self {
        self.slave_id = Some(slave_id);
        self
    }

    /// Sets the interval.
    pub fn interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Switches polling on or off.
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Sets the display format.
    pub fn display_format(mut self, format: DisplayFormat) -> Self {
        self.display_format = Some(format);
        self
    }

    /// Sets the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns `true` if applying this patch to `session` changes any field
    /// the polling cadence depends on.
    pub fn changes_cadence(&self, session: &Session) -> bool {
        fn differs<T: PartialEq>(new: &Option<T>, current: &T) -> bool {
            new.as_ref().is_some_and(|v| v != current)
        }

        differs(&self.active, &session.polling.active)
            || differs(&self.interval_ms, &session.polling.interval_ms)
            || differs(&self.start_address, &session.register.start_address)
            || differs(&self.count, &session.register.count)
            || differs(&self.register_type, &session.register.register_type)
            || differs(&self.slave_id, &session.slave_id())
    }

    /// Validates the patch against the session it will be applied to.
    pub fn validate_for(&self, session: &Session) -> Result<(), ValidationError> {
        let register = RegisterConfig {
            start_address: self.start_address.unwrap_or(session.register.start_address),
            count: self.count.unwrap_or(session.register.count),
            register_type: self
                .register_type
                .clone()
                .unwrap_or_else(|| session.register.register_type.clone()),
        };
        register.validate()?;
        if let Some(label) = &self.label {
            if label.trim().is_empty() {
                return Err(ValidationError::empty("label"));
            }
        }
        Ok(())
    }

    /// Applies the patch. Does not touch values, error or generation.
    pub(crate) fn apply_to(self, session: &mut Session) {
        if let Some(v) = self.start_address {
            session.register.start_address = v;
        }
        if let Some(v) = self.count {
            session.register.count = v;
        }
        if let Some(v) = self.register_type {
            session.register.register_type = v;
        }
        if let Some(v) = self.slave_id {
            session.transport.set_slave_id(v);
        }
        if let Some(v) = self.interval_ms {
            session.polling.interval_ms = v;
        }
        if let Some(v) = self.active {
            session.polling.active = v;
        }
        if let Some(v) = self.display_format {
            session.display_format = v;
        }
        if let Some(v) = self.label {
            session.label = v;
        }
    }
}

// =============================================================================
// SessionUpdate
// =============================================================================

/// A mutation routed through the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// User edit.
    Edit(SessionPatch),
    /// A poll returned values.
    PollSucceeded {
        /// Generation of the polling task.
        generation: u64,
        /// Values read.
        values: Vec<RegisterValue>,
    },
    /// A poll failed at the transport.
    PollFailed {
        /// Generation of the polling task.
        generation: u64,
        /// Failure description.
        error: String,
    },
    /// The polling task hit a configuration error and stopped.
    Faulted {
        /// Generation of the polling task.
        generation: u64,
        /// Fault description.
        reason: String,
    },
}

impl SessionUpdate {
    /// Generation tag of scheduler updates; `None` for user edits.
    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::Edit(_) => None,
            Self::PollSucceeded { generation, .. }
            | Self::PollFailed { generation, .. }
            | Self::Faulted { generation, .. } => Some(*generation),
        }
    }
}

/// What applying an update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// The polling cadence was cancelled and must be re-evaluated.
    pub cadence_changed: bool,
}

// =============================================================================
// Tests
// =============================================================================
