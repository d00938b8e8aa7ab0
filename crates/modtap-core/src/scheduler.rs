// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-session polling.
//!
//! Each session with active polling gets one task. The task captures the read
//! parameters and the session generation when it starts, reads immediately,
//! then reads again every interval until its cancellation token fires.
//!
//! # Invariants
//!
//! - At most one read per session is outstanding. The outstanding-request
//!   slot belongs to the session, not to the task, so a restarted task will
//!   skip its ticks until a read started by its predecessor has returned.
//! - Ticks that fire while the slot is taken are skipped, never queued.
//! - Every result is applied through the registry tagged with the task's
//!   generation; results from a cancelled task are rejected there.
//! - Failed reads are recorded and retried on the next tick, with no backoff.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ModtapError, ModtapResult, SessionError};
use crate::gateway::{DeviceGateway, GatewayResult};
use crate::registry::{PollingLease, SessionRegistry};
use crate::session::{Session, SessionUpdate};
use crate::types::{ReadFunction, RegisterValue, SessionId};

// =============================================================================
// RequestSlot
// =============================================================================

/// A session's single outstanding-request slot.
#[derive(Debug, Default)]
pub struct RequestSlot {
    busy: AtomicBool,
}

impl RequestSlot {
    /// Claims the slot, or returns `None` if a request is outstanding.
    pub fn try_acquire(&self) -> Option<SlotGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard { slot: self })
    }

    /// Returns `true` while a request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the slot on drop.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slot: &'a RequestSlot,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

// =============================================================================
// SchedulerStats
// =============================================================================

/// Counters across all polling tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks started.
    pub tasks_started: u64,
    /// Reads that returned values.
    pub polls_succeeded: u64,
    /// Reads that failed at the transport.
    pub polls_failed: u64,
    /// Ticks skipped because a read was outstanding.
    pub ticks_skipped: u64,
    /// Results discarded because the cadence had moved on.
    pub stale_discarded: u64,
    /// Tasks halted by a configuration error.
    pub faults: u64,
}

#[derive(Debug, Default)]
struct AtomicSchedulerStats {
    tasks_started: AtomicU64,
    polls_succeeded: AtomicU64,
    polls_failed: AtomicU64,
    ticks_skipped: AtomicU64,
    stale_discarded: AtomicU64,
    faults: AtomicU64,
}

impl AtomicSchedulerStats {
    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            polls_succeeded: self.polls_succeeded.load(Ordering::Relaxed),
            polls_failed: self.polls_failed.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// PollingScheduler
// =============================================================================

/// Starts, restarts and stops per-session polling tasks.
#[derive(Clone)]
pub struct PollingScheduler {
    registry: Arc<SessionRegistry>,
    gateway: Arc<dyn DeviceGateway>,
    stats: Arc<AtomicSchedulerStats>,
}

impl PollingScheduler {
    /// Creates a scheduler.
    pub fn new(registry: Arc<SessionRegistry>, gateway: Arc<dyn DeviceGateway>) -> Self {
        Self {
            registry,
            gateway,
            stats: Arc::new(AtomicSchedulerStats::default()),
        }
    }

    /// Brings the session's polling task in line with its configuration.
    ///
    /// Cancels any running task, then starts a fresh one if polling should
    /// run. Returns `true` if a task was started. Must be called from within
    /// a Tokio runtime.
    pub fn sync(&self, id: SessionId) -> Result<bool, SessionError> {
        let token = CancellationToken::new();
        let Some(lease) = self.registry.arm_cadence(id, token.clone())? else {
            debug!(session_id = %id, "Polling not active");
            return Ok(false);
        };

        self.stats.tasks_started.fetch_add(1, Ordering::Relaxed);
        let registry = self.registry.clone();
        let gateway = self.gateway.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            poll_loop(registry, gateway, stats, lease, token).await;
        });
        Ok(true)
    }

    /// Stops the session's polling task. Returns `true` if one was running.
    ///
    /// The stored polling configuration is left alone, so the next
    /// [`sync`](Self::sync) starts the task again. Safe to call from inside
    /// the task being stopped; a read already in flight is discarded.
    pub fn stop(&self, id: SessionId) -> Result<bool, SessionError> {
        let stopped = self.registry.disarm_cadence(id)?;
        if stopped {
            info!(session_id = %id, "Polling stopped");
        }
        Ok(stopped)
    }

    /// Reads the session's block once and applies the result.
    ///
    /// The read goes through the session's request slot and is tagged with
    /// its current generation, exactly like a polled read. A transport
    /// failure is recorded on the session and returned. Fails with
    /// [`SessionError::Busy`] while another read is outstanding.
    pub async fn poll_once(&self, id: SessionId) -> ModtapResult<Session> {
        let PollingLease {
            generation,
            plan,
            slot,
            ..
        } = self.registry.snapshot_lease(id)?;
        let function = plan.register_type.read_function()?;
        let Some(_permit) = slot.try_acquire() else {
            return Err(SessionError::Busy { id }.into());
        };

        let result = self
            .gateway
            .read(
                function,
                plan.handle,
                plan.start_address,
                plan.count,
                plan.slave_id,
            )
            .await;
        let failure = result.as_ref().err().cloned();
        let update = record_result(&self.stats, id, generation, function, result);
        self.registry.update(id, update)?;

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(self.registry.get(id)?),
        }
    }

    /// Returns counters across all tasks.
    pub fn stats(&self) -> SchedulerStats {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for PollingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("stats", &self.stats())
            .finish()
    }
}

async fn poll_loop(
    registry: Arc<SessionRegistry>,
    gateway: Arc<dyn DeviceGateway>,
    stats: Arc<AtomicSchedulerStats>,
    lease: PollingLease,
    token: CancellationToken,
) {
    let PollingLease {
        id,
        generation,
        plan,
        slot,
    } = lease;

    let function = match plan.register_type.read_function() {
        Ok(function) => function,
        Err(fault) => {
            stats.faults.fetch_add(1, Ordering::Relaxed);
            error!(
                session_id = %id,
                generation,
                register_type = %plan.register_type,
                "Polling halted: {fault}"
            );
            let update = SessionUpdate::Faulted {
                generation,
                reason: fault.to_string(),
            };
            if let Err(e) = registry.update(id, update) {
                debug!(session_id = %id, error = %e, "Fault not recorded");
            }
            return;
        }
    };

    info!(
        session_id = %id,
        generation,
        register_type = %plan.register_type,
        start_address = plan.start_address,
        count = plan.count,
        slave_id = plan.slave_id,
        interval_ms = plan.interval.as_millis() as u64,
        "Polling task started"
    );

    let mut ticker = tokio::time::interval(plan.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(_permit) = slot.try_acquire() else {
            stats.ticks_skipped.fetch_add(1, Ordering::Relaxed);
            debug!(session_id = %id, generation, "Previous request outstanding, tick skipped");
            continue;
        };

        let result = gateway
            .read(
                function,
                plan.handle,
                plan.start_address,
                plan.count,
                plan.slave_id,
            )
            .await;

        let update = record_result(&stats, id, generation, function, result);
        match registry.update(id, update) {
            Ok(_) => {}
            Err(ModtapError::Session(e)) if e.is_discard() => {
                stats.stale_discarded.fetch_add(1, Ordering::Relaxed);
                debug!(session_id = %id, generation, reason = %e, "Poll result discarded");
                break;
            }
            Err(e) => {
                e.log("poll");
                break;
            }
        }
    }

    debug!(session_id = %id, generation, "Polling task exited");
}

fn record_result(
    stats: &AtomicSchedulerStats,
    id: SessionId,
    generation: u64,
    function: ReadFunction,
    result: GatewayResult<Vec<RegisterValue>>,
) -> SessionUpdate {
    match result {
        Ok(values) => {
            stats.polls_succeeded.fetch_add(1, Ordering::Relaxed);
            SessionUpdate::PollSucceeded { generation, values }
        }
        Err(e) => {
            stats.polls_failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                session_id = %id,
                generation,
                operation = function.name(),
                error = %e,
                "Poll failed"
            );
            SessionUpdate::PollFailed {
                generation,
                error: e.to_string(),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_slot_is_exclusive() {
        let slot = RequestSlot::default();
        let guard = slot.try_acquire();
        assert!(guard.is_some());
        assert!(slot.is_busy());
        assert!(slot.try_acquire().is_none());
        drop(guard);
        assert!(!slot.is_busy());
        assert!(slot.try_acquire().is_some());
    }
}
