// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The session registry.
//!
//! The registry is the only owner of session state and of the active-session
//! pointer. Callers get cloned snapshots; every mutation goes through
//! [`SessionRegistry::update`] or one of the lifecycle calls, and is applied
//! while holding that session's map shard, so no other caller can observe a
//! half-applied change.
//!
//! The registry also holds each session's polling cancellation token. Any
//! operation that invalidates the current cadence (a relevant edit, a stop, a
//! restart or removal) cancels the token and bumps the session generation in
//! the same critical section, which is what makes late results from a
//! cancelled task detectable.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ModtapError, SessionError};
use crate::scheduler::RequestSlot;
use crate::session::{
    ReadPlan, Session, SessionConfig, SessionHealth, SessionUpdate, UpdateOutcome,
};
use crate::types::SessionId;

// =============================================================================
// SessionEntry
// =============================================================================

struct SessionEntry {
    session: Session,
    cadence: Option<CancellationToken>,
    slot: Arc<RequestSlot>,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        Self {
            session,
            cadence: None,
            slot: Arc::new(RequestSlot::default()),
        }
    }

    /// Cancels the running cadence (if any) and invalidates its generation.
    fn halt_cadence(&mut self) {
        if let Some(token) = self.cadence.take() {
            token.cancel();
        }
        self.session.generation += 1;
    }
}

/// Parameters handed to a freshly started polling task.
#[derive(Debug, Clone)]
pub struct PollingLease {
    /// Session being polled.
    pub id: SessionId,
    /// Generation every result of this task is tagged with.
    pub generation: u64,
    /// Read parameters captured at start.
    pub plan: ReadPlan,
    /// The session's outstanding-request slot, shared across generations.
    pub slot: Arc<RequestSlot>,
}

// =============================================================================
// SessionRegistry
// =============================================================================

/// Authoritative store of sessions keyed by id.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
    active: Mutex<Option<SessionId>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            active: Mutex::new(None),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates a session.
    ///
    /// Fails with [`SessionError::AlreadyExists`] if the id is taken.
    pub fn create(&self, id: SessionId, config: SessionConfig) -> Result<Session, SessionError> {
        match self.sessions.entry(id) {
            Entry::Occupied(_) => Err(SessionError::AlreadyExists { id }),
            Entry::Vacant(slot) => {
                let session = Session::new(id, config);
                info!(
                    session_id = %id,
                    label = %session.label,
                    transport = session.transport.kind(),
                    "Session created"
                );
                slot.insert(SessionEntry::new(session.clone()));
                Ok(session)
            }
        }
    }

    /// Removes a session, cancelling its polling task.
    ///
    /// If the session was active, the active pointer moves to the remaining
    /// session with the lowest id, or to none.
    pub fn remove(&self, id: SessionId) -> Result<Session, SessionError> {
        let mut active = self.active.lock();
        let (_, mut entry) = self
            .sessions
            .remove(&id)
            .ok_or(SessionError::NotFound { id })?;
        entry.halt_cadence();

        if *active == Some(id) {
            *active = self.lowest_id();
            debug!(
                removed = %id,
                active = ?active.map(|a| a.get()),
                "Reassigned active session"
            );
        }

        info!(session_id = %id, label = %entry.session.label, "Session removed");
        Ok(entry.session)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns a snapshot of a session.
    pub fn get(&self, id: SessionId) -> Result<Session, SessionError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.session.clone())
            .ok_or(SessionError::NotFound { id })
    }

    /// Returns `true` if the session exists.
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Returns snapshots of all sessions, in no particular order.
    pub fn list(&self) -> Vec<Session> {
        self.sessions
            .iter()
            .map(|entry| entry.session.clone())
            .collect()
    }

    /// Returns all session ids in ascending order.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns `true` while a polling cadence is armed for the session.
    pub fn is_polling(&self, id: SessionId) -> bool {
        self.sessions
            .get(&id)
            .is_some_and(|entry| entry.cadence.as_ref().is_some_and(|t| !t.is_cancelled()))
    }

    /// Returns `true` while a read for the session is outstanding.
    pub fn has_request_in_flight(&self, id: SessionId) -> bool {
        self.sessions
            .get(&id)
            .is_some_and(|entry| entry.slot.is_busy())
    }

    fn lowest_id(&self) -> Option<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).min()
    }

    // =========================================================================
    // Active pointer
    // =========================================================================

    /// Returns the active session id.
    pub fn active_id(&self) -> Option<SessionId> {
        *self.active.lock()
    }

    /// Sets (or clears) the active session.
    pub fn set_active_id(&self, id: Option<SessionId>) -> Result<(), SessionError> {
        let mut active = self.active.lock();
        if let Some(id) = id {
            if !self.sessions.contains_key(&id) {
                return Err(SessionError::NotFound { id });
            }
        }
        *active = id;
        Ok(())
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Applies an update atomically.
    ///
    /// Scheduler updates tagged with a generation other than the session's
    /// current one are rejected with [`SessionError::Stale`]. An edit that
    /// changes the polling cadence cancels the running task and reports
    /// `cadence_changed` so the caller can re-arm polling.
    pub fn update(&self, id: SessionId, update: SessionUpdate) -> Result<UpdateOutcome, ModtapError> {
        let mut guard = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound { id })?;
        let entry = guard.value_mut();

        if let Some(generation) = update.generation() {
            let current = entry.session.generation;
            if generation != current {
                return Err(SessionError::Stale {
                    id,
                    generation,
                    current,
                }
                .into());
            }
        }

        let mut outcome = UpdateOutcome::default();
        match update {
            SessionUpdate::Edit(patch) => {
                patch.validate_for(&entry.session)?;
                let cadence_changed = patch.changes_cadence(&entry.session);
                let register_changed = patch
                    .register_type
                    .as_ref()
                    .is_some_and(|t| *t != entry.session.register.register_type);

                patch.apply_to(&mut entry.session);

                if register_changed && entry.session.health == SessionHealth::Unusable {
                    entry.session.health = SessionHealth::Idle;
                    entry.session.error = None;
                }
                if cadence_changed {
                    entry.halt_cadence();
                    if entry.session.health != SessionHealth::Unusable {
                        entry.session.health = SessionHealth::Idle;
                    }
                }
                outcome.cadence_changed = cadence_changed;
            }
            SessionUpdate::PollSucceeded { mut values, .. } => {
                values.sort_by_key(|v| v.address);
                let polling = entry.cadence.is_some();
                let session = &mut entry.session;
                session.values = values;
                session.error = None;
                // a one-shot read leaves an idle session idle
                if polling {
                    session.health = SessionHealth::Polling;
                }
                session.last_polled_at = Some(chrono::Utc::now());
            }
            SessionUpdate::PollFailed { error, .. } => {
                let polling = entry.cadence.is_some();
                let session = &mut entry.session;
                session.error = Some(error);
                if polling {
                    session.health = SessionHealth::Faulted;
                }
                session.last_polled_at = Some(chrono::Utc::now());
            }
            SessionUpdate::Faulted { reason, .. } => {
                entry.halt_cadence();
                entry.session.error = Some(reason);
                entry.session.health = SessionHealth::Unusable;
            }
        }
        Ok(outcome)
    }

    // =========================================================================
    // Cadence control (used by the scheduler)
    // =========================================================================

    /// Replaces the session's cadence with one guarded by `token`.
    ///
    /// Any previous cadence is cancelled and the generation bumped. Returns
    /// `None` (and leaves `token` unused) when polling should not run.
    pub fn arm_cadence(
        &self,
        id: SessionId,
        token: CancellationToken,
    ) -> Result<Option<PollingLease>, SessionError> {
        let mut guard = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound { id })?;
        let entry = guard.value_mut();

        entry.halt_cadence();
        let session = &mut entry.session;
        if session.health == SessionHealth::Unusable || !session.polling.should_run() {
            if session.health != SessionHealth::Unusable {
                session.health = SessionHealth::Idle;
            }
            return Ok(None);
        }

        session.health = if session.error.is_some() {
            SessionHealth::Faulted
        } else {
            SessionHealth::Polling
        };
        let lease = PollingLease {
            id,
            generation: session.generation,
            plan: session.read_plan(),
            slot: entry.slot.clone(),
        };
        entry.cadence = Some(token);
        Ok(Some(lease))
    }

    /// Captures the parameters for a read outside any cadence.
    ///
    /// The lease carries the current generation, so its result is rejected
    /// if the cadence is restarted or stopped before it lands. Nothing about
    /// the session changes.
    pub fn snapshot_lease(&self, id: SessionId) -> Result<PollingLease, SessionError> {
        let entry = self.sessions.get(&id).ok_or(SessionError::NotFound { id })?;
        Ok(PollingLease {
            id,
            generation: entry.session.generation,
            plan: entry.session.read_plan(),
            slot: entry.slot.clone(),
        })
    }

    /// Cancels the session's cadence. Returns `true` if one was running.
    pub fn disarm_cadence(&self, id: SessionId) -> Result<bool, SessionError> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound { id })?;
        let was_running = entry.cadence.is_some();
        entry.halt_cadence();
        if entry.session.health != SessionHealth::Unusable {
            entry.session.health = SessionHealth::Idle;
        }
        Ok(was_running)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("active", &self.active_id())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
