// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection event bus.
//!
//! Front ends submit [`ConnectionRequested`] events; the connection
//! establisher consumes them and broadcasts a [`ConnectionOutcome`] for each.
//!
//! ```text
//!  window A ─┐                                   ┌─► window A
//!  window B ─┼─► requests (mpsc) ─► establisher ─┼─► window B
//!  CLI      ─┘                     outcomes (broadcast)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::error::BusError;
use crate::transport::TransportDescriptor;
use crate::types::SessionId;

// =============================================================================
// Events
// =============================================================================

/// A request to open a new session.
#[derive(Debug, Clone)]
pub struct ConnectionRequested {
    /// Correlates the outcome with this request.
    pub request_id: Uuid,
    /// Where to connect.
    pub descriptor: TransportDescriptor,
}

impl ConnectionRequested {
    /// Creates a request with a fresh id.
    pub fn new(descriptor: TransportDescriptor) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            descriptor,
        }
    }
}

/// The result of a connection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// A session was created.
    Connected {
        /// Id of the originating request.
        request_id: Uuid,
        /// The new session.
        session_id: SessionId,
        /// Its display label.
        label: String,
    },
    /// No session was created.
    Failed {
        /// Id of the originating request.
        request_id: Uuid,
        /// Error description.
        error: String,
    },
}

impl ConnectionOutcome {
    /// Id of the originating request.
    pub fn request_id(&self) -> Uuid {
        match self {
            Self::Connected { request_id, .. } | Self::Failed { request_id, .. } => *request_id,
        }
    }

    /// Returns `true` for [`ConnectionOutcome::Connected`].
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

// =============================================================================
// ConnectionBus
// =============================================================================

/// Bus statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionBusStats {
    /// Requests accepted.
    pub requests_sent: u64,
    /// Outcomes published.
    pub outcomes_published: u64,
}

#[derive(Debug, Default)]
struct AtomicBusStats {
    requests_sent: AtomicU64,
    outcomes_published: AtomicU64,
}

/// Sending side of the bus. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionBus {
    requests: mpsc::Sender<ConnectionRequested>,
    outcomes: broadcast::Sender<ConnectionOutcome>,
    stats: Arc<AtomicBusStats>,
}

/// Receiving side of the request queue, owned by the establisher.
///
/// It can publish outcomes but holds no request sender, so it sees the queue
/// close once every [`ConnectionBus`] clone is dropped.
pub struct ConnectionRequests {
    receiver: mpsc::Receiver<ConnectionRequested>,
    outcomes: broadcast::Sender<ConnectionOutcome>,
    stats: Arc<AtomicBusStats>,
}

impl ConnectionBus {
    /// Creates a bus and its request receiver.
    pub fn channel(capacity: usize) -> (Self, ConnectionRequests) {
        let (requests, receiver) = mpsc::channel(capacity);
        let (outcomes, _) = broadcast::channel(capacity);
        let stats = Arc::new(AtomicBusStats::default());
        (
            Self {
                requests,
                outcomes: outcomes.clone(),
                stats: stats.clone(),
            },
            ConnectionRequests {
                receiver,
                outcomes,
                stats,
            },
        )
    }

    /// Submits a connection request and returns its id.
    pub async fn request(&self, descriptor: TransportDescriptor) -> Result<Uuid, BusError> {
        let event = ConnectionRequested::new(descriptor);
        let request_id = event.request_id;
        self.requests
            .send(event)
            .await
            .map_err(|_| BusError::Closed)?;
        self.stats.requests_sent.fetch_add(1, Ordering::Relaxed);
        Ok(request_id)
    }

    /// Submits a request without waiting for queue space.
    pub fn try_request(&self, descriptor: TransportDescriptor) -> Result<Uuid, BusError> {
        let event = ConnectionRequested::new(descriptor);
        let request_id = event.request_id;
        self.requests.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BusError::Full,
            mpsc::error::TrySendError::Closed(_) => BusError::Closed,
        })?;
        self.stats.requests_sent.fetch_add(1, Ordering::Relaxed);
        Ok(request_id)
    }

    /// Subscribes to outcomes published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionOutcome> {
        self.outcomes.subscribe()
    }

    /// Publishes an outcome. Returns the number of subscribers reached.
    pub fn publish(&self, outcome: ConnectionOutcome) -> usize {
        publish(&self.outcomes, &self.stats, outcome)
    }

    /// Returns bus statistics.
    pub fn stats(&self) -> ConnectionBusStats {
        ConnectionBusStats {
            requests_sent: self.stats.requests_sent.load(Ordering::Relaxed),
            outcomes_published: self.stats.outcomes_published.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ConnectionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionBus")
            .field("subscribers", &self.outcomes.receiver_count())
            .field("stats", &self.stats())
            .finish()
    }
}

impl ConnectionRequests {
    /// Receives the next request; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<ConnectionRequested> {
        self.receiver.recv().await
    }

    /// Stops accepting new requests.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Publishes an outcome to every bus subscriber.
    pub fn publish(&self, outcome: ConnectionOutcome) -> usize {
        publish(&self.outcomes, &self.stats, outcome)
    }
}

fn publish(
    outcomes: &broadcast::Sender<ConnectionOutcome>,
    stats: &AtomicBusStats,
    outcome: ConnectionOutcome,
) -> usize {
    stats.outcomes_published.fetch_add(1, Ordering::Relaxed);
    // no subscribers is fine
    outcomes.send(outcome).unwrap_or(0)
}

impl std::fmt::Debug for ConnectionRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRequests").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TcpSettings;

    #[tokio::test]
    async fn test_request_roundtrip() {
        let (bus, mut requests) = ConnectionBus::channel(4);
        let id = bus
            .request(TcpSettings::new("plc", 502).into())
            .await
            .unwrap();
        let event = requests.recv().await.unwrap();
        assert_eq!(event.request_id, id);
        assert_eq!(event.descriptor.label(), "plc:502");
        assert_eq!(bus.stats().requests_sent, 1);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let (bus, _requests) = ConnectionBus::channel(4);
        let mut rx = bus.subscribe();
        let request_id = Uuid::new_v4();
        assert_eq!(
            bus.publish(ConnectionOutcome::Failed {
                request_id,
                error: "refused".into()
            }),
            1
        );
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.request_id(), request_id);
        assert!(!outcome.is_connected());
    }

    #[tokio::test]
    async fn test_request_after_close_fails() {
        let (bus, mut requests) = ConnectionBus::channel(1);
        requests.close();
        assert_eq!(
            bus.request(TcpSettings::new("plc", 502).into()).await,
            Err(BusError::Closed)
        );
    }

    #[tokio::test]
    async fn test_queue_closes_when_senders_drop() {
        let (bus, mut requests) = ConnectionBus::channel(2);
        let mut rx = bus.subscribe();
        bus.request(TcpSettings::new("plc", 502).into()).await.unwrap();
        drop(bus);

        assert!(requests.recv().await.is_some());
        assert!(requests.recv().await.is_none());

        let request_id = Uuid::new_v4();
        requests.publish(ConnectionOutcome::Failed {
            request_id,
            error: "refused".into(),
        });
        assert_eq!(rx.recv().await.unwrap().request_id(), request_id);
    }

    #[test]
    fn test_try_request_full() {
        let (bus, _requests) = ConnectionBus::channel(1);
        assert!(bus.try_request(TcpSettings::new("a", 502).into()).is_ok());
        assert_eq!(
            bus.try_request(TcpSettings::new("b", 502).into()),
            Err(BusError::Full)
        );
    }
}
