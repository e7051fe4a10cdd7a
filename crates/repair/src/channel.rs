//! Remote Render Channel - per-connection addressing of render clients
//!
//! Validation requests go to exactly one connection, the one that issued the
//! generation request. Nothing here ever broadcasts: a verdict from one user's
//! browser must never settle another user's validation.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use diagram_common::{ConnectionId, CorrelationId, ValidationRequest, ValidationVerdict};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::correlator::ValidationCorrelator;
use crate::error::ChannelError;
use crate::events::RepairEvent;

/// Server → render client frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    /// First frame on every connection; the client quotes this id in `/generate`
    Connected { connection_id: ConnectionId },
    /// Render this source and answer with a verdict
    Validate {
        correlation_id: CorrelationId,
        diagram_source: String,
    },
    Progress { event: RepairEvent },
}

impl From<ValidationRequest> for OutboundMessage {
    fn from(request: ValidationRequest) -> Self {
        Self::Validate {
            correlation_id: request.correlation_id,
            diagram_source: request.diagram_source,
        }
    }
}

/// Render client → server frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    Verdict {
        correlation_id: CorrelationId,
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

impl InboundMessage {
    pub fn into_verdict(self) -> ValidationVerdict {
        match self {
            Self::Verdict {
                correlation_id,
                success: true,
                ..
            } => ValidationVerdict::passed(correlation_id),
            Self::Verdict {
                correlation_id,
                success: false,
                error,
            } => ValidationVerdict::failed(
                correlation_id,
                error.unwrap_or_else(|| "Unknown render error".to_string()),
            ),
        }
    }
}

/// Transport that can reach one specific render client
#[async_trait]
pub trait RenderChannel: Send + Sync {
    /// Whether `connection` can currently receive frames
    async fn is_connected(&self, connection: &ConnectionId) -> bool;

    /// Push a validation request to `connection` only
    async fn send_validation(
        &self,
        connection: &ConnectionId,
        request: ValidationRequest,
    ) -> Result<(), ChannelError>;

    /// Best-effort progress notification
    async fn send_event(&self, connection: &ConnectionId, event: RepairEvent) -> Result<(), ChannelError>;
}

struct RenderConnection {
    sender: mpsc::UnboundedSender<OutboundMessage>,
    /// Validations issued to this connection that may still be pending
    in_flight: HashSet<CorrelationId>,
}

/// In-process registry of live render connections.
///
/// The transport layer owns the socket; it drains the receiver handed out by
/// [`ConnectionRegistry::connect`] and feeds verdicts back through
/// [`ConnectionRegistry::deliver_verdict`].
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, RenderConnection>>,
    correlator: ValidationCorrelator,
}

impl ConnectionRegistry {
    pub fn new(correlator: ValidationCorrelator) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            correlator,
        }
    }

    /// Register a new connection; its first queued frame is `Connected`
    pub async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundMessage>) {
        let connection_id = ConnectionId::new();
        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(OutboundMessage::Connected {
            connection_id: connection_id.clone(),
        });

        let mut connections = self.connections.write().await;
        connections.insert(
            connection_id.clone(),
            RenderConnection {
                sender,
                in_flight: HashSet::new(),
            },
        );
        info!(
            connection_id = %connection_id,
            connections = connections.len(),
            "Render connection registered"
        );

        (connection_id, receiver)
    }

    /// Drop a connection and release its outstanding validations at once.
    ///
    /// Returns how many pending validations were released.
    pub async fn disconnect(&self, connection_id: &ConnectionId) -> usize {
        let removed = self.connections.write().await.remove(connection_id);
        let Some(connection) = removed else {
            return 0;
        };

        let released = connection
            .in_flight
            .iter()
            .filter(|id| self.correlator.resolve_unavailable(id))
            .count();

        info!(
            connection_id = %connection_id,
            released,
            "Render connection removed"
        );
        released
    }

    /// Route a verdict received on `connection_id` to the correlator.
    ///
    /// Verdicts for ids that were never issued to this connection are ignored.
    pub async fn deliver_verdict(&self, connection_id: &ConnectionId, verdict: ValidationVerdict) -> bool {
        let owned = {
            let mut connections = self.connections.write().await;
            connections
                .get_mut(connection_id)
                .map(|connection| connection.in_flight.remove(&verdict.correlation_id))
                .unwrap_or(false)
        };

        if !owned {
            debug!(
                connection_id = %connection_id,
                correlation_id = %verdict.correlation_id,
                "Ignoring verdict not issued to this connection"
            );
            return false;
        }

        self.correlator.resolve(verdict)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub fn correlator(&self) -> &ValidationCorrelator {
        &self.correlator
    }

    async fn push(&self, connection_id: &ConnectionId, message: OutboundMessage) -> Result<(), ChannelError> {
        let connections = self.connections.read().await;
        let connection = connections
            .get(connection_id)
            .ok_or_else(|| ChannelError::NotConnected(connection_id.clone()))?;
        connection
            .sender
            .send(message)
            .map_err(|_| ChannelError::Closed(connection_id.clone()))
    }
}

#[async_trait]
impl RenderChannel for ConnectionRegistry {
    async fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.connections
            .read()
            .await
            .get(connection_id)
            .map(|connection| !connection.sender.is_closed())
            .unwrap_or(false)
    }

    async fn send_validation(
        &self,
        connection_id: &ConnectionId,
        request: ValidationRequest,
    ) -> Result<(), ChannelError> {
        let mut connections = self.connections.write().await;
        let connection = connections
            .get_mut(connection_id)
            .ok_or_else(|| ChannelError::NotConnected(connection_id.clone()))?;

        // Forget ids the correlator already settled (timeouts, late verdicts)
        connection.in_flight.retain(|id| self.correlator.is_pending(id));

        let correlation_id = request.correlation_id.clone();
        if connection.sender.send(request.into()).is_err() {
            warn!(connection_id = %connection_id, "Render connection closed while sending");
            return Err(ChannelError::Closed(connection_id.clone()));
        }
        connection.in_flight.insert(correlation_id.clone());

        debug!(
            connection_id = %connection_id,
            correlation_id = %correlation_id,
            in_flight = connection.in_flight.len(),
            "Validation request sent"
        );
        Ok(())
    }

    async fn send_event(&self, connection_id: &ConnectionId, event: RepairEvent) -> Result<(), ChannelError> {
        self.push(connection_id, OutboundMessage::Progress { event }).await
    }
}
