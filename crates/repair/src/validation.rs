use std::sync::Arc;

use diagram_common::{ConnectionId, ValidationRequest, ValidationVerdict};
use tracing::{instrument, warn};

use crate::channel::RenderChannel;
use crate::correlator::ValidationCorrelator;
use crate::events::RepairEvent;

/// One render round trip: register, push to the client, await the verdict.
#[derive(Clone)]
pub struct RemoteValidator {
    correlator: ValidationCorrelator,
    channel: Arc<dyn RenderChannel>,
}

impl RemoteValidator {
    pub fn new(correlator: ValidationCorrelator, channel: Arc<dyn RenderChannel>) -> Self {
        Self { correlator, channel }
    }

    pub fn correlator(&self) -> &ValidationCorrelator {
        &self.correlator
    }

    pub async fn is_available(&self, connection: &ConnectionId) -> bool {
        self.channel.is_connected(connection).await
    }

    /// Never fails: an unreachable client resolves at once as an optimistic success.
    #[instrument(skip(self, diagram_source), fields(connection_id = %connection, diagram_len = diagram_source.len()))]
    pub async fn validate(&self, connection: &ConnectionId, diagram_source: &str) -> ValidationVerdict {
        let request = ValidationRequest::new(diagram_source);
        let correlation_id = request.correlation_id.clone();
        let pending = self.correlator.register(correlation_id.clone());

        if let Err(e) = self.channel.send_validation(connection, request).await {
            warn!(
                error = %e,
                correlation_id = %correlation_id,
                "Render client unreachable, skipping validation"
            );
            self.correlator.resolve_unavailable(&correlation_id);
        }

        pending.wait().await
    }

    /// Fire-and-forget progress notification
    pub async fn notify(&self, connection: &ConnectionId, event: RepairEvent) {
        if let Err(e) = self.channel.send_event(connection, event).await {
            tracing::debug!(error = %e, "Progress event not delivered");
        }
    }
}
