//! Shared CLI utilities and types

pub mod api_client;
pub mod completions;
pub mod display;
pub mod interactive;
pub mod oneshot;

use diagram_common::ConnectionId;

/// Per-request settings shared by one-shot and interactive modes
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Browser render connection that should validate the diagrams
    pub connection_id: Option<ConnectionId>,
    pub validate: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            connection_id: None,
            validate: true,
        }
    }
}
