//! Validation Correlator - bridges pushed render verdicts to awaiting requests
//!
//! Every outstanding validation is registered under its correlation id together
//! with a completion handle and a timer. Exactly one of three paths settles it:
//! - a verdict arrives from the render client (`resolve`)
//! - the validation window elapses (optimistic success)
//! - the render client cannot be addressed (`resolve_unavailable`)
//!
//! Whichever path removes the entry first wins; the others find nothing and
//! become no-ops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use diagram_common::{CorrelationId, ValidationVerdict};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A registered validation awaiting its verdict
struct PendingValidation {
    completion: oneshot::Sender<ValidationVerdict>,
    timeout: JoinHandle<()>,
}

struct CorrelatorInner {
    pending: Mutex<HashMap<CorrelationId, PendingValidation>>,
    timeout: Duration,
}

impl CorrelatorInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, PendingValidation>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self, correlation_id: &CorrelationId) -> Option<PendingValidation> {
        self.lock().remove(correlation_id)
    }

    fn fire_timeout(&self, correlation_id: &CorrelationId) {
        if let Some(entry) = self.take(correlation_id) {
            info!(
                correlation_id = %correlation_id,
                timeout_ms = self.timeout.as_millis() as u64,
                "No render verdict in time, resolving optimistically"
            );
            let _ = entry
                .completion
                .send(ValidationVerdict::timed_out(correlation_id.clone()));
        }
    }
}

/// Process-wide registry of in-flight validations
#[derive(Clone)]
pub struct ValidationCorrelator {
    inner: Arc<CorrelatorInner>,
}

/// Awaitable side of a registered validation
#[derive(Debug)]
pub struct PendingVerdict {
    correlation_id: CorrelationId,
    receiver: oneshot::Receiver<ValidationVerdict>,
}

impl PendingVerdict {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Wait for the verdict. Always yields one; never errors.
    pub async fn wait(self) -> ValidationVerdict {
        match self.receiver.await {
            Ok(verdict) => verdict,
            // Sender dropped without resolving: the correlator itself went away
            Err(_) => ValidationVerdict::unreachable(self.correlation_id),
        }
    }
}

impl ValidationCorrelator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(CorrelatorInner {
                pending: Mutex::new(HashMap::new()),
                timeout,
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Insert a pending validation and start its timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(&self, correlation_id: CorrelationId) -> PendingVerdict {
        let (completion, receiver) = oneshot::channel();
        let mut pending = self.inner.lock();

        if pending.contains_key(&correlation_id) {
            drop(pending);
            warn!(
                correlation_id = %correlation_id,
                "Correlation id already pending, resolving duplicate registration immediately"
            );
            let _ = completion.send(ValidationVerdict::unreachable(correlation_id.clone()));
            return PendingVerdict {
                correlation_id,
                receiver,
            };
        }

        let inner = Arc::clone(&self.inner);
        let timer_id = correlation_id.clone();
        let window = self.inner.timeout;
        let timeout = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            inner.fire_timeout(&timer_id);
        });

        pending.insert(
            correlation_id.clone(),
            PendingValidation {
                completion,
                timeout,
            },
        );
        debug!(
            correlation_id = %correlation_id,
            in_flight = pending.len(),
            "Registered pending validation"
        );

        PendingVerdict {
            correlation_id,
            receiver,
        }
    }

    /// Settle a pending validation with a verdict.
    ///
    /// Returns `false` for unknown or already-settled ids; late and duplicate
    /// verdicts are expected and are dropped quietly.
    pub fn resolve(&self, verdict: ValidationVerdict) -> bool {
        match self.inner.take(&verdict.correlation_id) {
            Some(entry) => {
                entry.timeout.abort();
                debug!(
                    correlation_id = %verdict.correlation_id,
                    success = verdict.success,
                    origin = ?verdict.origin,
                    "Resolved pending validation"
                );
                let _ = entry.completion.send(verdict);
                true
            }
            None => {
                debug!(
                    correlation_id = %verdict.correlation_id,
                    "Dropping verdict for unknown or settled validation"
                );
                false
            }
        }
    }

    /// Settle immediately because the render client cannot be reached
    pub fn resolve_unavailable(&self, correlation_id: &CorrelationId) -> bool {
        self.resolve(ValidationVerdict::unreachable(correlation_id.clone()))
    }

    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.inner.lock().contains_key(correlation_id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().len()
    }
}

impl std::fmt::Debug for ValidationCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationCorrelator")
            .field("timeout", &self.inner.timeout)
            .field("pending", &self.pending_count())
            .finish()
    }
}
