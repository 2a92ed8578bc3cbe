use std::sync::Arc;

use tracing::{debug, warn};

use construkt_core::audit::{AuditEvent, AuditSink, TurnLogEntry, TurnLogSink};
use construkt_db::repositories::ChatLogRepository;

/// Writes completed turns to the chat log store off the reply path.
///
/// `record` spawns the insert on the current Tokio runtime and returns at
/// once. Failures are logged and otherwise ignored.
pub struct RepositoryTurnLogSink {
    repository: Arc<dyn ChatLogRepository>,
}

impl RepositoryTurnLogSink {
    pub fn new(repository: Arc<dyn ChatLogRepository>) -> Self {
        Self { repository }
    }
}

impl TurnLogSink for RepositoryTurnLogSink {
    fn record(&self, entry: TurnLogEntry) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(
                    event_name = "turn_log.dropped",
                    correlation_id = %entry.correlation_id,
                    "no async runtime available to record the turn"
                );
                return;
            }
        };

        let repository = Arc::clone(&self.repository);
        handle.spawn(async move {
            if let Err(error) = repository.record(&entry).await {
                warn!(
                    event_name = "turn_log.write.failed",
                    correlation_id = %entry.correlation_id,
                    error = %error,
                    "chat log entry was not stored"
                );
            }
        });
    }
}

/// Emits audit events as debug-level tracing records.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        debug!(
            event_name = %event.event_type,
            correlation_id = %event.correlation_id,
            user_id = %event.user_id,
            category = ?event.category,
            outcome = ?event.outcome,
            metadata = ?event.metadata,
            "audit"
        );
    }
}
