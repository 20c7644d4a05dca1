//! Event system for workflow operations
//!
//! Services emit an event after each authoritative state change. Emission
//! never fails the operation; a bus without subscribers drops events.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Events emitted by services
#[derive(Debug, Clone, PartialEq)]
pub enum CapTableEvent {
    DocumentUploaded {
        document_id: String,
        company_id: String,
        signer_count: usize,
    },
    DocumentDeleted {
        document_id: String,
        company_id: String,
    },
    SignatureRecorded {
        request_id: String,
        document_id: String,
        signer_id: String,
    },
    SignatureDeclined {
        request_id: String,
        document_id: String,
        signer_id: String,
        reason: String,
        automatic: bool,
    },
    DocumentCompleted {
        document_id: String,
    },
    SignedArtifactGenerated {
        document_id: String,
        signed_file_path: String,
        regenerated: bool,
    },
    SignedArtifactFailed {
        document_id: String,
        reason: String,
    },
    BoardMemberAdded {
        company_id: String,
        user_id: String,
    },
    BoardMemberRemoved {
        company_id: String,
        user_id: String,
        auto_declined: usize,
    },
    InstrumentConverted {
        instrument_id: String,
        company_id: String,
        shares: f64,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &CapTableEvent);
}

/// Broadcasts workflow events to subscribers
pub struct EventBus {
    sender: broadcast::Sender<CapTableEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: CapTableEvent) {
        trace!(event = ?event, "Emitting event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CapTableEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes workflow events to the log
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &CapTableEvent) {
        match event {
            CapTableEvent::DocumentUploaded { document_id, company_id, signer_count } => {
                info!(document_id = %document_id, company_id = %company_id, signers = signer_count, "Document uploaded");
            }
            CapTableEvent::DocumentCompleted { document_id } => {
                info!(document_id = %document_id, "Document fully signed");
            }
            CapTableEvent::SignedArtifactGenerated { document_id, signed_file_path, regenerated } => {
                info!(
                    document_id = %document_id,
                    path = %signed_file_path,
                    regenerated,
                    "Signed PDF stored"
                );
            }
            CapTableEvent::SignedArtifactFailed { document_id, reason } => {
                warn!(document_id = %document_id, reason = %reason, "Signed PDF not generated");
            }
            CapTableEvent::SignatureDeclined { request_id, automatic: true, .. } => {
                info!(request_id = %request_id, "Signature request declined on membership removal");
            }
            _ => {
                debug!(event = ?event, "Event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(CapTableEvent::DocumentCompleted { document_id: "d1".into() });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");
        assert_eq!(event, CapTableEvent::DocumentCompleted { document_id: "d1".into() });
    }

    #[test]
    fn test_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(CapTableEvent::DocumentDeleted {
            document_id: "d1".into(),
            company_id: "c1".into(),
        });
    }
}
