//! Publishes domain events to NATS when a connection is configured.

use chrono::Utc;

use crate::domain::events::{DomainEvent, EventEnvelope};

#[derive(Clone, Debug, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    /// Best effort: failures are logged and never reach the caller.
    pub async fn publish(&self, event: DomainEvent) {
        let subject = event.subject();
        let Some(client) = &self.nats else {
            tracing::debug!(%subject, "No event bus configured, dropping event");
            return;
        };
        let payload = match serde_json::to_vec(&EventEnvelope::new(event, Utc::now())) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(%subject, error = %e, "Failed to encode event");
                return;
            }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            tracing::warn!(%subject, error = %e, "Failed to publish event");
        }
    }
}
