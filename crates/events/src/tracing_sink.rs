//! Sink that turns events into structured `tracing` records.

use core::fmt::Display;

use crate::{Event, EventEnvelope, EventSink};

/// Logs each event with its envelope metadata and business time.
///
/// Rejections go out at `warn`, everything else at `info`. The event's
/// `Display` impl supplies the human-readable message.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl<E> EventSink<E> for TracingSink
where
    E: Event + Display,
{
    fn record(&mut self, envelope: EventEnvelope<E>) {
        let event = envelope.payload();
        if event.is_rejection() {
            tracing::warn!(
                event_id = %envelope.event_id(),
                event_type = event.event_type(),
                schema_version = event.version(),
                stream = envelope.aggregate_id(),
                sequence = envelope.sequence_number(),
                occurred_at = %event.occurred_at(),
                "{event}"
            );
        } else {
            tracing::info!(
                event_id = %envelope.event_id(),
                event_type = event.event_type(),
                schema_version = event.version(),
                stream = envelope.aggregate_id(),
                sequence = envelope.sequence_number(),
                occurred_at = %event.occurred_at(),
                "{event}"
            );
        }
    }
}
