//! In-memory event sink for tests/dev.

use crate::{Event, EventEnvelope, EventSink};

/// Collects recorded envelopes in order.
///
/// - No IO
/// - Unbounded
#[derive(Debug, Clone)]
pub struct InMemoryEventSink<E> {
    envelopes: Vec<EventEnvelope<E>>,
}

impl<E> InMemoryEventSink<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn envelopes(&self) -> &[EventEnvelope<E>] {
        &self.envelopes
    }

    /// Payloads only, in recording order.
    pub fn events(&self) -> impl Iterator<Item = &E> {
        self.envelopes.iter().map(EventEnvelope::payload)
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }
}

impl<E: Event> InMemoryEventSink<E> {
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().map(Event::event_type).collect()
    }
}

impl<E> Default for InMemoryEventSink<E> {
    fn default() -> Self {
        Self {
            envelopes: Vec::new(),
        }
    }
}

impl<E> EventSink<E> for InMemoryEventSink<E> {
    fn record(&mut self, envelope: EventEnvelope<E>) {
        self.envelopes.push(envelope);
    }
}
