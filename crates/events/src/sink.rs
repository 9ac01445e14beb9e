//! Event recording abstraction.
//!
//! Every ledger operation takes a sink explicitly instead of printing to the
//! console. Production code hands in a [`TracingSink`](crate::TracingSink);
//! tests hand in an [`InMemoryEventSink`](crate::InMemoryEventSink) and assert
//! on what was recorded.
//!
//! Recording cannot fail: a sink that needs IO must buffer or drop, never
//! abort the ledger operation that already happened.

use crate::EventEnvelope;

/// Receives every event an aggregate applies, in application order.
pub trait EventSink<E> {
    fn record(&mut self, envelope: EventEnvelope<E>);
}

impl<E, S> EventSink<E> for &mut S
where
    S: EventSink<E> + ?Sized,
{
    fn record(&mut self, envelope: EventEnvelope<E>) {
        (**self).record(envelope)
    }
}
