//! Domain events and the sinks they are recorded into.

pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_sink;
pub mod sink;
pub mod tracing_sink;

pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::{commit, execute};
pub use in_memory_sink::InMemoryEventSink;
pub use sink::EventSink;
pub use tracing_sink::TracingSink;
