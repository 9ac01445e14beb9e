use uuid::Uuid;

use familynet_core::Aggregate;

use crate::{EventEnvelope, EventSink};

/// Execute an aggregate command deterministically and record what happened.
///
/// 1. **Decide**: `aggregate.handle(command)` returns events (pure, no mutation).
/// 2. **Evolve + record**: see [`commit`].
///
/// A rejected command (`Err`) applies and records nothing.
pub fn execute<A, S>(
    aggregate: &mut A,
    command: &A::Command,
    sink: &mut S,
) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
    S: EventSink<A::Event> + ?Sized,
{
    let events = A::handle(aggregate, command)?;
    commit(aggregate, &events, sink);
    Ok(events)
}

/// Apply already-decided events in order, handing each one to `sink` wrapped
/// in an envelope stamped with the aggregate's new version.
pub fn commit<A, S>(aggregate: &mut A, events: &[A::Event], sink: &mut S)
where
    A: Aggregate,
    S: EventSink<A::Event> + ?Sized,
{
    for ev in events {
        A::apply(aggregate, ev);
        sink.record(EventEnvelope::new(
            Uuid::now_v7(),
            aggregate.id().to_string(),
            A::AGGREGATE_TYPE,
            aggregate.version(),
            ev.clone(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use familynet_core::AggregateRoot;

    use super::*;
    use crate::InMemoryEventSink;

    #[derive(Debug)]
    struct Counter {
        id: String,
        total: i64,
        version: u64,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                id: "c-1".to_string(),
                total: 0,
                version: 0,
            }
        }
    }

    #[derive(Debug, Clone)]
    enum CounterCommand {
        Add(Vec<i64>),
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Added(i64);

    impl AggregateRoot for Counter {
        type Id = String;
        const AGGREGATE_TYPE: &'static str = "counter";

        fn id(&self) -> &Self::Id {
            &self.id
        }

        fn version(&self) -> u64 {
            self.version
        }
    }

    impl Aggregate for Counter {
        type Command = CounterCommand;
        type Event = Added;
        type Error = String;

        fn apply(&mut self, event: &Added) {
            self.total += event.0;
            self.version += 1;
        }

        fn handle(&self, command: &CounterCommand) -> Result<Vec<Added>, String> {
            let CounterCommand::Add(values) = command;
            if values.iter().any(|v| *v == 0) {
                return Err("zero is not allowed".to_string());
            }
            Ok(values.iter().copied().map(Added).collect())
        }
    }

    #[test]
    fn execute_applies_and_records_in_order() {
        let mut counter = Counter::new();
        let mut sink = InMemoryEventSink::new();

        let events = execute(&mut counter, &CounterCommand::Add(vec![2, 3]), &mut sink).unwrap();

        assert_eq!(events, vec![Added(2), Added(3)]);
        assert_eq!(counter.total, 5);
        let seqs: Vec<u64> = sink.envelopes().iter().map(|e| e.sequence_number()).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert!(sink.envelopes().iter().all(|e| e.aggregate_id() == "c-1"));
        assert!(sink.envelopes().iter().all(|e| e.aggregate_type() == "counter"));
        assert_ne!(sink.envelopes()[0].event_id(), sink.envelopes()[1].event_id());
    }

    #[test]
    fn rejected_command_records_nothing() {
        let mut counter = Counter::new();
        let mut sink = InMemoryEventSink::new();

        let err = execute(&mut counter, &CounterCommand::Add(vec![1, 0]), &mut sink).unwrap_err();

        assert_eq!(err, "zero is not allowed");
        assert_eq!(counter.version, 0);
        assert!(sink.is_empty());
    }
}
