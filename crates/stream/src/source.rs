//! Event lookup by id

use txstream_common::{Event, EventId};

/// Read-only source of events, safe for concurrent lookup
pub trait EventSource: Send + Sync {
    /// Get the event at a stream position
    fn get(&self, id: EventId) -> Option<&Event>;

    /// Number of positions in the stream
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Event source backed by a vector indexed by event id
#[derive(Debug, Clone, Default)]
pub struct VecEventSource {
    events: Vec<Event>,
}

impl VecEventSource {
    /// Create a source where `events[i]` is the event with id `i`
    ///
    /// An event whose id doesn't match its position is never returned.
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

impl EventSource for VecEventSource {
    fn get(&self, id: EventId) -> Option<&Event> {
        let index = usize::try_from(id).ok()?;
        self.events.get(index).filter(|event| event.id == id)
    }

    fn len(&self) -> u64 {
        self.events.len() as u64
    }
}

impl FromIterator<Event> for VecEventSource {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
