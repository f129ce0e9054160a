//! Event scheduling for the simulation engine.
//!
//! Events are processed in time order; events scheduled for the same instant
//! are ordered by a monotonically increasing sequence number so a run is
//! fully deterministic regardless of heap internals.

use std::{cmp::Ordering, collections::BinaryHeap, time::Duration};

use crate::module::ModuleId;

/// Handle identifying one armed timer.
///
/// A handle is issued per arm and never reused, so a module can tell the
/// firing of the timer it armed apart from anything else by comparing
/// handles rather than relying on object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub(crate) u64);

/// Events that can be scheduled in the simulation.
///
/// The inbound event kind is an explicit tag: a module is handed either a
/// delivered unit or the firing of a timer, never an ambiguous "message" it
/// must classify by identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<M> {
    /// A unit of data arriving at a module after channel latency.
    Delivery {
        /// The module the unit is delivered to.
        dst: ModuleId,
        /// The unit being delivered.
        unit: M,
    },

    /// An armed timer reaching its deadline.
    TimerFired {
        /// The module that armed the timer.
        owner: ModuleId,
        /// The handle issued when the timer was armed.
        handle: TimerHandle,
    },
}

/// An event scheduled for execution at a specific simulation time.
#[derive(Debug, Clone)]
pub struct ScheduledEvent<M> {
    time: Duration,
    event: Event<M>,
    sequence: u64, // For deterministic ordering
}

impl<M> ScheduledEvent<M> {
    /// Creates a new scheduled event.
    pub fn new(time: Duration, event: Event<M>, sequence: u64) -> Self {
        Self {
            time,
            event,
            sequence,
        }
    }

    /// Returns the scheduled execution time.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Returns a reference to the event.
    pub fn event(&self) -> &Event<M> {
        &self.event
    }

    /// Consumes the scheduled event and returns the event.
    pub fn into_event(self) -> Event<M> {
        self.event
    }
}

// Ordering is over (time, sequence) only, so the payload type needs no
// ordering bounds.
impl<M> PartialEq for ScheduledEvent<M> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl<M> Eq for ScheduledEvent<M> {}

impl<M> PartialOrd for ScheduledEvent<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> Ord for ScheduledEvent<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max heap, but we want earliest time first, so the
        // comparison is reversed. Sequence numbers break ties at the same
        // instant (also reversed).
        match other.time.cmp(&self.time) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ordering => ordering,
        }
    }
}

/// A priority queue for scheduling events in chronological order.
#[derive(Debug)]
pub struct EventQueue<M> {
    heap: BinaryHeap<ScheduledEvent<M>>,
}

impl<M> EventQueue<M> {
    /// Creates a new empty event queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Schedules an event for execution.
    pub fn schedule(&mut self, event: ScheduledEvent<M>) {
        self.heap.push(event);
    }

    /// Removes and returns the earliest scheduled event.
    pub fn pop_earliest(&mut self) -> Option<ScheduledEvent<M>> {
        self.heap.pop()
    }

    /// Returns the earliest scheduled event without removing it.
    pub fn peek_earliest(&self) -> Option<&ScheduledEvent<M>> {
        self.heap.peek()
    }

    /// Returns `true` if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns the number of events in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

impl<M> Default for EventQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(dst: usize, unit: &'static str) -> Event<&'static str> {
        Event::Delivery {
            dst: ModuleId(dst),
            unit,
        }
    }

    #[test]
    fn event_queue_ordering() {
        let mut queue = EventQueue::new();

        // Schedule events out of order
        queue.schedule(ScheduledEvent::new(
            Duration::from_millis(300),
            delivery(0, "c"),
            2,
        ));
        queue.schedule(ScheduledEvent::new(
            Duration::from_millis(100),
            delivery(0, "a"),
            0,
        ));
        queue.schedule(ScheduledEvent::new(
            Duration::from_millis(200),
            delivery(0, "b"),
            1,
        ));

        // Should pop in time order
        let event1 = queue.pop_earliest().unwrap();
        assert_eq!(event1.time(), Duration::from_millis(100));
        assert_eq!(event1.event(), &delivery(0, "a"));

        let event2 = queue.pop_earliest().unwrap();
        assert_eq!(event2.time(), Duration::from_millis(200));
        assert_eq!(event2.event(), &delivery(0, "b"));

        let event3 = queue.pop_earliest().unwrap();
        assert_eq!(event3.time(), Duration::from_millis(300));
        assert_eq!(event3.event(), &delivery(0, "c"));

        assert!(queue.is_empty());
    }

    #[test]
    fn same_time_deterministic_ordering() {
        let mut queue = EventQueue::new();
        let same_time = Duration::from_millis(100);

        queue.schedule(ScheduledEvent::new(same_time, delivery(0, "third"), 2));
        queue.schedule(ScheduledEvent::new(same_time, delivery(0, "first"), 0));
        queue.schedule(ScheduledEvent::new(same_time, delivery(0, "second"), 1));

        // Sequence numbers break the tie
        assert_eq!(
            queue.pop_earliest().unwrap().into_event(),
            delivery(0, "first")
        );
        assert_eq!(
            queue.pop_earliest().unwrap().into_event(),
            delivery(0, "second")
        );
        assert_eq!(
            queue.pop_earliest().unwrap().into_event(),
            delivery(0, "third")
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn timer_events_order_with_deliveries() {
        let mut queue = EventQueue::new();

        queue.schedule(ScheduledEvent::new(
            Duration::from_secs(1),
            Event::TimerFired {
                owner: ModuleId(0),
                handle: TimerHandle(7),
            },
            1,
        ));
        queue.schedule(ScheduledEvent::new(Duration::from_millis(1), delivery(1, "x"), 0));

        assert_eq!(queue.len(), 2);
        assert_eq!(
            queue.pop_earliest().unwrap().time(),
            Duration::from_millis(1)
        );
        let timer = queue.pop_earliest().unwrap();
        assert_eq!(
            timer.into_event(),
            Event::TimerFired {
                owner: ModuleId(0),
                handle: TimerHandle(7),
            }
        );
    }
}
