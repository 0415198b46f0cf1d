//! Time-ordered queue of pending simulation events.
//!
//! Events are ordered by `(due_time, sequence)`. The sequence is assigned at
//! push time, so events due at the same instant pop in insertion order and a
//! replay with the same seed pops the exact same sequence.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::beam_interface::SimTime;

/// A pending event. Immutable once pushed.
#[derive(Debug, Clone)]
pub struct Event<E> {
    pub due_time: SimTime,
    pub sequence: u64,
    pub payload: E,
}

impl<E> PartialEq for Event<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E> Eq for Event<E> {}

impl<E> PartialOrd for Event<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Event<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap yields the earliest event first
        other
            .due_time
            .total_cmp(&self.due_time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

pub struct EventQueue<E> {
    heap: BinaryHeap<Event<E>>,
    next_sequence: u64,
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Insert an event, returning the sequence number it was given
    pub fn push(&mut self, due_time: SimTime, payload: E) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Event {
            due_time,
            sequence,
            payload,
        });
        sequence
    }

    pub fn pop_earliest(&mut self) -> Option<Event<E>> {
        self.heap.pop()
    }

    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.due_time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop every pending event. Sequence numbering keeps counting.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_empty_queue() {
        let mut queue: EventQueue<()> = EventQueue::new();
        assert!(queue.is_empty());
        assert!(queue.peek_time().is_none());
        assert!(queue.pop_earliest().is_none());
    }

    #[test]
    fn test_pops_in_time_order() {
        let mut queue = EventQueue::new();
        queue.push(30.0, "c");
        queue.push(10.0, "a");
        queue.push(20.0, "b");

        assert_eq!(queue.peek_time(), Some(10.0));
        let order: Vec<_> = std::iter::from_fn(|| queue.pop_earliest())
            .map(|e| e.payload)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_pop_in_push_order() {
        let mut queue = EventQueue::new();
        for i in 0..50 {
            queue.push(5.0, i);
        }
        queue.push(1.0, 1000);

        assert_eq!(queue.pop_earliest().unwrap().payload, 1000);
        for i in 0..50 {
            let event = queue.pop_earliest().unwrap();
            assert_eq!(event.payload, i, "simultaneous events must be FIFO");
            assert_eq!(event.due_time, 5.0);
        }
    }

    #[test]
    fn test_randomized_ordering() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut queue = EventQueue::new();

        for i in 0..2_000usize {
            // Few distinct times so ties are frequent
            let due = rng.gen_range(0..40) as SimTime;
            queue.push(due, i);
        }

        let mut last: Option<(SimTime, usize)> = None;
        while let Some(event) = queue.pop_earliest() {
            if let Some((time, payload)) = last {
                assert!(event.due_time >= time, "time went backwards");
                if event.due_time == time {
                    assert!(event.payload > payload, "tie broken out of push order");
                }
            }
            last = Some((event.due_time, event.payload));
        }
    }

    #[test]
    fn test_sequence_survives_clear() {
        let mut queue = EventQueue::new();
        assert_eq!(queue.push(1.0, ()), 0);
        assert_eq!(queue.push(1.0, ()), 1);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.push(1.0, ()), 2);
        assert_eq!(queue.len(), 1);
    }
}
