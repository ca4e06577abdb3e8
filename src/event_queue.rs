//! Growth Event Queue
//!
//! Ordered store of upcoming growth events keyed by activation time. The queue is monotone:
//! producers only derive times at or after the current time, so popped times never decrease.
//! Entries are validated lazily at pop time against the cluster store; stale entries are
//! popped and dropped.
//!

use crate::util::*;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthEvent {
    /// the cheapest outgoing edge part of a cluster reaches its contribution target
    EdgePartActive { cluster: ClusterIndex },
    /// a cluster exhausts its prize credit and stops growing
    ClusterDeactivation { cluster: ClusterIndex },
}

impl GrowthEvent {
    /// at equal times, edge events fire before deactivations
    fn kind_priority(&self) -> u8 {
        match self {
            GrowthEvent::EdgePartActive { .. } => 0,
            GrowthEvent::ClusterDeactivation { .. } => 1,
        }
    }
}

#[derive(Debug)]
pub struct FutureEvent {
    /// when the event will happen
    pub time: Weight,
    /// insertion order, the final tie-breaker
    pub seq: usize,
    /// the event
    pub event: GrowthEvent,
}

impl PartialEq for FutureEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FutureEvent {}

impl Ord for FutureEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.event.kind_priority().cmp(&other.event.kind_priority()))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for FutureEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub type MinBinaryHeap<F> = BinaryHeap<Reverse<F>>;

#[derive(Debug, Default)]
pub struct EventQueue {
    heap: MinBinaryHeap<FutureEvent>,
    seq_counter: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn will_happen(&mut self, time: Weight, event: GrowthEvent) {
        let seq = self.seq_counter;
        self.seq_counter += 1;
        self.heap.push(Reverse(FutureEvent { time, seq, event }))
    }

    pub fn peek_event(&self) -> Option<(&Weight, &GrowthEvent)> {
        self.heap.peek().map(|future| (&future.0.time, &future.0.event))
    }

    pub fn pop_event(&mut self) -> Option<(Weight, GrowthEvent)> {
        self.heap.pop().map(|future| (future.0.time, future.0.event))
    }
}
