//! Priority wait queue shared by every resource pool
//!
//! Tickets are ordered by current priority (lower value first) and then by enqueue order.
//! The queue itself is not synchronized; the owning pool keeps it behind its monitor lock,
//! so a recompute is never observed half done.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use std::time::Instant;

use priority_queue::PriorityQueue;

use super::vehicle::Vehicle;
use super::vehicle::VehicleId;

/// Enqueue sequence number, unique within one queue and increasing with enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketId(u64);

/// A vehicle waiting for a resource.
#[derive(Debug, Clone)]
pub struct Ticket {
    id: TicketId,
    vehicle: Arc<Vehicle>,
    enqueued_at: Instant,
}

impl Ticket {
    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn vehicle(&self) -> &Arc<Vehicle> {
        &self.vehicle
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }
}

// Identity is the ticket id alone so the heap can be addressed by `TicketId`.
impl PartialEq for Ticket {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Ticket {}

impl Hash for Ticket {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Borrow<TicketId> for Ticket {
    fn borrow(&self) -> &TicketId {
        &self.id
    }
}

/// Heap key. `PriorityQueue` pops the greatest key, so the ordering is reversed: a lower level
/// is greater, and among equal levels the earlier ticket is greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Urgency {
    level: i8,
    seq: TicketId,
}

impl Ord for Urgency {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .level
            .cmp(&self.level)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Urgency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Snapshot of one waiting ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitingEntry {
    pub ticket: TicketId,
    pub vehicle: VehicleId,
    pub priority: i8,
}

#[derive(Debug, Default)]
pub struct PriorityWaitQueue {
    heap: PriorityQueue<Ticket, Urgency>,
    next_seq: u64,
}

impl PriorityWaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a ticket for `vehicle` with the given current priority.
    pub fn insert(&mut self, vehicle: Arc<Vehicle>, priority: i8) -> TicketId {
        let id = TicketId(self.next_seq);
        self.next_seq += 1;
        let ticket = Ticket {
            id,
            vehicle,
            enqueued_at: Instant::now(),
        };
        self.heap.push(
            ticket,
            Urgency {
                level: priority,
                seq: id,
            },
        );
        id
    }

    /// The ticket that would be admitted next, with its current priority.
    pub fn peek_min(&self) -> Option<(&Ticket, i8)> {
        self.heap.peek().map(|(ticket, urgency)| (ticket, urgency.level))
    }

    pub fn remove_min(&mut self) -> Option<Ticket> {
        self.heap.pop().map(|(ticket, _)| ticket)
    }

    /// Drops a specific ticket regardless of its position.
    pub fn remove(&mut self, id: TicketId) -> Option<Ticket> {
        self.heap.remove(&id).map(|(ticket, _)| ticket)
    }

    pub fn priority_of(&self, id: TicketId) -> Option<i8> {
        self.heap.get_priority(&id).map(|urgency| urgency.level)
    }

    /// Re-derives every ticket's priority and restores the heap order.
    pub fn recompute_all<F>(&mut self, mut priority_fn: F)
    where
        F: FnMut(&Vehicle) -> i8,
    {
        // the heap is rebuilt when the iterator is dropped
        for (ticket, urgency) in self.heap.iter_mut() {
            urgency.level = priority_fn(&ticket.vehicle);
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Waiting tickets in admission order.
    pub fn entries(&self) -> Vec<WaitingEntry> {
        let mut heap = self.heap.clone();
        let mut entries = Vec::with_capacity(heap.len());
        while let Some((ticket, urgency)) = heap.pop() {
            entries.push(WaitingEntry {
                ticket: ticket.id,
                vehicle: ticket.vehicle.id(),
                priority: urgency.level,
            });
        }
        entries
    }
}
