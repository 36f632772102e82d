//! Capacity-bounded resource guarded by a priority monitor
//!
//! ```plaintext
//!   acquire(vehicle)
//!        │ lock: compute priority from current mode, enqueue ticket
//!        ▼
//!   ┌──────────────────────────────┐   no    ┌──────────────┐
//!   │ lock: free slot AND my ticket ├───────►│ wait for any │
//!   │       is the queue minimum?   │◄───────┤  broadcast   │
//!   └──────────────┬───────────────┘         └──────────────┘
//!                  │ yes: pop ticket, occupied += 1 (same critical section)
//!                  ▼
//!              PoolPermit ── release / drop ──► occupied -= 1, broadcast
//! ```
//!
//! Every wake re-evaluates the admission predicate; nothing is inferred from the state seen
//! before suspending. Broadcasts are sent on release, on reorder, when a ticket is abandoned,
//! and after an admission that leaves a free slot behind so the next head can take it.

use std::sync::Arc;

use api_types::Phase;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::sync::Notify;

use super::mode::Mode;
use super::mode::ModeObserver;
use super::queue::PriorityWaitQueue;
use super::queue::TicketId;
use super::queue::WaitingEntry;
use super::vehicle::Vehicle;
use crate::error::Result;
use crate::error::WorkshopError;

struct PoolState {
    occupied: usize,
    queue: PriorityWaitQueue,
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub phase: Phase,
    pub capacity: usize,
    pub occupied: usize,
    /// Waiting tickets in admission order
    pub waiting: Vec<WaitingEntry>,
}

pub struct ResourcePool {
    phase: Phase,
    capacity: usize,
    state: Mutex<PoolState>,
    changed: Notify,
    mode: watch::Receiver<Mode>,
}

impl ResourcePool {
    /// Creates a pool whose queue priorities follow `mode`.
    pub fn new(phase: Phase, capacity: usize, mode: watch::Receiver<Mode>) -> Result<Arc<Self>> {
        if capacity == 0 {
            return Err(WorkshopError::InvalidCapacity {
                stage: phase,
                capacity,
            });
        }
        Ok(Arc::new(Self {
            phase,
            capacity,
            state: Mutex::new(PoolState {
                occupied: 0,
                queue: PriorityWaitQueue::new(),
            }),
            changed: Notify::new(),
            mode,
        }))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupied(&self) -> usize {
        self.state.lock().occupied
    }

    pub fn waiting(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock();
        PoolSnapshot {
            phase: self.phase,
            capacity: self.capacity,
            occupied: state.occupied,
            waiting: state.queue.entries(),
        }
    }

    /// Waits until `vehicle` holds one unit of this resource.
    ///
    /// Admission happens only when a slot is free and the vehicle's ticket is the queue
    /// minimum. Dropping the returned future before admission withdraws the ticket.
    pub async fn acquire(self: &Arc<Self>, vehicle: &Arc<Vehicle>) -> PoolPermit {
        let ticket = {
            let mut state = self.state.lock();
            let priority = self.mode.borrow().priority_for(vehicle);
            let ticket = state.queue.insert(vehicle.clone(), priority);
            tracing::debug!(
                stage = %self.phase,
                vehicle = %vehicle.id(),
                priority,
                waiting = state.queue.len(),
                "ticket queued"
            );
            ticket
        };

        let mut pending = PendingTicket {
            pool: self.as_ref(),
            ticket,
            armed: true,
        };

        loop {
            // registered before the check so a broadcast in between is not lost
            let notified = self.changed.notified();
            if self.try_admit(ticket) {
                pending.armed = false;
                tracing::debug!(stage = %self.phase, vehicle = %vehicle.id(), "admitted");
                return PoolPermit {
                    pool: Arc::clone(self),
                };
            }
            notified.await;
        }
    }

    /// Admits `ticket` if a slot is free and it heads the queue.
    fn try_admit(&self, ticket: TicketId) -> bool {
        let cascade = {
            let mut state = self.state.lock();
            if state.occupied >= self.capacity {
                return false;
            }
            match state.queue.peek_min() {
                Some((head, _)) if head.id() == ticket => {}
                _ => return false,
            }
            state.queue.remove_min();
            state.occupied += 1;
            assert!(
                state.occupied <= self.capacity,
                "{} pool over capacity: {} > {}",
                self.phase,
                state.occupied,
                self.capacity
            );
            state.occupied < self.capacity && !state.queue.is_empty()
        };
        if cascade {
            self.changed.notify_waiters();
        }
        true
    }

    fn release_slot(&self) {
        {
            let mut state = self.state.lock();
            assert!(
                state.occupied > 0,
                "{} pool released with nothing occupied",
                self.phase
            );
            state.occupied -= 1;
        }
        self.changed.notify_waiters();
    }

    /// Recomputes every waiting ticket's priority under the current mode and wakes all waiters.
    pub fn reorder_queue(&self) {
        {
            let mut state = self.state.lock();
            if state.queue.is_empty() {
                return;
            }
            let mode = *self.mode.borrow();
            state.queue.recompute_all(|vehicle| mode.priority_for(vehicle));
            tracing::debug!(
                stage = %self.phase,
                mode = mode.code(),
                waiting = state.queue.len(),
                "queue reordered"
            );
        }
        self.changed.notify_waiters();
    }

    fn withdraw(&self, ticket: TicketId) {
        let removed = self.state.lock().queue.remove(ticket);
        if let Some(ticket) = removed {
            tracing::debug!(
                stage = %self.phase,
                vehicle = %ticket.vehicle().id(),
                "ticket withdrawn"
            );
            self.changed.notify_waiters();
        }
    }
}

impl ModeObserver for ResourcePool {
    fn on_mode_change(&self, _mode: Mode) {
        // the mode is re-read under the pool lock
        self.reorder_queue();
    }
}

/// Removes the ticket when an `acquire` is abandoned before admission.
struct PendingTicket<'a> {
    pool: &'a ResourcePool,
    ticket: TicketId,
    armed: bool,
}

impl Drop for PendingTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.withdraw(self.ticket);
        }
    }
}

/// One held unit of a pool's capacity. Released exactly once, on [`PoolPermit::release`] or drop.
#[must_use = "dropping the permit releases the resource immediately"]
pub struct PoolPermit {
    pool: Arc<ResourcePool>,
}

impl PoolPermit {
    pub fn release(self) {
        drop(self);
    }

    pub fn phase(&self) -> Phase {
        self.pool.phase
    }
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        self.pool.release_slot();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use api_types::Category;
    use similar_asserts::assert_eq;
    use test_log::test;
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::ModeRegistry;

    fn pool(capacity: usize) -> (Arc<ResourcePool>, watch::Sender<Mode>) {
        let (sender, receiver) = watch::channel(Mode::OnlyMechanical);
        let pool = ResourcePool::new(Phase::Mechanic, capacity, receiver).expect("valid capacity");
        (pool, sender)
    }

    fn vehicle(id: u32, category: Category) -> Arc<Vehicle> {
        Arc::new(Vehicle::new(id, category, Duration::from_millis(10)))
    }

    async fn until_waiting(pool: &ResourcePool, n: usize) {
        while pool.waiting() < n {
            tokio::task::yield_now().await;
        }
    }

    /// Spawns a task that records its admission on `admitted`, then holds the slot briefly.
    fn spawn_customer(
        pool: &Arc<ResourcePool>,
        vehicle: Arc<Vehicle>,
        admitted: &mpsc::UnboundedSender<u32>,
    ) -> tokio::task::JoinHandle<()> {
        let pool = pool.clone();
        let admitted = admitted.clone();
        tokio::spawn(async move {
            let permit = pool.acquire(&vehicle).await;
            admitted.send(vehicle.id().0).expect("receiver alive");
            tokio::time::sleep(vehicle.service_time()).await;
            permit.release();
        })
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let (_sender, receiver) = watch::channel(Mode::Inactive);
        let err = ResourcePool::new(Phase::Bay, 0, receiver).err().expect("must fail");
        assert!(matches!(
            err,
            WorkshopError::InvalidCapacity {
                stage: Phase::Bay,
                capacity: 0
            }
        ));
    }

    #[test(tokio::test)]
    async fn acquire_and_release_track_occupancy() {
        let (pool, _mode) = pool(2);
        let a = pool.acquire(&vehicle(1, Category::Mechanical)).await;
        let b = pool.acquire(&vehicle(2, Category::Bodywork)).await;
        assert_eq!(pool.occupied(), 2);
        assert_eq!(a.phase(), Phase::Mechanic);

        a.release();
        assert_eq!(pool.occupied(), 1);
        drop(b);
        assert_eq!(pool.occupied(), 0);
        assert_eq!(pool.waiting(), 0);
    }

    #[test(tokio::test(start_paused = true))]
    async fn waiters_admitted_by_priority_then_fifo() {
        let (pool, _mode) = pool(1);
        let blocker = pool.acquire(&vehicle(100, Category::Bodywork)).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let arrivals = [
            (1, Category::Bodywork),
            (2, Category::Electrical),
            (3, Category::Bodywork),
            (4, Category::Mechanical),
            (5, Category::Electrical),
        ];
        let mut handles = Vec::new();
        for (n, (id, category)) in arrivals.into_iter().enumerate() {
            handles.push(spawn_customer(&pool, vehicle(id, category), &tx));
            until_waiting(&pool, n + 1).await;
        }

        blocker.release();
        for handle in handles {
            handle.await.expect("customer task");
        }
        drop(tx);

        let mut order = Vec::new();
        while let Some(id) = rx.recv().await {
            order.push(id);
        }
        assert_eq!(order, vec![4, 2, 5, 1, 3]);
    }

    #[test(tokio::test(start_paused = true))]
    async fn freed_slots_are_all_used() {
        let (pool, _mode) = pool(2);
        let first = pool.acquire(&vehicle(100, Category::Mechanical)).await;
        let second = pool.acquire(&vehicle(101, Category::Mechanical)).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handles: Vec<_> = (1..=3)
            .map(|id| spawn_customer(&pool, vehicle(id, Category::Electrical), &tx))
            .collect();
        until_waiting(&pool, 3).await;

        first.release();
        second.release();

        // both freed slots must be taken without any further release
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(pool.occupied(), 2);
        assert_eq!(pool.waiting(), 1);

        for handle in handles {
            handle.await.expect("customer task");
        }
        assert_eq!(rx.recv().await, Some(3));
        assert_eq!(pool.occupied(), 0);
    }

    #[test(tokio::test(flavor = "multi_thread", worker_threads = 8))]
    async fn reorder_races_with_acquire_and_release() {
        const CAPACITY: usize = 2;
        const FLIPS: usize = 200;
        let registry = Arc::new(ModeRegistry::new(Mode::Inactive));
        let pool = ResourcePool::new(Phase::Bay, CAPACITY, registry.subscribe())
            .expect("valid capacity");
        registry.register(pool.clone());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let flipper = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let modes = [
                    Mode::BoostMechanical,
                    Mode::BoostElectrical,
                    Mode::BoostBodywork,
                    Mode::Inactive,
                ];
                for flip in 0..FLIPS {
                    registry.set(modes[flip % modes.len()]);
                    tokio::task::yield_now().await;
                }
            })
        };

        let customers: Vec<_> = (0..60u32)
            .map(|id| {
                let pool = pool.clone();
                let inside = inside.clone();
                let peak = peak.clone();
                let category = Category::ALL[(id % 3) as usize];
                tokio::spawn(async move {
                    let vehicle = vehicle(id, category);
                    let permit = pool.acquire(&vehicle).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_micros(200)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    permit.release();
                })
            })
            .collect();

        tokio::time::timeout(Duration::from_secs(30), async {
            for customer in customers {
                customer.await.expect("customer task");
            }
            flipper.await.expect("mode flipper");
        })
        .await
        .expect("every vehicle is admitted while modes change");

        assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
        assert_eq!(pool.occupied(), 0);
        assert_eq!(pool.waiting(), 0);
    }

    #[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn occupancy_never_exceeds_capacity() {
        const CAPACITY: usize = 3;
        let (pool, _mode) = pool(CAPACITY);
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..40u32)
            .map(|id| {
                let pool = pool.clone();
                let inside = inside.clone();
                let peak = peak.clone();
                let category = Category::ALL[(id % 3) as usize];
                tokio::spawn(async move {
                    let vehicle = vehicle(id, category);
                    let permit = pool.acquire(&vehicle).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    assert!(pool.occupied() <= CAPACITY);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    permit.release();
                })
            })
            .collect();

        for handle in handles {
            handle.await.expect("customer task");
        }
        assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
        assert_eq!(pool.occupied(), 0);
        assert_eq!(pool.waiting(), 0);
    }

    #[test(tokio::test(start_paused = true))]
    async fn reorder_follows_mode_change() {
        let (pool, mode) = pool(1);
        let blocker = pool.acquire(&vehicle(100, Category::Mechanical)).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mech = spawn_customer(&pool, vehicle(1, Category::Mechanical), &tx);
        until_waiting(&pool, 1).await;
        let body = spawn_customer(&pool, vehicle(2, Category::Bodywork), &tx);
        until_waiting(&pool, 2).await;

        let before: Vec<i8> = pool.snapshot().waiting.iter().map(|e| e.priority).collect();
        assert_eq!(before, vec![0, 2]);

        mode.send_replace(Mode::BoostBodywork);
        pool.reorder_queue();
        let after = pool.snapshot();
        assert_eq!(after.waiting[0].vehicle.0, 2);
        assert_eq!(after.waiting[0].priority, -1);

        blocker.release();
        mech.await.expect("mechanical task");
        body.await.expect("bodywork task");
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(1));
    }

    #[test(tokio::test(start_paused = true))]
    async fn abandoned_acquire_withdraws_ticket() {
        let (pool, _mode) = pool(1);
        let blocker = pool.acquire(&vehicle(100, Category::Mechanical)).await;

        let impatient = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let vehicle = vehicle(1, Category::Mechanical);
                let _permit = pool.acquire(&vehicle).await;
            })
        };
        until_waiting(&pool, 1).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let patient = spawn_customer(&pool, vehicle(2, Category::Bodywork), &tx);
        until_waiting(&pool, 2).await;

        impatient.abort();
        assert!(impatient.await.expect_err("aborted").is_cancelled());
        assert_eq!(pool.waiting(), 1);

        blocker.release();
        patient.await.expect("patient task");
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(pool.occupied(), 0);
    }
}
