//! Workshop controller: entry gate, stage pipeline and run completion

use std::sync::Arc;
use std::time::Duration;

use api_types::Phase;
use api_types::StageEvent;
use api_types::Transition;
use tokio::sync::broadcast;
use tokio::sync::watch;
use tokio::time::Instant;

use super::mode::Mode;
use super::mode::ModeChange;
use super::mode::ModeRegistry;
use super::pool::ResourcePool;
use super::vehicle::Vehicle;
use crate::error::Result;

/// Stage events buffered per subscriber before the slowest one starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Number of parallel units at each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageCapacities {
    pub bays: usize,
    pub mechanics: usize,
    pub cleaners: usize,
    pub inspectors: usize,
}

impl Default for StageCapacities {
    fn default() -> Self {
        Self {
            bays: 6,
            mechanics: 3,
            cleaners: 2,
            inspectors: 2,
        }
    }
}

pub struct WorkshopController {
    registry: Arc<ModeRegistry>,
    bay: Arc<ResourcePool>,
    mechanic: Arc<ResourcePool>,
    cleaning: Arc<ResourcePool>,
    inspection: Arc<ResourcePool>,
    events: broadcast::Sender<StageEvent>,
    outstanding: watch::Sender<usize>,
    started: Instant,
}

impl WorkshopController {
    /// Builds the four pools and wires them to a fresh mode registry.
    ///
    /// Fails before anything runs if a capacity is zero.
    pub fn new(capacities: StageCapacities, initial_mode: Mode) -> Result<Arc<Self>> {
        let registry = Arc::new(ModeRegistry::new(initial_mode));

        let bay = ResourcePool::new(Phase::Bay, capacities.bays, registry.subscribe())?;
        let mechanic =
            ResourcePool::new(Phase::Mechanic, capacities.mechanics, registry.subscribe())?;
        let cleaning =
            ResourcePool::new(Phase::Cleaning, capacities.cleaners, registry.subscribe())?;
        let inspection = ResourcePool::new(
            Phase::Inspection,
            capacities.inspectors,
            registry.subscribe(),
        )?;

        for pool in [&bay, &mechanic, &cleaning, &inspection] {
            registry.register(pool.clone());
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (outstanding, _) = watch::channel(0);

        tracing::info!(
            bays = capacities.bays,
            mechanics = capacities.mechanics,
            cleaners = capacities.cleaners,
            inspectors = capacities.inspectors,
            mode = initial_mode.code(),
            "workshop ready"
        );

        Ok(Arc::new(Self {
            registry,
            bay,
            mechanic,
            cleaning,
            inspection,
            events,
            outstanding,
            started: Instant::now(),
        }))
    }

    pub fn mode(&self) -> Mode {
        self.registry.get()
    }

    /// Switches the operating mode: gate waiters re-check first, then every queue is reordered.
    pub fn set_mode(&self, mode: Mode) {
        self.registry.set(mode);
    }

    pub fn apply_mode(&self, change: ModeChange) -> Mode {
        self.registry.apply(change)
    }

    pub fn registry(&self) -> &Arc<ModeRegistry> {
        &self.registry
    }

    pub fn pool(&self, phase: Phase) -> Option<&Arc<ResourcePool>> {
        match phase {
            Phase::Bay => Some(&self.bay),
            Phase::Mechanic => Some(&self.mechanic),
            Phase::Cleaning => Some(&self.cleaning),
            Phase::Inspection => Some(&self.inspection),
            Phase::Exit => None,
        }
    }

    /// Stage events for every vehicle, starting from the moment of subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.events.subscribe()
    }

    /// Time since the controller was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Blocks until the current mode lets `vehicle`'s category in.
    pub async fn wait_for_entry(&self, vehicle: &Vehicle) -> Mode {
        let category = vehicle.category();
        if !self.mode().admits(category) {
            tracing::debug!(vehicle = %vehicle.id(), %category, "waiting at the entry gate");
        }
        self.registry
            .wait_until(|mode| mode.admits(category))
            .await
    }

    /// Runs `vehicle` through the gate and all four stages, in order.
    pub async fn process(&self, vehicle: &Arc<Vehicle>) {
        self.wait_for_entry(vehicle).await;

        for phase in Phase::STAGES {
            let Some(pool) = self.pool(phase) else {
                continue;
            };
            self.emit(vehicle, phase, Transition::Waiting);
            let permit = pool.acquire(vehicle).await;
            self.emit(vehicle, phase, Transition::InService);
            tokio::time::sleep(vehicle.service_time()).await;
            permit.release();
        }

        self.emit(vehicle, Phase::Exit, Transition::Finished);
    }

    fn emit(&self, vehicle: &Vehicle, phase: Phase, transition: Transition) {
        let event = StageEvent {
            vehicle_id: vehicle.id().0,
            category: vehicle.category(),
            phase,
            transition,
            elapsed: self.elapsed(),
        };
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Counts a vehicle as outstanding until [`Self::complete_vehicle`] is called for it.
    pub fn register_vehicle(&self) {
        self.outstanding.send_modify(|n| *n += 1);
    }

    pub fn complete_vehicle(&self) {
        self.outstanding.send_modify(|n| {
            assert!(*n > 0, "vehicle completed more often than registered");
            *n -= 1;
        });
    }

    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Waits until every registered vehicle has completed.
    pub async fn wait_until_complete(&self) {
        let mut receiver = self.outstanding.subscribe();
        // the sender lives in `self`, so this only returns once the count is zero
        let _ = receiver.wait_for(|n| *n == 0).await;
    }
}
