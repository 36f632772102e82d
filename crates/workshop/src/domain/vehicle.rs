//! Vehicles and fleet generation

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use api_types::Category;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use tokio::time::Instant;

/// Upper bound of the random gap between two consecutive arrivals, before time scaling.
const MAX_ARRIVAL_GAP: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub struct VehicleId(pub u32);

/// A vehicle brought in for service.
///
/// Everything but the arrival timestamp is fixed at creation; the arrival timestamp is set once,
/// when the vehicle is handed to its worker.
#[derive(Debug)]
pub struct Vehicle {
    id: VehicleId,
    category: Category,
    service_time: Duration,
    arrived_at: OnceLock<Instant>,
}

impl Vehicle {
    pub fn new(id: u32, category: Category, service_time: Duration) -> Self {
        Self {
            id: VehicleId(id),
            category,
            service_time,
            arrived_at: OnceLock::new(),
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn base_priority(&self) -> i8 {
        self.category.base_priority()
    }

    /// Time the vehicle holds each stage resource.
    pub fn service_time(&self) -> Duration {
        self.service_time
    }

    /// Records the arrival; later calls keep the first timestamp.
    pub fn mark_arrived(&self) -> Instant {
        *self.arrived_at.get_or_init(Instant::now)
    }

    pub fn arrived_at(&self) -> Option<Instant> {
        self.arrived_at.get().copied()
    }
}

/// Number of vehicles per incident category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FleetSize {
    pub mechanical: usize,
    pub electrical: usize,
    pub bodywork: usize,
}

impl FleetSize {
    pub fn new(mechanical: usize, electrical: usize, bodywork: usize) -> Self {
        Self {
            mechanical,
            electrical,
            bodywork,
        }
    }

    pub fn total(&self) -> usize {
        self.mechanical + self.electrical + self.bodywork
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Mechanical => self.mechanical,
            Category::Electrical => self.electrical,
            Category::Bodywork => self.bodywork,
        }
    }
}

/// Generates randomized fleets and arrival gaps.
pub struct VehicleFactory {
    rng: StdRng,
    time_scale: f64,
}

impl VehicleFactory {
    /// `time_scale` multiplies every generated duration; it must be positive.
    pub fn new(seed: Option<u64>, time_scale: f64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng, time_scale }
    }

    /// Per-phase service time of a category before randomization.
    pub fn base_service_time(category: Category) -> Duration {
        match category {
            Category::Mechanical => Duration::from_secs(5),
            Category::Electrical => Duration::from_secs(3),
            Category::Bodywork => Duration::from_secs(1),
        }
    }

    /// Creates the fleet in shuffled arrival order.
    ///
    /// Ids run from 1 in category order (mechanical, electrical, bodywork) before shuffling.
    /// Each service time is the category base scaled by a uniform factor in `[0.5, 1.5)`.
    pub fn build_fleet(&mut self, size: &FleetSize) -> Vec<Arc<Vehicle>> {
        let mut fleet = Vec::with_capacity(size.total());
        let mut next_id = 1;
        for category in Category::ALL {
            for _ in 0..size.count(category) {
                let factor: f64 = self.rng.random_range(0.5..1.5);
                let service_time = self.scale(Self::base_service_time(category), factor);
                fleet.push(Arc::new(Vehicle::new(next_id, category, service_time)));
                next_id += 1;
            }
        }
        fleet.shuffle(&mut self.rng);
        fleet
    }

    /// Random pause before the next arrival, in `[0, 200ms)` scaled.
    pub fn arrival_gap(&mut self) -> Duration {
        let factor: f64 = self.rng.random_range(0.0..1.0);
        self.scale(MAX_ARRIVAL_GAP, factor)
    }

    fn scale(&self, base: Duration, factor: f64) -> Duration {
        let millis = (base.as_millis() as f64 * factor * self.time_scale).round() as u64;
        Duration::from_millis(millis)
    }
}
