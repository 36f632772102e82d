pub mod controller;
pub mod mode;
pub mod pool;
pub mod queue;
pub mod vehicle;
pub mod worker;

pub use controller::{StageCapacities, WorkshopController};
pub use mode::{Mode, ModeChange, ModeObserver, ModeRegistry, BOOSTED_PRIORITY};
pub use pool::{PoolPermit, PoolSnapshot, ResourcePool};
pub use queue::{PriorityWaitQueue, Ticket, TicketId, WaitingEntry};
pub use vehicle::{FleetSize, Vehicle, VehicleFactory, VehicleId};
pub use worker::VehicleWorker;
