use std::sync::Arc;

use tokio::task::JoinHandle;

use super::controller::WorkshopController;
use super::vehicle::Vehicle;

/// Drives one vehicle from arrival to exit.
pub struct VehicleWorker {
    controller: Arc<WorkshopController>,
    vehicle: Arc<Vehicle>,
}

impl VehicleWorker {
    pub fn new(controller: Arc<WorkshopController>, vehicle: Arc<Vehicle>) -> Self {
        Self {
            controller,
            vehicle,
        }
    }

    /// Counts the vehicle as outstanding and starts its task.
    pub fn spawn(self) -> JoinHandle<()> {
        self.controller.register_vehicle();
        tokio::spawn(self.run())
    }

    async fn run(self) {
        self.vehicle.mark_arrived();
        tracing::debug!(
            vehicle = %self.vehicle.id(),
            category = %self.vehicle.category(),
            service_time = ?self.vehicle.service_time(),
            "vehicle arrived"
        );

        self.controller.process(&self.vehicle).await;

        self.controller.complete_vehicle();
    }
}
