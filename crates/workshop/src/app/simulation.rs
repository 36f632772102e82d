//! One simulation run: build the workshop, feed it a fleet, wait for every vehicle to leave

use std::sync::Arc;
use std::time::Duration;

use api_types::Category;
use tokio::time::Instant;

use crate::app::tasks::Tasks;
use crate::config::SimulationConfig;
use crate::domain::{VehicleFactory, VehicleWorker, WorkshopController};
use crate::error::Result;
use crate::infrastructure::ModeSource;

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SimulationReport {
    pub vehicles: usize,
    /// From the first arrival until the last vehicle left
    pub elapsed: Duration,
}

pub struct Simulation {
    config: SimulationConfig,
    controller: Arc<WorkshopController>,
}

impl Simulation {
    /// Validates `config` and builds the workshop. Nothing runs yet.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let controller = WorkshopController::new(config.capacities, config.initial_mode)?;
        Ok(Self { config, controller })
    }

    pub fn controller(&self) -> &Arc<WorkshopController> {
        &self.controller
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub async fn run(self) -> Result<SimulationReport> {
        let mut tasks = Tasks::new();
        tasks.spawn_event_log(self.controller.subscribe(), self.config.event_format);
        tasks.spawn_mode_listener(
            self.config.mode_source.clone(),
            self.controller.registry().clone(),
        );

        let mut factory = VehicleFactory::new(self.config.seed, self.config.time_scale);
        let fleet = factory.build_fleet(&self.config.fleet);
        let vehicles = fleet.len();
        tracing::info!(
            vehicles,
            mechanical = self.config.fleet.mechanical,
            electrical = self.config.fleet.electrical,
            bodywork = self.config.fleet.bodywork,
            "simulation started"
        );
        let initial_mode = self.controller.mode();
        if self.config.mode_source == ModeSource::Disabled
            && !Category::ALL.iter().any(|c| initial_mode.admits(*c))
        {
            tracing::warn!(
                mode = initial_mode.code(),
                "mode '{}' admits nobody and no mode source is configured",
                initial_mode
            );
        }

        let started = Instant::now();
        let mut workers = Vec::with_capacity(vehicles);
        for (i, vehicle) in fleet.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(factory.arrival_gap()).await;
            }
            workers.push(VehicleWorker::new(self.controller.clone(), vehicle).spawn());
        }

        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
                tracing::error!("vehicle task cancelled: {e}");
            }
        }
        self.controller.wait_until_complete().await;
        let elapsed = started.elapsed();

        tasks.shutdown().await;
        tracing::info!(vehicles, ?elapsed, "all vehicles have left the workshop");

        Ok(SimulationReport { vehicles, elapsed })
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::domain::{FleetSize, Mode, StageCapacities};
    use crate::error::WorkshopError;
    use crate::infrastructure::EventFormat;

    fn config(fleet: FleetSize, initial_mode: Mode) -> SimulationConfig {
        SimulationConfig {
            capacities: StageCapacities::default(),
            fleet,
            initial_mode,
            mode_source: ModeSource::Disabled,
            time_scale: 0.01,
            seed: Some(7),
            event_format: EventFormat::Text,
        }
    }

    #[test]
    fn invalid_config_fails_before_running() {
        let mut config = config(FleetSize::new(1, 1, 1), Mode::Inactive);
        config.time_scale = f64::NAN;
        assert!(matches!(
            Simulation::new(config).err(),
            Some(WorkshopError::InvalidTimeScale(_))
        ));
    }

    #[test(tokio::test(start_paused = true))]
    async fn every_vehicle_leaves() {
        let simulation =
            Simulation::new(config(FleetSize::new(4, 3, 5), Mode::BoostElectrical)).expect("valid");
        let controller = simulation.controller().clone();

        let report = simulation.run().await.expect("run");

        assert_eq!(report.vehicles, 12);
        assert!(report.elapsed > Duration::ZERO);
        assert_eq!(controller.outstanding(), 0);
        for phase in api_types::Phase::STAGES {
            let snapshot = controller.pool(phase).map(|pool| pool.snapshot());
            assert_eq!(snapshot.map(|s| (s.occupied, s.waiting.len())), Some((0, 0)));
        }
    }

    #[test(tokio::test(start_paused = true))]
    async fn gated_categories_wait_for_a_mode_change() {
        let simulation =
            Simulation::new(config(FleetSize::new(2, 0, 2), Mode::OnlyMechanical)).expect("valid");
        let controller = simulation.controller().clone();
        let run = tokio::spawn(simulation.run());

        // mechanical vehicles finish well within a minute of simulated time
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(controller.outstanding(), 2);
        assert!(!run.is_finished());

        controller.set_mode(Mode::BoostBodywork);
        let report = run.await.expect("run task").expect("run");
        assert_eq!(report.vehicles, 4);
    }
}
