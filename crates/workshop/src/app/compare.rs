//! Preset scenarios for comparing fleet mixes and staffing

use crate::app::simulation::{Simulation, SimulationReport};
use crate::config::{CommonArgs, SimulationConfig};
use crate::domain::{FleetSize, StageCapacities};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub name: &'static str,
    pub fleet: FleetSize,
    pub bays: usize,
    pub mechanics: usize,
}

impl Scenario {
    const fn new(
        name: &'static str,
        (mechanical, electrical, bodywork): (usize, usize, usize),
        bays: usize,
        mechanics: usize,
    ) -> Self {
        Self {
            name,
            fleet: FleetSize {
                mechanical,
                electrical,
                bodywork,
            },
            bays,
            mechanics,
        }
    }

    /// Cleaning and inspection keep their default capacity in every scenario.
    pub fn capacities(&self) -> StageCapacities {
        StageCapacities {
            bays: self.bays,
            mechanics: self.mechanics,
            ..StageCapacities::default()
        }
    }
}

pub const SCENARIOS: [Scenario; 6] = [
    Scenario::new("balanced", (10, 10, 10), 6, 3),
    Scenario::new("mechanical-heavy", (20, 5, 5), 6, 3),
    Scenario::new("bodywork-heavy", (5, 5, 20), 6, 3),
    Scenario::new("balanced", (10, 10, 10), 4, 4),
    Scenario::new("mechanical-heavy", (20, 5, 5), 4, 4),
    Scenario::new("bodywork-heavy", (5, 5, 20), 4, 4),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub report: SimulationReport,
}

/// Runs `scenarios` one after another, each on a fresh workshop.
pub async fn run_comparison(
    scenarios: &[Scenario],
    common: &CommonArgs,
) -> Result<Vec<ScenarioOutcome>> {
    let mut outcomes = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        tracing::info!(
            scenario = scenario.name,
            bays = scenario.bays,
            mechanics = scenario.mechanics,
            "starting scenario"
        );
        let config = SimulationConfig::from_common(scenario.capacities(), scenario.fleet, common)?;
        let report = Simulation::new(config)?.run().await?;
        tracing::info!(
            scenario = scenario.name,
            bays = scenario.bays,
            mechanics = scenario.mechanics,
            elapsed = ?report.elapsed,
            "scenario finished"
        );
        outcomes.push(ScenarioOutcome {
            scenario: *scenario,
            report,
        });
    }
    Ok(outcomes)
}
