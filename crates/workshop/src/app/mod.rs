pub mod compare;
pub mod simulation;
pub mod tasks;

pub use compare::{run_comparison, Scenario, ScenarioOutcome, SCENARIOS};
pub use simulation::{Simulation, SimulationReport};
pub use tasks::Tasks;
