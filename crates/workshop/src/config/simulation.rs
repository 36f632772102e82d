use api_types::Phase;

use crate::config::cli::{CommonArgs, RunArgs};
use crate::domain::{FleetSize, Mode, ModeChange, StageCapacities};
use crate::error::{Result, WorkshopError};
use crate::infrastructure::{EventFormat, ModeSource};

/// Everything a single simulation run needs, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub capacities: StageCapacities,
    pub fleet: FleetSize,
    pub initial_mode: Mode,
    pub mode_source: ModeSource,
    /// Multiplier on service times and arrival gaps
    pub time_scale: f64,
    pub seed: Option<u64>,
    pub event_format: EventFormat,
}

impl SimulationConfig {
    /// Combines stage capacities and fleet with the shared run flags.
    pub fn from_common(
        capacities: StageCapacities,
        fleet: FleetSize,
        common: &CommonArgs,
    ) -> Result<Self> {
        // reserved codes leave the default mode in place
        let initial_mode = match Mode::from_code(i64::from(common.initial_mode))? {
            ModeChange::Apply(mode) => mode,
            ModeChange::Keep => Mode::default(),
        };
        let mode_source = if common.no_mode_source {
            ModeSource::Disabled
        } else {
            ModeSource::Tcp(common.mode_server.clone())
        };

        let config = Self {
            capacities,
            fleet,
            initial_mode,
            mode_source,
            time_scale: common.time_scale,
            seed: common.seed,
            event_format: common.event_format,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that could never complete a run.
    pub fn validate(&self) -> Result<()> {
        let StageCapacities {
            bays,
            mechanics,
            cleaners,
            inspectors,
        } = self.capacities;
        for (stage, capacity) in Phase::STAGES
            .into_iter()
            .zip([bays, mechanics, cleaners, inspectors])
        {
            if capacity == 0 {
                return Err(WorkshopError::InvalidCapacity { stage, capacity });
            }
        }
        if self.fleet.total() == 0 {
            return Err(WorkshopError::InvalidFleet);
        }
        if !self.time_scale.is_finite() || self.time_scale <= 0.0 {
            return Err(WorkshopError::InvalidTimeScale(self.time_scale));
        }
        Ok(())
    }
}

impl TryFrom<&RunArgs> for SimulationConfig {
    type Error = WorkshopError;

    fn try_from(args: &RunArgs) -> Result<Self> {
        let capacities = StageCapacities {
            bays: args.bays,
            mechanics: args.mechanics,
            cleaners: args.cleaners,
            inspectors: args.inspectors,
        };
        let fleet = FleetSize::new(args.mechanical, args.electrical, args.bodywork);
        Self::from_common(capacities, fleet, &args.common)
    }
}
