use std::collections::BTreeMap;
use std::collections::HashMap;

use api_types::{Phase, StageEvent, Transition};
use similar_asserts::assert_eq;
use test_log::test;
use workshop::app::Simulation;
use workshop::config::SimulationConfig;
use workshop::domain::{FleetSize, Mode, StageCapacities};
use workshop::infrastructure::{EventFormat, ModeSource};

fn config(fleet: FleetSize, capacities: StageCapacities, initial_mode: Mode) -> SimulationConfig {
    SimulationConfig {
        capacities,
        fleet,
        initial_mode,
        mode_source: ModeSource::Disabled,
        time_scale: 0.01,
        seed: Some(2024),
        event_format: EventFormat::Text,
    }
}

fn group_by_vehicle(events: Vec<StageEvent>) -> BTreeMap<u32, Vec<(Phase, Transition)>> {
    let mut by_vehicle: BTreeMap<u32, Vec<(Phase, Transition)>> = BTreeMap::new();
    for event in events {
        by_vehicle
            .entry(event.vehicle_id)
            .or_default()
            .push((event.phase, event.transition));
    }
    by_vehicle
}

#[test(tokio::test(start_paused = true))]
async fn every_vehicle_visits_each_stage_once_in_order() {
    let simulation = Simulation::new(config(
        FleetSize::new(10, 10, 10),
        StageCapacities {
            bays: 4,
            mechanics: 4,
            ..StageCapacities::default()
        },
        Mode::BoostMechanical,
    ))
    .expect("valid config");
    let controller = simulation.controller().clone();
    let mut receiver = controller.subscribe();

    let report = simulation.run().await.expect("run completes");
    assert_eq!(report.vehicles, 30);

    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    let by_vehicle = group_by_vehicle(events);
    assert_eq!(by_vehicle.len(), 30);
    assert_eq!(by_vehicle.keys().copied().collect::<Vec<_>>(), (1..=30).collect::<Vec<_>>());

    let mut expected = Vec::new();
    for phase in Phase::STAGES {
        expected.push((phase, Transition::Waiting));
        expected.push((phase, Transition::InService));
    }
    expected.push((Phase::Exit, Transition::Finished));
    for (id, transitions) in &by_vehicle {
        assert_eq!(transitions, &expected, "vehicle {id}");
    }
}

#[test(tokio::test(start_paused = true))]
async fn stage_occupancy_stays_within_capacity() {
    let capacities = StageCapacities {
        bays: 2,
        mechanics: 1,
        cleaners: 1,
        inspectors: 1,
    };
    let simulation = Simulation::new(config(
        FleetSize::new(5, 5, 5),
        capacities,
        Mode::BoostBodywork,
    ))
    .expect("valid config");
    let mut receiver = simulation.controller().subscribe();

    simulation.run().await.expect("run completes");

    let mut in_service: HashMap<Phase, usize> = HashMap::new();
    let mut peak: HashMap<Phase, usize> = HashMap::new();
    while let Ok(event) = receiver.try_recv() {
        match event.transition {
            Transition::InService => {
                let current = in_service.entry(event.phase).or_default();
                *current += 1;
                let top = peak.entry(event.phase).or_default();
                *top = (*top).max(*current);
            }
            // the next stage's waiting event follows the release of the previous stage
            Transition::Waiting | Transition::Finished => {
                if let Some(previous) = previous_stage(event.phase) {
                    if let Some(current) = in_service.get_mut(&previous) {
                        *current -= 1;
                    }
                }
            }
        }
    }

    assert_eq!(peak.get(&Phase::Bay).copied(), Some(2));
    assert_eq!(peak.get(&Phase::Mechanic).copied(), Some(1));
    assert_eq!(peak.get(&Phase::Cleaning).copied(), Some(1));
    assert_eq!(peak.get(&Phase::Inspection).copied(), Some(1));
}

fn previous_stage(phase: Phase) -> Option<Phase> {
    match phase {
        Phase::Bay => None,
        Phase::Mechanic => Some(Phase::Bay),
        Phase::Cleaning => Some(Phase::Mechanic),
        Phase::Inspection => Some(Phase::Cleaning),
        Phase::Exit => Some(Phase::Inspection),
    }
}
