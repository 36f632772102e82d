//! Shared API type definitions
//!
//! This crate contains the records the workshop core hands to external collaborators:
//! incident categories, pipeline phases and the per-transition [`StageEvent`] consumed by
//! loggers and other observers.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Incident category of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Mechanical,
    Electrical,
    Bodywork,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Mechanical,
        Category::Electrical,
        Category::Bodywork,
    ];

    /// Fixed priority of the category. Lower value = more urgent.
    pub fn base_priority(self) -> i8 {
        match self {
            Category::Mechanical => 0,
            Category::Electrical => 1,
            Category::Bodywork => 2,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Mechanical => f.pad("mechanical"),
            Category::Electrical => f.pad("electrical"),
            Category::Bodywork => f.pad("bodywork"),
        }
    }
}

/// Position of a vehicle in the service pipeline.
///
/// The four service stages are numbered 1 to 4 in the order a vehicle visits them,
/// `Exit` (5) marks a vehicle that has left the workshop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Bay,
    Mechanic,
    Cleaning,
    Inspection,
    Exit,
}

impl Phase {
    /// The service stages, in pipeline order.
    pub const STAGES: [Phase; 4] = [
        Phase::Bay,
        Phase::Mechanic,
        Phase::Cleaning,
        Phase::Inspection,
    ];

    pub fn index(self) -> u8 {
        match self {
            Phase::Bay => 1,
            Phase::Mechanic => 2,
            Phase::Cleaning => 3,
            Phase::Inspection => 4,
            Phase::Exit => 5,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Bay => f.pad("bay"),
            Phase::Mechanic => f.pad("mechanic"),
            Phase::Cleaning => f.pad("cleaning"),
            Phase::Inspection => f.pad("inspection"),
            Phase::Exit => f.pad("exit"),
        }
    }
}

/// What happened to the vehicle at its current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Queued for the stage resource
    Waiting,
    /// Holding the stage resource
    InService,
    /// Left the workshop
    Finished,
}

/// One stage transition of one vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    pub vehicle_id: u32,
    pub category: Category,
    pub phase: Phase,
    pub transition: Transition,
    /// Time since the simulation run started
    pub elapsed: Duration,
}

impl StageEvent {
    /// Human readable status of the transition, e.g. `"waiting for mechanic"`.
    pub fn status(&self) -> &'static str {
        match (self.phase, self.transition) {
            (Phase::Bay, Transition::Waiting) => "waiting for bay",
            (Phase::Bay, _) => "occupying bay",
            (Phase::Mechanic, Transition::Waiting) => "waiting for mechanic",
            (Phase::Mechanic, _) => "being repaired",
            (Phase::Cleaning, Transition::Waiting) => "waiting for cleaning",
            (Phase::Cleaning, _) => "being cleaned",
            (Phase::Inspection, Transition::Waiting) => "waiting for inspection",
            (Phase::Inspection, _) => "being inspected",
            (Phase::Exit, _) => "finished",
        }
    }
}
