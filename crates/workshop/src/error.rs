use api_types::Phase;
use thiserror::Error;

/// Errors surfaced while setting up or feeding the workshop.
///
/// Once a run has started no business error exists: acquisitions block instead of failing, and
/// broken invariants abort through assertions.
#[derive(Error, Debug)]
pub enum WorkshopError {
    #[error("capacity of the {stage} stage must be positive, got {capacity}")]
    InvalidCapacity { stage: Phase, capacity: usize },

    #[error("the fleet must contain at least one vehicle")]
    InvalidFleet,

    #[error("time scale must be a positive finite number, got {0}")]
    InvalidTimeScale(f64),

    #[error("invalid mode code `{0}`")]
    InvalidMode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WorkshopError>;
