//! Operating modes and the process-wide mode registry
//!
//! ```plaintext
//! code  admission          boost
//!  0    nobody             -
//!  1    mechanical only    -
//!  2    electrical only    -
//!  3    bodywork only      -
//!  4    everyone           mechanical
//!  5    everyone           electrical
//!  6    everyone           bodywork
//!  7,8  reserved, the current mode is kept
//!  9    nobody (closed)    -
//! ```

use std::str::FromStr;
use std::sync::Arc;

use api_types::Category;
use parking_lot::RwLock;
use tokio::sync::watch;

use super::vehicle::Vehicle;
use crate::error::WorkshopError;

/// Priority given to vehicles of the boosted category; below every base priority.
pub const BOOSTED_PRIORITY: i8 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, derive_more::Display)]
pub enum Mode {
    #[default]
    #[display("workshop inactive")]
    Inactive,
    #[display("mechanical only")]
    OnlyMechanical,
    #[display("electrical only")]
    OnlyElectrical,
    #[display("bodywork only")]
    OnlyBodywork,
    #[display("mechanical priority")]
    BoostMechanical,
    #[display("electrical priority")]
    BoostElectrical,
    #[display("bodywork priority")]
    BoostBodywork,
    #[display("workshop closed")]
    Closed,
}

/// Outcome of decoding a mode code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Apply(Mode),
    /// Reserved codes leave the current mode in place.
    Keep,
}

impl Mode {
    pub fn code(self) -> u8 {
        match self {
            Mode::Inactive => 0,
            Mode::OnlyMechanical => 1,
            Mode::OnlyElectrical => 2,
            Mode::OnlyBodywork => 3,
            Mode::BoostMechanical => 4,
            Mode::BoostElectrical => 5,
            Mode::BoostBodywork => 6,
            Mode::Closed => 9,
        }
    }

    pub fn from_code(code: i64) -> Result<ModeChange, WorkshopError> {
        let mode = match code {
            0 => Mode::Inactive,
            1 => Mode::OnlyMechanical,
            2 => Mode::OnlyElectrical,
            3 => Mode::OnlyBodywork,
            4 => Mode::BoostMechanical,
            5 => Mode::BoostElectrical,
            6 => Mode::BoostBodywork,
            7 | 8 => return Ok(ModeChange::Keep),
            9 => Mode::Closed,
            other => return Err(WorkshopError::InvalidMode(other.to_string())),
        };
        Ok(ModeChange::Apply(mode))
    }

    /// Whether a vehicle of `category` may enter the workshop.
    pub fn admits(self, category: Category) -> bool {
        match self {
            Mode::Inactive | Mode::Closed => false,
            Mode::OnlyMechanical => category == Category::Mechanical,
            Mode::OnlyElectrical => category == Category::Electrical,
            Mode::OnlyBodywork => category == Category::Bodywork,
            Mode::BoostMechanical | Mode::BoostElectrical | Mode::BoostBodywork => true,
        }
    }

    pub fn boosted(self) -> Option<Category> {
        match self {
            Mode::BoostMechanical => Some(Category::Mechanical),
            Mode::BoostElectrical => Some(Category::Electrical),
            Mode::BoostBodywork => Some(Category::Bodywork),
            _ => None,
        }
    }

    /// Effective queue priority of `vehicle` under this mode.
    pub fn priority_for(self, vehicle: &Vehicle) -> i8 {
        if self.boosted() == Some(vehicle.category()) {
            BOOSTED_PRIORITY
        } else {
            vehicle.base_priority()
        }
    }
}

impl FromStr for ModeChange {
    type Err = WorkshopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code: i64 = trimmed
            .parse()
            .map_err(|_| WorkshopError::InvalidMode(trimmed.to_string()))?;
        Mode::from_code(code)
    }
}

/// Reacts to a new operating mode. Resource pools reorder their queues through this.
pub trait ModeObserver: Send + Sync {
    fn on_mode_change(&self, mode: Mode);
}

/// Single source of truth for the current mode.
///
/// The value lives in a watch channel: storing it is the broadcast that releases vehicles
/// blocked at the entry gate. Registered observers are told afterwards.
pub struct ModeRegistry {
    sender: watch::Sender<Mode>,
    observers: RwLock<Vec<Arc<dyn ModeObserver>>>,
}

impl ModeRegistry {
    pub fn new(initial: Mode) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn get(&self) -> Mode {
        *self.sender.borrow()
    }

    /// A receiver that always sees the latest mode.
    pub fn subscribe(&self) -> watch::Receiver<Mode> {
        self.sender.subscribe()
    }

    pub fn register(&self, observer: Arc<dyn ModeObserver>) {
        self.observers.write().push(observer);
    }

    /// Stores `mode`, wakes gate waiters, then notifies every observer in registration order.
    pub fn set(&self, mode: Mode) {
        let previous = self.sender.send_replace(mode);
        let observers = self.observers.read().clone();
        for observer in &observers {
            observer.on_mode_change(mode);
        }
        tracing::info!(
            from = previous.code(),
            to = mode.code(),
            "mode changed to {} [{}], queues reordered",
            mode.code(),
            mode
        );
    }

    /// Applies a decoded change; returns the mode now in force.
    pub fn apply(&self, change: ModeChange) -> Mode {
        match change {
            ModeChange::Apply(mode) => {
                self.set(mode);
                mode
            }
            ModeChange::Keep => {
                let current = self.get();
                tracing::info!("reserved mode code received, keeping {}", current);
                current
            }
        }
    }

    /// Waits until the current mode satisfies `predicate`, re-checking after every change.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Mode
    where
        F: FnMut(Mode) -> bool,
    {
        let mut receiver = self.sender.subscribe();
        let mode = match receiver.wait_for(|mode| predicate(*mode)).await {
            Ok(mode) => *mode,
            // unreachable while `self` holds the sender
            Err(_) => self.get(),
        };
        mode
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}
