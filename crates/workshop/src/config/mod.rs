pub mod cli;
pub mod simulation;

pub use cli::*;
pub use simulation::*;
