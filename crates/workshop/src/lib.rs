pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::controller;
pub use domain::mode;
pub use domain::pool;
pub use domain::queue;
pub use infrastructure::logging;
