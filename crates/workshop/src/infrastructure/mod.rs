pub mod event_log;
pub mod logging;
pub mod mode_listener;

pub use event_log::{EventFormat, EventLog, EVENTS_TARGET};
pub use mode_listener::{apply_mode_lines, ModeListener, ModeSource};
