//! Stage-event log
//!
//! Subscribes to the controller's [`StageEvent`] stream and writes one line per transition on
//! the [`EVENTS_TARGET`] tracing target, which the logging setup routes to stdout.

use std::time::Duration;

use api_types::StageEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;

/// Tracing target of rendered stage events.
pub const EVENTS_TARGET: &str = "workshop::events";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum EventFormat {
    /// `Time .. Vehicle .. Incident .. Phase .. Status ..`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl EventFormat {
    pub fn render(self, event: &StageEvent) -> String {
        match self {
            EventFormat::Text => render_text(event),
            EventFormat::Json => render_json(event),
        }
    }
}

/// Rounds to the nearest millisecond, halves away from zero.
fn round_to_millis(elapsed: Duration) -> Duration {
    let millis = (elapsed.as_nanos() + 500_000) / 1_000_000;
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

pub fn render_text(event: &StageEvent) -> String {
    let elapsed = round_to_millis(event.elapsed);
    format!(
        "Time {:<10} Vehicle {:<4} Incident {:<10} Phase {:<2} Status {}",
        format!("{elapsed:?}"),
        event.vehicle_id,
        event.category,
        event.phase.index(),
        event.status()
    )
}

fn render_json(event: &StageEvent) -> String {
    match serde_json::to_string(event) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!("failed to serialize stage event: {}", e);
            render_text(event)
        }
    }
}

pub struct EventLog {
    format: EventFormat,
}

impl EventLog {
    pub fn new(format: EventFormat) -> Self {
        Self { format }
    }

    /// Logs events until the channel closes or the token is cancelled.
    ///
    /// On cancellation the events already buffered are still written. Returns the number of
    /// lines written.
    pub async fn run(
        &self,
        mut receiver: broadcast::Receiver<StageEvent>,
        cancellation_token: CancellationToken,
    ) -> usize {
        let mut written = 0;
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                received = receiver.recv() => match received {
                    Ok(event) => {
                        self.write(&event);
                        written += 1;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event log fell behind, events dropped");
                    }
                    Err(RecvError::Closed) => return written,
                },
            }
        }

        loop {
            match receiver.try_recv() {
                Ok(event) => {
                    self.write(&event);
                    written += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event log fell behind, events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        written
    }

    fn write(&self, event: &StageEvent) {
        tracing::info!(target: EVENTS_TARGET, "{}", self.format.render(event));
    }
}
