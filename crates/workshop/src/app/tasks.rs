use std::sync::Arc;
use std::time::Duration;

use api_types::StageEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::ModeRegistry;
use crate::infrastructure::{EventFormat, EventLog, ModeListener, ModeSource};

/// How long shutdown waits for background tasks before giving up on them.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Background tasks that live for one simulation run
pub struct Tasks {
    pub tasks: Vec<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn spawn_event_log(
        &mut self,
        receiver: broadcast::Receiver<StageEvent>,
        format: EventFormat,
    ) {
        let token = self.cancellation_token.clone();
        let task = tokio::spawn(async move {
            tracing::debug!("Starting event log task");
            let written = EventLog::new(format).run(receiver, token).await;
            tracing::debug!(written, "Event log task completed");
        });
        self.tasks.push(task);
    }

    pub fn spawn_mode_listener(&mut self, source: ModeSource, registry: Arc<ModeRegistry>) {
        let token = self.cancellation_token.clone();
        let task = tokio::spawn(async move {
            tracing::debug!("Starting mode listener task");
            ModeListener::new(source, registry).run(token).await;
            tracing::debug!("Mode listener task completed");
        });
        self.tasks.push(task);
    }

    /// Cancels every task and waits for them to wind down.
    pub async fn shutdown(mut self) {
        self.cancellation_token.cancel();
        self.wait_for_tasks_with_timeout(SHUTDOWN_TIMEOUT).await;
    }

    async fn wait_for_tasks_with_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            for task in &mut self.tasks {
                if let Err(e) = task.await {
                    tracing::error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        });
    }
}
