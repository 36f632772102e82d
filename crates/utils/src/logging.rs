//! provides logging helpers

use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// When set, diagnostics are written to a daily-rolling file at this path instead of stderr.
pub const LOG_PATH_ENV_VAR: &str = "WORKSHOP_LOG_PATH";

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// `INFO` unless `RUST_LOG` says otherwise.
pub fn env_filter() -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy()
}

/// Builds the diagnostic fmt layer.
///
/// With `log_path` the layer writes through a non-blocking rolling appender and the returned
/// guard must be kept alive for as long as logs should be flushed. Falls back to stderr when the
/// appender cannot be created.
pub fn get_fmt_layer<S>(log_path: Option<String>) -> (BoxedLayer<S>, Option<WorkerGuard>)
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let Some(log_path) = log_path else {
        return (stderr_layer(), None);
    };

    let log_path = Path::new(&log_path);
    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = log_path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("workshop.log");

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(3)
        .build(dir);

    match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (layer, Some(guard))
        }
        Err(e) => {
            eprintln!("failed to create log file in {}: {e}", dir.display());
            (stderr_layer(), None)
        }
    }
}

fn stderr_layer<S>() -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    layer().with_writer(std::io::stderr).with_target(true).boxed()
}

/// initiate the global tracing subscriber
pub fn init() -> Option<WorkerGuard> {
    let (fmt_layer, guard) = get_fmt_layer(std::env::var(LOG_PATH_ENV_VAR).ok());
    registry().with(fmt_layer.with_filter(env_filter())).init();
    guard
}
