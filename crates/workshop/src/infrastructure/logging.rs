//! Process-wide tracing subscriber
//!
//! Diagnostics go through the `utils::logging` fmt layer. Stage events are split off into a
//! second layer that prints the bare rendered line on stdout.

use std::env;
use std::fmt::{self};

use tracing::field::Field;
use tracing::field::Visit;
use tracing::Event;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::FilterExt;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::format;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::FormatEvent;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use utils::logging::LOG_PATH_ENV_VAR;

use super::event_log::EVENTS_TARGET;

struct EventLineFormatter;

#[derive(Default)]
struct MessageVisitor {
    msg: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.msg.push_str(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.msg.push_str(&format!("{value:?}"));
        }
    }
}

impl<S, N> FormatEvent<S, N> for EventLineFormatter
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        writeln!(writer, "{}", visitor.msg)
    }
}

fn is_event_line(metadata: &tracing::Metadata<'_>) -> bool {
    metadata.target() == EVENTS_TARGET
}

/// initiate the global tracing subscriber
///
/// The returned guard flushes the diagnostic log file, when one is configured, on drop.
pub fn init() -> Option<WorkerGuard> {
    let (fmt_layer, guard) = utils::logging::get_fmt_layer(env::var(LOG_PATH_ENV_VAR).ok());
    let fmt_layer = fmt_layer.with_filter(
        utils::logging::env_filter().and(filter::filter_fn(|metadata| !is_event_line(metadata))),
    );

    let events_layer = layer()
        .event_format(EventLineFormatter)
        .fmt_fields(format::DefaultFields::new())
        .with_writer(std::io::stdout)
        .with_ansi(false)
        .with_filter(filter::filter_fn(is_event_line));

    registry().with(fmt_layer).with(events_layer).init();
    guard
}
