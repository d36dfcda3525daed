//! Tracing setup
//!
//! Plugin mode writes every event to stderr in the host's log-line format,
//! `\x01<level>\x02<message>`, leaving level filtering to the host. The
//! standalone CLI uses the regular fmt output filtered by `RUST_LOG`.

use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::EnvFilter;

const PLUGIN_DEFAULT_FILTER: &str = "debug";
const CLI_DEFAULT_FILTER: &str = "info";

/// Level marker the host understands.
fn level_char(level: &Level) -> char {
    match *level {
        Level::TRACE => 't',
        Level::DEBUG => 'd',
        Level::INFO => 'i',
        Level::WARN => 'w',
        Level::ERROR => 'e',
    }
}

/// Event format for the host's stderr log protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostLogFormat;

impl<S, N> FormatEvent<S, N> for HostLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = String::new();
        ctx.field_format()
            .format_fields(Writer::new(&mut fields), event)?;

        // Every output line carries the level marker.
        let marker = level_char(event.metadata().level());
        if fields.is_empty() {
            return writeln!(writer, "\x01{}\x02", marker);
        }
        for line in fields.lines() {
            writeln!(writer, "\x01{}\x02{}", marker, line)?;
        }
        Ok(())
    }
}

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Logging for a run launched by the host.
pub fn init_plugin_logging() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(HostLogFormat)
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(filter(PLUGIN_DEFAULT_FILTER))
        .try_init()
}

/// Logging for standalone CLI use.
pub fn init_cli_logging() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter(CLI_DEFAULT_FILTER))
        .try_init()
}
