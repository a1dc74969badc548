use std::env;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::{MakeWriter, fmt};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat};

fn get_rust_log(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::OFF => "",
        LevelFilter::ERROR => "ERROR",
        LevelFilter::WARN => "WARN",
        LevelFilter::INFO => "INFO",
        LevelFilter::DEBUG => "INFO,actioncache=DEBUG",
        LevelFilter::TRACE => "INFO,actioncache=TRACE",
    }
}

/// Initializes logging for the host application.
///
/// This considers the `RUST_LOG` environment variable and defaults it to the level specified in the
/// configuration. Additionally, this toggles `RUST_BACKTRACE` based on the
/// [`enable_backtraces`](crate::config::Logging::enable_backtraces)
/// config value.
///
/// # Safety
/// This function uses [`std::env::set_var`] to modify the environment. That function is only safe
/// to call in single-threaded contexts to prevent unsynchronized concurrent access to the environment.
pub unsafe fn init_logging(config: &Config) {
    if config.logging.enable_backtraces {
        // SAFETY: As documented, this function may only be called in a single-threaded context.
        unsafe { env::set_var("RUST_BACKTRACE", "1") };
    }

    let rust_log =
        env::var("RUST_LOG").unwrap_or_else(|_| get_rust_log(config.logging.level).to_string());

    let fmt_layer = {
        let layer = tracing_subscriber::fmt::layer()
            .with_timer(UtcTime::rfc_3339())
            .with_target(true);

        match (config.logging.format, console::user_attended()) {
            (LogFormat::Auto, true) | (LogFormat::Pretty, _) => layer.pretty().boxed(),
            (LogFormat::Auto, false) | (LogFormat::Simplified, _) => {
                layer.compact().with_ansi(false).boxed()
            }
            (LogFormat::Json, _) => {
                init_json_logging(&rust_log, std::io::stdout);
                return;
            }
        }
    }
    .with_filter(EnvFilter::new(&rust_log));

    tracing_subscriber::registry().with(fmt_layer).init();
}

/// Initializes JSON line logging with the given filter directives and writer.
pub fn init_json_logging<W>(env_filter: &str, make_writer: W)
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    fmt()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_env_filter(env_filter)
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(make_writer)
        .finish()
        .init();
}

/// Logs an error to the configured logger or `stderr` if not yet configured.
pub fn ensure_log_error(error: &anyhow::Error) {
    if tracing::Level::ERROR <= tracing::level_filters::STATIC_MAX_LEVEL
        && tracing::Level::ERROR <= LevelFilter::current()
    {
        tracing::error!("{:?}", error);
    } else {
        eprintln!("{error:?}");
    }
}
