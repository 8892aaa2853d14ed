use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};

use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::prelude::*;

use crate::domain::utils::statistics::ANALYTICS_TARGET;
use crate::error::{Error, Result};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "system.log";
const TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Sets up the `log` facade: colored lines on stderr plus a plain copy in `logs/system.log`.
///
/// Call it once, first thing in `main`. The level comes from `RUST_LOG` (`info` when unset or
/// unparsable), e.g. `RUST_LOG=debug fleet-scheduler --world world.json`.
pub fn init() {
    let level = level_from_env();
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::BrightBlack);

    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!("[{} {} {}] {}", Local::now().format(TIMESTAMP), colors.color(record.level()), record.target(), message))
        })
        .chain(std::io::stderr());

    let mut dispatch = fern::Dispatch::new().level(level).level_for("serde", LevelFilter::Warn).chain(console);

    let file_path = log_file_path();
    match fern::log_file(&file_path) {
        Ok(file) => {
            let plain = fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("[{} {} {}] {}", Local::now().format(TIMESTAMP), record.level(), record.target(), message))
                })
                .chain(file);
            dispatch = dispatch.chain(plain);
        }
        Err(e) => eprintln!("Cannot write '{}' ({}), logging to stderr only", file_path.display(), e),
    }

    if let Err(e) = dispatch.apply() {
        eprintln!("Logger already installed: {}", e);
        return;
    }

    log::info!("Logging at {} to stderr and '{}'", level, file_path.display());
}

fn level_from_env() -> LevelFilter {
    std::env::var("RUST_LOG").ok().and_then(|level| level.parse().ok()).unwrap_or(LevelFilter::Info)
}

fn log_file_path() -> PathBuf {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("Cannot create log directory '{}': {}", LOG_DIR, e);
    }
    Path::new(LOG_DIR).join(LOG_FILE)
}

/// Installs the tracing subscriber that writes `analytics` events to `path`.
///
/// Other tracing events go to stderr. Keep the returned guard alive until shutdown, dropping it
/// flushes the file.
pub fn init_analytics(path: impl AsRef<Path>) -> Result<WorkerGuard> {
    let path = path.as_ref();
    let directory = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidConfiguration(format!("Analytics path '{}' does not name a file", path.display())))?;

    fs::create_dir_all(directory)?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
    let timer = LocalTime::new(format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"));

    let analytics_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(timer)
        .with_filter(Targets::new().with_target(ANALYTICS_TARGET, tracing::Level::INFO));

    let diagnostics = Targets::new().with_target(ANALYTICS_TARGET, tracing::level_filters::LevelFilter::OFF).with_default(tracing::Level::INFO);
    let diagnostics_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_filter(diagnostics);

    let subscriber = tracing_subscriber::registry().with(analytics_layer).with(diagnostics_layer);

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        log::warn!("Analytics subscriber not installed: {}", e);
    } else {
        log::info!("Analytics events are written to '{}'.", path.display());
    }

    Ok(guard)
}
