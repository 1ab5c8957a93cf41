// src/log.rs
//! Logging setup: `tracing` events go to `<store>/debug.log` (appended), and
//! optionally to stderr. Timestamps are uptime, `HH:MM:SS.mmm`.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::consts::LOG_FILE;
use crate::error::{Error, Result};

static START: OnceLock<Instant> = OnceLock::new();

fn start() -> Instant {
    *START.get_or_init(Instant::now)
}

fn fmt_elapsed(ms: u128) -> String {
    let total_ms = ms as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

struct Uptime;

impl FormatTime for Uptime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "[{}]", fmt_elapsed(start().elapsed().as_millis()))
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter
/// (`study_watch=info`, or `=debug` with `verbose`).
pub fn init(store_dir: &Path, verbose: bool, echo: bool) -> Result<()> {
    start();

    fs::create_dir_all(store_dir).map_err(|e| Error::Log(format!("{}: {e}", store_dir.display())))?;
    let path = store_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| Error::Log(format!("{}: {e}", path.display())))?;

    let default = if verbose { "study_watch=debug" } else { "study_watch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let to_file = fmt::layer()
        .with_timer(Uptime)
        .with_ansi(false)
        .with_writer(Mutex::new(file));
    let to_stderr = echo.then(|| fmt::layer().with_timer(Uptime).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(to_file)
        .with(to_stderr)
        .try_init()
        .map_err(|e| Error::Log(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::fmt_elapsed;

    #[test]
    fn elapsed_format() {
        assert_eq!(fmt_elapsed(0), "00:00:00.000");
        assert_eq!(fmt_elapsed(3_723_004), "01:02:03.004");
    }
}
