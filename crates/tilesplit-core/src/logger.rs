//! Run logging.
//!
//! A split over many orthomosaics reports progress as log lines rather than a
//! progress bar. [`init_with_level`] installs a stderr logger printing
//! `[elapsed LEVEL] message`; at debug and trace the emitting module is added
//! so per-tile lines can be told apart from per-image ones. Warnings (skipped
//! directories, images and annotation files) are counted so a run can end
//! with a tally, see [`warning_count`].
//!
//! With the `tracing` feature, [`init_tracing`] installs a `tracing-subscriber`
//! instead; `RUST_LOG` overrides the level chosen on the command line.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

static WARNINGS: AtomicUsize = AtomicUsize::new(0);

struct RunLogger {
    level: LevelFilter,
    started: Instant,
}

impl RunLogger {
    fn format(&self, elapsed: f64, record: &Record) -> String {
        if self.level >= LevelFilter::Debug {
            format!(
                "[{:7.3}s {:>5} {}] {}",
                elapsed,
                record.level(),
                record.target(),
                record.args()
            )
        } else {
            format!("[{:7.3}s {:>5}] {}", elapsed, record.level(), record.args())
        }
    }
}

impl Log for RunLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if record.level() == Level::Warn {
            WARNINGS.fetch_add(1, Ordering::Relaxed);
        }
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.format(self.started.elapsed().as_secs_f64(), record);
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<RunLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization. Warnings are counted even when `level` hides them.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| RunLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        // Warn is the floor so the tally sees every warning.
        log::set_max_level(level.max(LevelFilter::Warn));
    }
    Ok(())
}

/// Warnings emitted through the stderr logger since it was installed.
pub fn warning_count() -> usize {
    WARNINGS.load(Ordering::Relaxed)
}

/// Map a `-v` count onto a level filter: warn, info, debug, trace.
pub fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// `EnvFilter` directive for `level`, e.g. `"debug"`.
#[cfg(feature = "tracing")]
fn directive(level: LevelFilter) -> String {
    level.as_str().to_ascii_lowercase()
}

/// Install a `tracing-subscriber` at `level` unless `RUST_LOG` is set.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: LevelFilter, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(level)));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}
