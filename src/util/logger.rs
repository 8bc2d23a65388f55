//! Minimal `log` backend printing to stderr.

use log::{LevelFilter, Log, Metadata, Record};
use std::io::Write;
use std::time::Instant;
use std::sync::OnceLock;

/// Environment variable holding the level filter, e.g. `GRIPWAND_LOG=debug`.
pub const LEVEL_VAR: &str = "GRIPWAND_LOG";

struct Logger {
    started: Instant,
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool { metadata.level() <= log::max_level() }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f32();
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "[{elapsed:>9.3} {:<5} {}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) { let _ = std::io::stderr().flush(); }
}

/// Parses a level name, falling back to `Info` for anything unrecognised.
pub fn parse_level(raw: Option<&str>) -> LevelFilter {
    raw.and_then(|raw| raw.trim().parse().ok()).unwrap_or(LevelFilter::Info)
}

/// Installs the logger. Calling this more than once is harmless.
pub fn init() {
    let level = parse_level(std::env::var(LEVEL_VAR).ok().as_deref());
    let logger = LOGGER.get_or_init(|| Logger { started: Instant::now() });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}
