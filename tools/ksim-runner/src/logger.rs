//! Colored stderr logger

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use owo_colors::OwoColorize;

struct ColoredLogger;

impl Log for ColoredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // stdout carries process output only
        match record.level() {
            Level::Error => eprintln!("[{}] {}", "ERROR".red(), record.args()),
            Level::Warn => eprintln!("[{}] {}", "WARN".yellow(), record.args()),
            Level::Info => eprintln!("[{}] {}", "INFO".cyan(), record.args()),
            Level::Debug => eprintln!("[{}] {}", "DEBUG".blue(), record.args()),
            Level::Trace => eprintln!("[{}] {}", "TRACE".bright_black(), record.args()),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ColoredLogger = ColoredLogger;

/// Install the logger at `level`.
///
/// Fails if a logger is already installed; the level is left untouched then.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        assert!(init(LevelFilter::Debug).is_ok());
        assert_eq!(log::max_level(), LevelFilter::Debug);
        assert!(LOGGER.enabled(&Metadata::builder().level(Level::Debug).build()));

        assert!(init(LevelFilter::Error).is_err());
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }
}
