//! Host HAL: stdout console, monotonic clock, OS entropy

use std::io::{self, BufWriter, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use ksim_hal::{HalError, HAL};

/// HAL backed by the host process.
///
/// Console tokens are buffered and written to stdout on `console_flush`.
/// Debug messages go to stderr.
pub struct StdHal {
    console: Mutex<BufWriter<Stdout>>,
    /// Set when a console write fails; reported by the next flush
    write_failed: AtomicBool,
    boot: Instant,
}

impl StdHal {
    pub fn new() -> Self {
        Self {
            console: Mutex::new(BufWriter::new(io::stdout())),
            write_failed: AtomicBool::new(false),
            boot: Instant::now(),
        }
    }
}

impl Default for StdHal {
    fn default() -> Self {
        Self::new()
    }
}

impl HAL for StdHal {
    fn console_write(&self, token: &str) {
        let written = match self.console.lock() {
            Ok(mut out) => out.write_all(token.as_bytes()).is_ok(),
            Err(_) => false,
        };
        if !written {
            self.write_failed.store(true, Ordering::Relaxed);
        }
    }

    fn console_flush(&self) -> Result<(), HalError> {
        let mut out = self.console.lock().map_err(|_| HalError::IoError)?;
        out.flush().map_err(|_| HalError::IoError)?;
        if self.write_failed.swap(false, Ordering::Relaxed) {
            return Err(HalError::IoError);
        }
        Ok(())
    }

    fn now_nanos(&self) -> u64 {
        self.boot.elapsed().as_nanos() as u64
    }

    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), HalError> {
        getrandom::getrandom(buf).map_err(|_| HalError::EntropyUnavailable)
    }

    fn debug_write(&self, msg: &str) {
        eprintln!("{}", msg);
    }
}
