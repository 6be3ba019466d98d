//! Recording HAL for ksim tests
//!
//! [`MockHal`] keeps every console token and debug line in memory, runs a
//! clock that only moves when told to, and draws "entropy" from a seeded
//! LCG. Tests assert on [`MockHal::console_output`] after a run.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use ksim_hal::{HalError, HAL};

const DEFAULT_SEED: u64 = 12345;

/// In-memory HAL
pub struct MockHal {
    time: AtomicU64,
    /// Added to the clock after every read
    tick: AtomicU64,
    console: Mutex<Vec<String>>,
    debug_log: Mutex<Vec<String>>,
    flushes: AtomicU64,
    fail_flush: AtomicBool,
    seed: AtomicU64,
    entropy_available: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not hide the output of the others
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHal {
    pub fn new() -> Self {
        Self::with_time(0)
    }

    /// Mock whose clock starts at `nanos`
    pub fn with_time(nanos: u64) -> Self {
        Self {
            time: AtomicU64::new(nanos),
            tick: AtomicU64::new(0),
            console: Mutex::new(Vec::new()),
            debug_log: Mutex::new(Vec::new()),
            flushes: AtomicU64::new(0),
            fail_flush: AtomicBool::new(false),
            seed: AtomicU64::new(DEFAULT_SEED),
            entropy_available: AtomicBool::new(true),
        }
    }

    // === Clock ===

    pub fn advance_time(&self, nanos: u64) {
        self.time.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn set_time(&self, nanos: u64) {
        self.time.store(nanos, Ordering::SeqCst);
    }

    /// Make every clock read advance the clock by `nanos`.
    pub fn set_tick(&self, nanos: u64) {
        self.tick.store(nanos, Ordering::SeqCst);
    }

    // === Console ===

    /// The output stream: every token, concatenated in write order
    pub fn console_output(&self) -> String {
        lock(&self.console).concat()
    }

    /// One entry per `console_write` call
    pub fn console_tokens(&self) -> Vec<String> {
        lock(&self.console).clone()
    }

    pub fn clear_console(&self) {
        lock(&self.console).clear();
    }

    /// How many times the kernel flushed the console
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Make `console_flush` fail with `IoError`.
    pub fn set_flush_failure(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    // === Debug channel ===

    pub fn get_debug_log(&self) -> Vec<String> {
        lock(&self.debug_log).clone()
    }

    pub fn clear_debug_log(&self) {
        lock(&self.debug_log).clear();
    }

    pub fn has_log_containing(&self, substr: &str) -> bool {
        lock(&self.debug_log).iter().any(|msg| msg.contains(substr))
    }

    pub fn debug_log_count(&self) -> usize {
        lock(&self.debug_log).len()
    }

    // === Entropy ===

    /// Restart the entropy sequence from `seed`.
    pub fn set_random_seed(&self, seed: u64) {
        self.seed.store(seed, Ordering::SeqCst);
    }

    /// Simulate a platform whose entropy source is broken.
    pub fn set_entropy_available(&self, available: bool) {
        self.entropy_available.store(available, Ordering::SeqCst);
    }
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

impl HAL for MockHal {
    fn console_write(&self, token: &str) {
        lock(&self.console).push(token.to_owned());
    }

    fn console_flush(&self) -> Result<(), HalError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(HalError::IoError);
        }
        Ok(())
    }

    fn now_nanos(&self) -> u64 {
        let tick = self.tick.load(Ordering::SeqCst);
        self.time.fetch_add(tick, Ordering::SeqCst)
    }

    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), HalError> {
        if !self.entropy_available.load(Ordering::SeqCst) {
            return Err(HalError::EntropyUnavailable);
        }
        let mut state = self.seed.load(Ordering::SeqCst);
        for byte in buf.iter_mut() {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            *byte = (state >> 56) as u8;
        }
        self.seed.store(state, Ordering::SeqCst);
        Ok(())
    }

    fn debug_write(&self, msg: &str) {
        lock(&self.debug_log).push(msg.to_owned());
    }
}
