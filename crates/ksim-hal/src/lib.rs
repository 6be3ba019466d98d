//! Hardware Abstraction Layer trait for the ksim kernel
//!
//! The kernel never touches a terminal, a clock or an entropy source
//! directly. Everything platform-specific goes through [`HAL`], so the same
//! kernel runs on a host console, under a test harness, or against a mock
//! that records every token.
//!
//! # Platform Implementations
//!
//! - **Host**: `ksim-runner` writes to stdout, reads `getrandom` entropy
//! - **Mock**: `ksim-hal-mock` captures output and runs a manual clock
//! - **Test**: [`TestHal`] discards everything

#![no_std]

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Hardware Abstraction Layer trait
///
/// Implementations provide platform-specific functionality for:
/// - The console token stream processes write to
/// - Debug output
/// - Time measurement
/// - Entropy (random numbers)
pub trait HAL: Send + Sync + 'static {
    // === Console ===

    /// Append one token to the process output stream.
    ///
    /// The stream is order-significant: tokens must appear in the order of
    /// the calls, with no separators added.
    fn console_write(&self, token: &str);

    /// Flush buffered console output, if the platform buffers.
    fn console_flush(&self) -> Result<(), HalError> {
        Ok(())
    }

    // === Time & Entropy ===

    /// Get current time in nanoseconds (monotonic)
    fn now_nanos(&self) -> u64;

    /// Fill buffer with random bytes
    ///
    /// # Returns
    /// * `Ok(())` - Buffer filled successfully
    /// * `Err(HalError::EntropyUnavailable)` - Entropy source failed
    /// * `Err(HalError::NotSupported)` - No entropy source on this platform
    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), HalError>;

    /// Draw a `u64` from [`HAL::random_bytes`].
    fn random_u64(&self) -> Result<u64, HalError> {
        let mut buf = [0u8; 8];
        self.random_bytes(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    // === Debug ===

    /// Write a debug message to the platform's diagnostic channel
    fn debug_write(&self, msg: &str);
}

/// HAL errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HalError {
    /// Operation not supported on this platform
    NotSupported,
    /// I/O error
    IoError,
    /// Entropy source failed
    EntropyUnavailable,
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalError::NotSupported => write!(f, "operation not supported on this platform"),
            HalError::IoError => write!(f, "console I/O failed"),
            HalError::EntropyUnavailable => write!(f, "entropy source unavailable"),
        }
    }
}

/// A minimal test HAL for unit testing
///
/// Discards console and debug output. Time only moves when a test calls
/// [`TestHal::advance`], and entropy is a constant pattern.
#[derive(Default)]
pub struct TestHal {
    time: AtomicU64,
}

impl TestHal {
    pub fn new() -> Self {
        Self {
            time: AtomicU64::new(0),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, nanos: u64) {
        self.time.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl HAL for TestHal {
    fn console_write(&self, _token: &str) {
        // No-op for tests
    }

    fn now_nanos(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), HalError> {
        for byte in buf.iter_mut() {
            *byte = 0x42;
        }
        Ok(())
    }

    fn debug_write(&self, _msg: &str) {
        // No-op for tests
    }
}
