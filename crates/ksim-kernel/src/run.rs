//! The run loop
//!
//! Repeatedly schedules a process, steps it and interprets the syscall it
//! returned until the runnable set is empty:
//!
//! ```text
//! EXIT          -> exit(p)
//! WRITE t       -> console_write(t)
//! WRITE_DOUBLE t-> console_write(t); console_write(t)
//! FORK          -> spawn(duplicate(p))
//! ```
//!
//! A process that executes FORK stays runnable and is not stepped again in
//! the same iteration. After every non-EXIT syscall the process (and a fork
//! child) is reaped if it ran off the end of its script.

use ksim_hal::HAL;
use log::{debug, warn};

use crate::{Kernel, KernelError, Syscall};

/// Run loop options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Stop with `StepLimitExceeded` after this many steps. `None` runs until
    /// the runnable set is empty; fork-heavy scripts grow exponentially.
    pub max_steps: Option<u64>,
    /// Check kernel invariants after every iteration
    pub check_invariants: bool,
}

impl RunConfig {
    /// Unbounded, unchecked
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step budget
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Enable invariant checking
    pub fn with_invariant_checks(mut self) -> Self {
        self.check_invariants = true;
        self
    }
}

/// What a run did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Syscalls executed
    pub steps: u64,
    /// Tokens written to the console
    pub emitted: u64,
    /// FORKs executed
    pub forks: u64,
    /// EXITs executed
    pub exits: u64,
    /// Processes dropped since init for exhausting their script
    pub dropped: u64,
    /// Largest runnable set seen
    pub peak_runnable: usize,
}

/// Drive `kernel` until no process is runnable.
///
/// Any kernel error stops the loop and is returned; console output written
/// before the error stays written.
pub fn run<H: HAL>(kernel: &mut Kernel<H>, config: &RunConfig) -> Result<RunSummary, KernelError> {
    if !kernel.is_initialized() {
        return Err(KernelError::NotInitialized);
    }

    let mut summary = RunSummary {
        peak_runnable: kernel.count(),
        ..RunSummary::default()
    };
    if config.check_invariants {
        kernel.check_invariants()?;
    }

    while kernel.count() > 0 {
        if let Some(limit) = config.max_steps {
            if summary.steps >= limit {
                warn!(
                    "step budget of {} spent with {} processes runnable",
                    limit,
                    kernel.count()
                );
                return Err(KernelError::StepLimitExceeded { steps: limit });
            }
        }

        let pid = kernel.schedule()?;
        let call = kernel.step(pid)?;
        summary.steps += 1;

        match call {
            Syscall::Exit => {
                kernel.exit(pid)?;
                summary.exits += 1;
            }
            Syscall::Write(token) => {
                kernel.hal().console_write(&token);
                summary.emitted += 1;
                kernel.reap(pid)?;
            }
            Syscall::WriteDouble(token) => {
                kernel.hal().console_write(&token);
                kernel.hal().console_write(&token);
                summary.emitted += 2;
                kernel.reap(pid)?;
            }
            Syscall::Fork => {
                let child = kernel.duplicate(pid)?;
                let child = kernel.spawn(child)?;
                summary.forks += 1;
                kernel.reap(pid)?;
                kernel.reap(child)?;
            }
        }

        summary.peak_runnable = summary.peak_runnable.max(kernel.count());
        if config.check_invariants {
            kernel.check_invariants()?;
        }
    }

    if let Err(e) = kernel.hal().console_flush() {
        warn!("console flush failed: {}", e);
    }

    summary.dropped = kernel.dropped_count();
    debug!(
        "run complete: {} steps, {} tokens, {} forks, {} exits, {} dropped",
        summary.steps, summary.emitted, summary.forks, summary.exits, summary.dropped
    );
    Ok(summary)
}
