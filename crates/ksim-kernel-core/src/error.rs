//! Kernel errors
//!
//! Every variant is a contract violation or policy misbehavior. None of them
//! is retryable: the run loop stops at the first one.

use core::fmt;

use crate::types::ProcessId;

/// Kernel errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// Operation attempted before `init`
    NotInitialized,
    /// `init` called twice on the same kernel
    AlreadyInitialized,
    /// `schedule` called with an empty runnable set
    NoRunnableProcess,
    /// Process is not a member of the runnable set
    ProcessNotFound(ProcessId),
    /// Process was stepped past the end of its script
    ProcessExhausted(ProcessId),
    /// Policy chose a process outside the runnable set
    PolicyViolation(ProcessId),
    /// Run loop spent its step budget with processes still runnable
    StepLimitExceeded { steps: u64 },
    /// A kernel invariant failed during a checked run
    InvariantViolated(&'static str),
    /// `schedule` found a process that ran off its script but was never reaped
    NotReaped(ProcessId),
}

impl KernelError {
    /// Stable negative code recorded in syscall responses
    pub fn code(&self) -> i64 {
        match self {
            KernelError::NotInitialized => -1,
            KernelError::AlreadyInitialized => -2,
            KernelError::NoRunnableProcess => -3,
            KernelError::ProcessNotFound(_) => -4,
            KernelError::ProcessExhausted(_) => -5,
            KernelError::PolicyViolation(_) => -6,
            KernelError::StepLimitExceeded { .. } => -7,
            KernelError::InvariantViolated(_) => -8,
            KernelError::NotReaped(_) => -9,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::NotInitialized => write!(f, "kernel used before init"),
            KernelError::AlreadyInitialized => write!(f, "kernel already initialized"),
            KernelError::NoRunnableProcess => write!(f, "no runnable process to schedule"),
            KernelError::ProcessNotFound(pid) => write!(f, "{} is not runnable", pid),
            KernelError::ProcessExhausted(pid) => {
                write!(f, "{} stepped past the end of its script", pid)
            }
            KernelError::PolicyViolation(pid) => {
                write!(f, "policy selected {} outside the runnable set", pid)
            }
            KernelError::StepLimitExceeded { steps } => {
                write!(f, "step budget of {} exhausted with processes still runnable", steps)
            }
            KernelError::InvariantViolated(name) => write!(f, "invariant violated: {}", name),
            KernelError::NotReaped(pid) => {
                write!(f, "{} exhausted its script and was not reaped", pid)
            }
        }
    }
}
