//! Pure kernel transitions
//!
//! Every operation the kernel exposes is a function of `&mut KernelState`
//! here. No HAL, no I/O, no audit: the runtime wrapper (`ksim-kernel`) adds
//! those around these calls.
//!
//! # Contract
//!
//! - `schedule` never mutates the runnable set or any process
//! - `step` advances exactly one process cursor by exactly one
//! - `exit` and `reap` remove at most one process
//! - `spawn` appends exactly one process with a fresh, larger PID

use crate::error::KernelError;
use crate::policy::SchedulingPolicy;
use crate::state::KernelState;
use crate::types::{Process, ProcessId, Syscall};

/// Ask `policy` for the next process to run.
///
/// An exhausted member left behind by a caller that skipped `reap` is
/// reported as `NotReaped` before the policy is consulted. The choice is then
/// checked against the runnable set: a policy that returns a process it was
/// not handed is a `PolicyViolation`.
pub fn schedule(
    state: &KernelState,
    policy: &mut dyn SchedulingPolicy,
) -> Result<ProcessId, KernelError> {
    let runnable = state.runnable();
    if runnable.is_empty() {
        return Err(KernelError::NoRunnableProcess);
    }
    if let Some(stale) = runnable.iter().find(|p| p.is_exhausted()) {
        return Err(KernelError::NotReaped(stale.pid));
    }

    let chosen = policy
        .select(&runnable)
        .ok_or(KernelError::NoRunnableProcess)?;

    // Identity, not equality: the reference must be one we handed out.
    state
        .get_process(chosen.pid)
        .filter(|p| core::ptr::eq(*p, chosen))
        .map(|p| p.pid)
        .ok_or(KernelError::PolicyViolation(chosen.pid))
}

/// Execute one syscall of `pid`: return it and advance the cursor.
pub fn step(state: &mut KernelState, pid: ProcessId) -> Result<Syscall, KernelError> {
    state
        .get_process_mut(pid)
        .ok_or(KernelError::ProcessNotFound(pid))?
        .step()
}

/// Remove `pid` from the runnable set. Exiting twice is `ProcessNotFound`.
pub fn exit(state: &mut KernelState, pid: ProcessId) -> Result<Process, KernelError> {
    state
        .remove_process(pid)
        .ok_or(KernelError::ProcessNotFound(pid))
}

/// Value copy of `pid`, ready to be spawned.
pub fn duplicate(state: &KernelState, pid: ProcessId) -> Result<Process, KernelError> {
    state
        .get_process(pid)
        .map(Process::duplicate)
        .ok_or(KernelError::ProcessNotFound(pid))
}

/// Append `process` to the end of the runnable set under a fresh PID.
pub fn spawn(state: &mut KernelState, process: Process) -> ProcessId {
    state.admit(process)
}

/// Drop `pid` if it is still runnable and has run off the end of its
/// script. Returns whether it was dropped.
pub fn reap(state: &mut KernelState, pid: ProcessId) -> bool {
    match state.get_process(pid) {
        Some(p) if p.is_exhausted() => {
            state.remove_process(pid);
            true
        }
        _ => false,
    }
}
