//! Formal invariants for kernel verification
//!
//! Runtime-checkable properties of the runnable set. Used for:
//! 1. Checked runs (`RunConfig::check_invariants`)
//! 2. Assertions in tests
//! 3. Bounded model checking with Kani
//!
//! # Invariants
//!
//! 1. **Cursor Bounds**: `cursor <= len(script)` for every process
//! 2. **No Exhausted Runnable**: at a scheduling point no process is exhausted
//! 3. **ID Monotonicity**: every PID is assigned and below `next_pid`
//! 4. **Fork Ordering**: a child's PID is greater than its parent's

use alloc::string::String;
use alloc::vec::Vec;

use crate::state::KernelState;

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all kernel invariants.
///
/// Returns a list of violations (empty if all invariants hold). Intended to
/// run between loop iterations, after exhausted processes were reaped.
pub fn check_all_invariants(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_cursor_bounds(state));
    violations.extend(check_no_exhausted_runnable(state));
    violations.extend(check_id_monotonicity(state));
    violations.extend(check_fork_ordering(state));

    violations
}

/// Invariant 1: `0 <= cursor <= len(script)`
fn check_cursor_bounds(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (pid, proc) in &state.processes {
        if proc.cursor() > proc.len() {
            violations.push(InvariantViolation {
                invariant: "cursor_bounds",
                description: alloc::format!(
                    "Process {} has cursor {} past script length {}",
                    pid.0,
                    proc.cursor(),
                    proc.len()
                ),
            });
        }
    }

    violations
}

/// Invariant 2: exhausted processes never stay schedulable
fn check_no_exhausted_runnable(state: &KernelState) -> Vec<InvariantViolation> {
    state
        .processes
        .iter()
        .filter(|(_, proc)| proc.is_exhausted())
        .map(|(pid, _)| InvariantViolation {
            invariant: "no_exhausted_runnable",
            description: alloc::format!("Process {} is exhausted but still runnable", pid.0),
        })
        .collect()
}

/// Invariant 3: PIDs are assigned and below the allocator
fn check_id_monotonicity(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (pid, proc) in &state.processes {
        if !pid.is_assigned() || pid.0 >= state.next_pid {
            violations.push(InvariantViolation {
                invariant: "id_monotonicity",
                description: alloc::format!(
                    "Process {} exists but next_pid is {}",
                    pid.0,
                    state.next_pid
                ),
            });
        }
        if proc.pid != *pid {
            violations.push(InvariantViolation {
                invariant: "id_monotonicity",
                description: alloc::format!(
                    "Process stored under {} carries pid {}",
                    pid.0,
                    proc.pid.0
                ),
            });
        }
    }

    violations
}

/// Invariant 4: children are younger than their parents
fn check_fork_ordering(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (pid, proc) in &state.processes {
        if proc.parent.is_assigned() && proc.parent >= *pid {
            violations.push(InvariantViolation {
                invariant: "fork_ordering",
                description: alloc::format!(
                    "Process {} was forked by younger process {}",
                    pid.0,
                    proc.parent.0
                ),
            });
        }
    }

    violations
}

/// Assert all invariants hold (panic if not)
pub fn assert_invariants(state: &KernelState) {
    if let Some(v) = check_all_invariants(state).first() {
        panic!("Invariant violated: {} ({})", v.invariant, v.description);
    }
}

// ============================================================================
// Kani proofs for invariants
// ============================================================================

#[cfg(kani)]
mod proofs {
    use super::*;
    use crate::policy::SequentialPolicy;
    use crate::step::{duplicate, reap, schedule, spawn, step};
    use crate::types::{ProcessSpec, Syscall};
    use alloc::vec;

    /// Proof: a scheduled step never moves the cursor past the script
    #[kani::proof]
    #[kani::unwind(5)]
    fn step_respects_cursor_bounds() {
        let mut state = KernelState::from_specs(vec![ProcessSpec::new(vec![
            Syscall::fork(),
            Syscall::exit(),
        ])]);

        let pid = schedule(&state, &mut SequentialPolicy).unwrap();
        let _ = step(&mut state, pid);
        let _ = step(&mut state, pid);
        let _ = step(&mut state, pid);

        let proc = state.get_process(pid).unwrap();
        kani::assert(proc.cursor() <= proc.len(), "cursor stays in bounds");
    }

    /// Proof: fork then reap maintains invariants
    #[kani::proof]
    #[kani::unwind(5)]
    fn fork_maintains_invariants() {
        let mut state = KernelState::from_specs(vec![ProcessSpec::new(vec![Syscall::fork()])]);

        let pid = schedule(&state, &mut SequentialPolicy).unwrap();
        let _ = step(&mut state, pid);
        let child = spawn(&mut state, duplicate(&state, pid).unwrap());
        reap(&mut state, pid);
        reap(&mut state, child);

        let violations = check_all_invariants(&state);
        kani::assert(violations.is_empty(), "fork + reap should maintain invariants");
        kani::assert(state.count() == 0, "both exhausted processes are dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{duplicate, reap, spawn, step};
    use crate::types::{Process, ProcessId, ProcessSpec, Syscall};
    use alloc::vec;

    #[test]
    fn test_invariants_hold_for_new_state() {
        let state = KernelState::new();
        assert!(check_all_invariants(&state).is_empty());
    }

    #[test]
    fn test_invariants_hold_after_fork() {
        let mut state = KernelState::from_specs(vec![ProcessSpec::new(vec![
            Syscall::write("A"),
            Syscall::fork(),
            Syscall::exit(),
        ])]);
        step(&mut state, ProcessId(1)).unwrap();
        step(&mut state, ProcessId(1)).unwrap();
        let copy = duplicate(&state, ProcessId(1)).unwrap();
        spawn(&mut state, copy);

        assert_invariants(&state);
    }

    #[test]
    fn test_exhausted_process_is_flagged_until_reaped() {
        let mut state = KernelState::from_specs(vec![ProcessSpec::new(vec![Syscall::write("X")])]);
        step(&mut state, ProcessId(1)).unwrap();

        let violations = check_all_invariants(&state);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant, "no_exhausted_runnable");

        reap(&mut state, ProcessId(1));
        assert!(check_all_invariants(&state).is_empty());
    }

    #[test]
    fn test_id_monotonicity_violation() {
        let mut state = KernelState::new();
        let mut proc = Process::new(vec![Syscall::exit()], 0);
        proc.pid = ProcessId(5);
        state.processes.insert(ProcessId(5), proc);

        let violations = check_all_invariants(&state);
        assert!(violations.iter().any(|v| v.invariant == "id_monotonicity"));
    }

    #[test]
    fn test_fork_ordering_violation() {
        let mut state = KernelState::from_specs(vec![ProcessSpec::new(vec![Syscall::exit()])]);
        state.get_process_mut(ProcessId(1)).unwrap().parent = ProcessId(1);

        let violations = check_all_invariants(&state);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant, "fork_ordering");
    }

    #[test]
    #[should_panic(expected = "no_exhausted_runnable")]
    fn test_assert_invariants_panics() {
        let state = KernelState::from_specs(vec![ProcessSpec::new(Vec::new())]);
        assert_invariants(&state);
    }
}
