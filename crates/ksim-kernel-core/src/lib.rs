//! ksim Kernel Core - Pure State Machine for a simulated single-core kernel
//!
//! This crate contains the **pure, HAL-free** kernel state machine: the
//! process model, the runnable set, scheduling policies and the transitions
//! the run loop drives.
//!
//! # Design Principles
//!
//! 1. **No HAL dependency**: console, clock and entropy live in `ksim-kernel`
//! 2. **No I/O or side effects**: pure state transformations only
//! 3. **Deterministic**: same state, policy and seed give the same run
//! 4. **Verifiable**: invariants are checkable at runtime and under Kani
//!
//! # Architecture
//!
//! ```text
//!   ProcessSpec[] ──init──▶ KernelState { processes, next_pid }
//!                                 │
//!            SchedulingPolicy ◀───┤ schedule(): runnable set -> pid
//!                                 │
//!                   step(pid) ────┤ Syscall, cursor + 1
//!          exit / spawn / reap ───┘ runnable set mutations
//!
//!   ksim-kernel wraps these with the HAL console, the audit logs and the
//!   run loop.
//! ```
//!
//! # Module Organization
//!
//! - `types` - Syscalls, processes, process descriptors
//! - `policy` - `SchedulingPolicy` and the built-in policies
//! - `state` - KernelState holding the runnable set
//! - `step` - Pure `schedule/step/exit/spawn/reap` transitions
//! - `invariants` - Formal invariant assertions for verification
//! - `error` - `KernelError`

#![no_std]
extern crate alloc;

pub mod error;
pub mod invariants;
pub mod policy;
pub mod state;
pub mod step;
pub mod types;

pub use error::KernelError;
pub use invariants::{assert_invariants, check_all_invariants, InvariantViolation};
pub use policy::{
    PolicyConfig, PolicyKind, PriorityPolicy, RandomPolicy, SchedulingPolicy, SequentialPolicy,
    UnknownPolicy,
};
pub use state::KernelState;
pub use types::{
    Priority, Process, ProcessId, ProcessSpec, Syscall, SyscallKind, SYS_EXIT, SYS_FORK,
    SYS_WRITE, SYS_WRITE_DOUBLE,
};
