//! Core kernel types
//!
//! This module contains the fundamental types used throughout the kernel core.
//! All types here are pure data - no behavior that depends on HAL.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Process identifier
///
/// `ProcessId(0)` is reserved: it marks a process that has not been admitted
/// to a runnable set yet, and is the parent of every initial process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

impl ProcessId {
    /// Reserved "no identity" value
    pub const UNASSIGNED: ProcessId = ProcessId(0);

    /// Whether the kernel has assigned this identity
    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

// ============================================================================
// Syscalls
// ============================================================================

/// Syscall number: process exits
pub const SYS_EXIT: u32 = 0;
/// Syscall number: write the argument to the console once
pub const SYS_WRITE: u32 = 1;
/// Syscall number: write the argument to the console twice
pub const SYS_WRITE_DOUBLE: u32 = 2;
/// Syscall number: duplicate the calling process
pub const SYS_FORK: u32 = 3;

/// The tag of a [`Syscall`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyscallKind {
    Exit,
    Write,
    WriteDouble,
    Fork,
}

impl SyscallKind {
    /// ABI number of this syscall kind
    pub fn number(&self) -> u32 {
        match self {
            SyscallKind::Exit => SYS_EXIT,
            SyscallKind::Write => SYS_WRITE,
            SyscallKind::WriteDouble => SYS_WRITE_DOUBLE,
            SyscallKind::Fork => SYS_FORK,
        }
    }

    /// Convert from an ABI number
    pub fn from_number(v: u32) -> Option<Self> {
        match v {
            SYS_EXIT => Some(SyscallKind::Exit),
            SYS_WRITE => Some(SyscallKind::Write),
            SYS_WRITE_DOUBLE => Some(SyscallKind::WriteDouble),
            SYS_FORK => Some(SyscallKind::Fork),
            _ => None,
        }
    }
}

/// A single instruction in a process script.
///
/// The write variants own the token they emit, so a write without an
/// argument cannot be constructed. Serialized as
/// `{"kind": "write", "arg": "A"}` / `{"kind": "exit"}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "arg", rename_all = "snake_case")]
pub enum Syscall {
    /// Leave the runnable set
    Exit,
    /// Emit the token once
    Write(String),
    /// Emit the token twice, back to back
    WriteDouble(String),
    /// Duplicate the calling process
    Fork,
}

impl Syscall {
    /// `EXIT`
    pub fn exit() -> Self {
        Syscall::Exit
    }

    /// `WRITE arg`
    pub fn write(arg: impl Into<String>) -> Self {
        Syscall::Write(arg.into())
    }

    /// `WRITE_DOUBLE arg`
    pub fn write_double(arg: impl Into<String>) -> Self {
        Syscall::WriteDouble(arg.into())
    }

    /// `FORK`
    pub fn fork() -> Self {
        Syscall::Fork
    }

    /// The syscall's tag
    pub fn kind(&self) -> SyscallKind {
        match self {
            Syscall::Exit => SyscallKind::Exit,
            Syscall::Write(_) => SyscallKind::Write,
            Syscall::WriteDouble(_) => SyscallKind::WriteDouble,
            Syscall::Fork => SyscallKind::Fork,
        }
    }

    /// The token carried by write syscalls, `None` for exit and fork
    pub fn arg(&self) -> Option<&str> {
        match self {
            Syscall::Write(arg) | Syscall::WriteDouble(arg) => Some(arg.as_str()),
            Syscall::Exit | Syscall::Fork => None,
        }
    }
}

// ============================================================================
// Processes
// ============================================================================

/// Process scheduling priority (higher value = more preferred)
pub type Priority = i32;

/// Initial process descriptor, as read from a scenario.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Syscalls in execution order
    pub script: Vec<Syscall>,
    /// Scheduling priority
    #[serde(default)]
    pub priority: Priority,
}

impl ProcessSpec {
    /// Descriptor with the default priority
    pub fn new(script: Vec<Syscall>) -> Self {
        Self {
            script,
            priority: 0,
        }
    }

    /// Descriptor with an explicit priority
    pub fn with_priority(script: Vec<Syscall>, priority: Priority) -> Self {
        Self { script, priority }
    }
}

/// Process descriptor
///
/// The script is shared read-only between a process and its fork
/// duplicates; the cursor and priority are owned per process.
#[derive(Clone, Debug)]
pub struct Process {
    /// Process ID (unassigned until admitted by the kernel)
    pub pid: ProcessId,
    /// Process that forked this one (`UNASSIGNED` for initial processes)
    pub parent: ProcessId,
    /// Scheduling priority
    pub priority: Priority,
    script: Arc<[Syscall]>,
    cursor: usize,
}

impl Process {
    /// Create a fresh, unadmitted process at cursor 0.
    pub fn new(script: Vec<Syscall>, priority: Priority) -> Self {
        Self {
            pid: ProcessId::UNASSIGNED,
            parent: ProcessId::UNASSIGNED,
            priority,
            script: Arc::from(script),
            cursor: 0,
        }
    }

    /// Index of the next syscall to execute
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The full script
    pub fn script(&self) -> &[Syscall] {
        &self.script
    }

    /// Script length
    pub fn len(&self) -> usize {
        self.script.len()
    }

    /// Whether the script is empty
    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    /// Syscalls left to execute
    pub fn remaining(&self) -> usize {
        self.script.len() - self.cursor
    }

    /// Whether the cursor has reached the end of the script
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.script.len()
    }

    /// The next syscall, without advancing
    pub fn peek(&self) -> Option<&Syscall> {
        self.script.get(self.cursor)
    }

    /// Execute one step: return `script[cursor]` and advance the cursor by one.
    ///
    /// Stepping an exhausted process is a contract violation and leaves the
    /// cursor untouched.
    pub fn step(&mut self) -> Result<Syscall, KernelError> {
        let call = self
            .script
            .get(self.cursor)
            .cloned()
            .ok_or(KernelError::ProcessExhausted(self.pid))?;
        self.cursor += 1;
        Ok(call)
    }

    /// Value copy of this process for FORK.
    ///
    /// Same script, cursor and priority; the copy has no identity of its own
    /// and names this process as its parent. The source is not touched.
    pub fn duplicate(&self) -> Process {
        Process {
            pid: ProcessId::UNASSIGNED,
            parent: self.pid,
            priority: self.priority,
            script: Arc::clone(&self.script),
            cursor: self.cursor,
        }
    }
}

impl From<ProcessSpec> for Process {
    fn from(spec: ProcessSpec) -> Self {
        Process::new(spec.script, spec.priority)
    }
}
