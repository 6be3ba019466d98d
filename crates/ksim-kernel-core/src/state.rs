//! The runnable set and PID allocator
//!
//! Plain data. Transitions over it live in `step`; console, clock and audit
//! logging live in `ksim-kernel`.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::types::{Process, ProcessId, ProcessSpec};

/// Everything the kernel knows between two steps.
///
/// PIDs are allocated monotonically and forks always receive a fresh PID, so
/// the key order of `processes` is the insertion order of the runnable set.
pub struct KernelState {
    /// Runnable set, keyed by identity
    pub processes: BTreeMap<ProcessId, Process>,
    /// Next process ID to allocate
    pub next_pid: u64,
}

impl KernelState {
    /// Create a new empty kernel state.
    pub fn new() -> Self {
        Self {
            processes: BTreeMap::new(),
            next_pid: 1,
        }
    }

    /// Create a state holding `specs` in order, PIDs 1..=n.
    pub fn from_specs(specs: Vec<ProcessSpec>) -> Self {
        let mut state = Self::new();
        for spec in specs {
            state.admit(Process::from(spec));
        }
        state
    }

    /// Generate next process ID
    pub fn alloc_pid(&mut self) -> ProcessId {
        let pid = ProcessId(self.next_pid);
        self.next_pid += 1;
        pid
    }

    // ========================================================================
    // Read-only accessors
    // ========================================================================

    /// Number of runnable processes
    pub fn count(&self) -> usize {
        self.processes.len()
    }

    /// Get process info
    pub fn get_process(&self, pid: ProcessId) -> Option<&Process> {
        self.processes.get(&pid)
    }

    /// Get mutable process info
    pub fn get_process_mut(&mut self, pid: ProcessId) -> Option<&mut Process> {
        self.processes.get_mut(&pid)
    }

    /// Check if a process is in the runnable set
    pub fn contains(&self, pid: ProcessId) -> bool {
        self.processes.contains_key(&pid)
    }

    /// Runnable processes in insertion order
    pub fn runnable(&self) -> Vec<&Process> {
        self.processes.values().collect()
    }

    /// Runnable PIDs in insertion order
    pub fn runnable_ids(&self) -> Vec<ProcessId> {
        self.processes.keys().copied().collect()
    }

    // ========================================================================
    // State mutation helpers (pure - no side effects)
    // ========================================================================

    /// Give `process` a fresh identity and append it to the runnable set.
    pub fn admit(&mut self, mut process: Process) -> ProcessId {
        let pid = self.alloc_pid();
        process.pid = pid;
        self.processes.insert(pid, process);
        pid
    }

    /// Remove a process completely
    pub fn remove_process(&mut self, pid: ProcessId) -> Option<Process> {
        self.processes.remove(&pid)
    }
}

impl Default for KernelState {
    fn default() -> Self {
        Self::new()
    }
}
