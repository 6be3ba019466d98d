//! Deterministic replay of the runnable set.
//!
//! `ReplayState` rebuilds the shape of the runnable set (identities,
//! ancestry, priorities, cursors) from a commit log without the scripts
//! themselves, and hashes it the same way `Kernel::state_hash` hashes the
//! live kernel.

use alloc::collections::BTreeMap;
use alloc::format;

use ksim_axiom::{Priority, ReplayError, ReplayResult, Replayable, StateHasher};
use ksim_kernel_core::Process;

/// What replay knows about one process
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessRecord {
    pub parent: u64,
    pub priority: Priority,
    pub cursor: u64,
    pub script_len: u64,
}

impl ProcessRecord {
    fn is_exhausted(&self) -> bool {
        self.cursor >= self.script_len
    }
}

impl From<&Process> for ProcessRecord {
    fn from(p: &Process) -> Self {
        Self {
            parent: p.parent.0,
            priority: p.priority,
            cursor: p.cursor() as u64,
            script_len: p.len() as u64,
        }
    }
}

/// Runnable set reconstructed from commits.
#[derive(Clone, Debug, Default)]
pub struct ReplayState {
    processes: BTreeMap<u64, ProcessRecord>,
}

impl ReplayState {
    /// Empty state, as at genesis
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of processes in the reconstructed runnable set
    pub fn count(&self) -> usize {
        self.processes.len()
    }

    /// A reconstructed process
    pub fn process(&self, pid: u64) -> Option<&ProcessRecord> {
        self.processes.get(&pid)
    }

    fn get_mut(&mut self, pid: u64) -> ReplayResult<&mut ProcessRecord> {
        self.processes
            .get_mut(&pid)
            .ok_or(ReplayError::ProcessNotFound(pid))
    }
}

impl Replayable for ReplayState {
    fn replay_genesis(&mut self) -> ReplayResult<()> {
        Ok(())
    }

    fn replay_create_process(
        &mut self,
        pid: u64,
        parent: u64,
        priority: Priority,
        cursor: u64,
        script_len: u64,
    ) -> ReplayResult<()> {
        if self.processes.contains_key(&pid) {
            return Err(ReplayError::DuplicateProcess(pid));
        }
        if cursor > script_len {
            return Err(ReplayError::InvalidCommit(format!(
                "process {} created at cursor {} past script length {}",
                pid, cursor, script_len
            )));
        }
        self.processes.insert(
            pid,
            ProcessRecord {
                parent,
                priority,
                cursor,
                script_len,
            },
        );
        Ok(())
    }

    fn replay_step_process(&mut self, pid: u64, cursor: u64) -> ReplayResult<()> {
        let record = self.get_mut(pid)?;
        if cursor != record.cursor + 1 || cursor > record.script_len {
            return Err(ReplayError::InvalidCommit(format!(
                "process {} stepped from {} to {} (script length {})",
                pid, record.cursor, cursor, record.script_len
            )));
        }
        record.cursor = cursor;
        Ok(())
    }

    fn replay_exit_process(&mut self, pid: u64) -> ReplayResult<()> {
        self.processes
            .remove(&pid)
            .map(|_| ())
            .ok_or(ReplayError::ProcessNotFound(pid))
    }

    fn replay_drop_process(&mut self, pid: u64) -> ReplayResult<()> {
        let record = self.get_mut(pid)?;
        if !record.is_exhausted() {
            return Err(ReplayError::InvalidCommit(format!(
                "process {} dropped at cursor {} of {}",
                pid, record.cursor, record.script_len
            )));
        }
        self.processes.remove(&pid);
        Ok(())
    }

    fn state_hash(&self) -> [u8; 32] {
        hash_records(self.processes.iter().map(|(pid, r)| (*pid, *r)))
    }
}

/// Hash live processes, in PID order.
pub(crate) fn hash_processes<'a, I>(processes: I) -> [u8; 32]
where
    I: IntoIterator<Item = &'a Process>,
{
    hash_records(
        processes
            .into_iter()
            .map(|p| (p.pid.0, ProcessRecord::from(p))),
    )
}

fn hash_records<I>(records: I) -> [u8; 32]
where
    I: IntoIterator<Item = (u64, ProcessRecord)>,
{
    let mut hasher = StateHasher::new();
    let mut count = 0u64;
    for (pid, r) in records {
        hasher.write_u64(pid);
        hasher.write_u64(r.parent);
        hasher.write_u32(r.priority as u32);
        hasher.write_u64(r.cursor);
        hasher.write_u64(r.script_len);
        count += 1;
    }
    hasher.write_u64(count);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksim_axiom::{replay, CommitLog, CommitType};

    fn created(pid: u64, parent: u64, cursor: u64) -> CommitType {
        CommitType::ProcessCreated {
            pid,
            parent,
            priority: 0,
            cursor,
            script_len: 2,
        }
    }

    #[test]
    fn test_replay_fork_sequence() {
        let mut log = CommitLog::new(0);
        log.append(created(1, 0, 0), None, 0);
        log.append(CommitType::ProcessStepped { pid: 1, cursor: 1 }, Some(0), 1);
        log.append(created(2, 1, 1), None, 1);
        log.append(CommitType::ProcessStepped { pid: 2, cursor: 2 }, Some(2), 2);
        log.append(CommitType::ProcessExited { pid: 2 }, None, 2);

        let mut state = ReplayState::new();
        replay(&mut state, log.commits()).unwrap();

        assert_eq!(state.count(), 1);
        assert_eq!(state.process(1).map(|r| r.cursor), Some(1));
        assert!(state.process(2).is_none());
    }

    #[test]
    fn test_replay_rejects_skipped_step() {
        let mut state = ReplayState::new();
        state.replay_create_process(1, 0, 0, 0, 3).unwrap();

        assert!(matches!(
            state.replay_step_process(1, 2),
            Err(ReplayError::InvalidCommit(_))
        ));
    }

    #[test]
    fn test_replay_rejects_early_drop() {
        let mut state = ReplayState::new();
        state.replay_create_process(1, 0, 0, 0, 1).unwrap();

        assert!(matches!(
            state.replay_drop_process(1),
            Err(ReplayError::InvalidCommit(_))
        ));

        state.replay_step_process(1, 1).unwrap();
        assert_eq!(state.replay_drop_process(1), Ok(()));
    }

    #[test]
    fn test_replay_rejects_duplicate_pid() {
        let mut state = ReplayState::new();
        state.replay_create_process(1, 0, 0, 0, 1).unwrap();
        assert_eq!(
            state.replay_create_process(1, 0, 0, 0, 1),
            Err(ReplayError::DuplicateProcess(1))
        );
    }
}
