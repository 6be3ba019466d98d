//! Deterministic Replay for the ksim kernel
//!
//! This module provides the core replay functionality that ensures:
//!
//! > Same CommitLog always produces same state.
//!
//! # Architecture
//!
//! Replay works by applying commits in sequence to a fresh state:
//!
//! ```text
//! reduce(genesis, commits) -> state
//! ```
//!
//! Each commit is a pure state mutation with no side effects. Replay never
//! re-executes scripts and never writes to a console.

use alloc::string::String;
use core::fmt;

use crate::commitlog::{Commit, CommitType};
use crate::types::{Priority, ProcessId};

/// Errors that can occur during replay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayError {
    /// Commit is inconsistent with the state it is applied to
    InvalidCommit(String),
    /// Process not found during replay
    ProcessNotFound(ProcessId),
    /// Process created twice under the same PID
    DuplicateProcess(ProcessId),
    /// State hash mismatch after replay
    HashMismatch {
        expected: [u8; 32],
        actual: [u8; 32],
    },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::InvalidCommit(reason) => write!(f, "invalid commit: {}", reason),
            ReplayError::ProcessNotFound(pid) => write!(f, "replay: process {} not found", pid),
            ReplayError::DuplicateProcess(pid) => {
                write!(f, "replay: process {} created twice", pid)
            }
            ReplayError::HashMismatch { expected, actual } => write!(
                f,
                "state hash mismatch: expected {:02x}{:02x}{:02x}{:02x}.., got {:02x}{:02x}{:02x}{:02x}..",
                expected[0], expected[1], expected[2], expected[3], actual[0], actual[1], actual[2],
                actual[3]
            ),
        }
    }
}

/// Result of applying a commit.
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Trait for types that can be replayed.
///
/// Each method corresponds to a CommitType and applies that mutation
/// without any side effects (no HAL calls, no console output).
pub trait Replayable {
    /// Apply genesis commit (typically a no-op, state starts in genesis).
    fn replay_genesis(&mut self) -> ReplayResult<()>;

    /// Admit a process during replay.
    fn replay_create_process(
        &mut self,
        pid: ProcessId,
        parent: ProcessId,
        priority: Priority,
        cursor: u64,
        script_len: u64,
    ) -> ReplayResult<()>;

    /// Move a process cursor during replay.
    fn replay_step_process(&mut self, pid: ProcessId, cursor: u64) -> ReplayResult<()>;

    /// Remove a process that executed EXIT.
    fn replay_exit_process(&mut self, pid: ProcessId) -> ReplayResult<()>;

    /// Remove a process that exhausted its script.
    fn replay_drop_process(&mut self, pid: ProcessId) -> ReplayResult<()>;

    /// Compute a deterministic hash of the current state.
    ///
    /// This hash covers, in PID order, each process's
    /// `(pid, parent, priority, cursor, script_len)`. It does NOT include
    /// console output or timestamps.
    fn state_hash(&self) -> [u8; 32];
}

/// Apply a single commit to a replayable state.
///
/// This is a pure function - no side effects beyond state mutation.
/// Must be deterministic: same commit + same state = same result.
pub fn apply_commit<R: Replayable>(state: &mut R, commit: &Commit) -> ReplayResult<()> {
    match &commit.commit_type {
        CommitType::Genesis => state.replay_genesis(),

        CommitType::ProcessCreated {
            pid,
            parent,
            priority,
            cursor,
            script_len,
        } => state.replay_create_process(*pid, *parent, *priority, *cursor, *script_len),

        CommitType::ProcessStepped { pid, cursor } => state.replay_step_process(*pid, *cursor),

        CommitType::ProcessExited { pid } => state.replay_exit_process(*pid),

        CommitType::ProcessDropped { pid } => state.replay_drop_process(*pid),
    }
}

/// Replay a sequence of commits to reconstruct state.
///
/// # Example
///
/// ```ignore
/// let mut state = ReplayState::new();
/// replay(&mut state, kernel.commitlog().commits())?;
/// assert_eq!(state.state_hash(), kernel.state_hash());
/// ```
pub fn replay<'a, R, I>(state: &mut R, commits: I) -> ReplayResult<()>
where
    R: Replayable,
    I: IntoIterator<Item = &'a Commit>,
{
    for commit in commits {
        apply_commit(state, commit)?;
    }
    Ok(())
}

/// Replay commits and verify the final state hash.
///
/// # Returns
/// - `Ok(())`: Replay successful and hash matches
/// - `Err(ReplayError::HashMismatch)`: Replay successful but hash differs
/// - `Err(ReplayError)`: Error during replay
pub fn replay_and_verify<'a, R, I>(
    state: &mut R,
    commits: I,
    expected_hash: [u8; 32],
) -> ReplayResult<()>
where
    R: Replayable,
    I: IntoIterator<Item = &'a Commit>,
{
    replay(state, commits)?;

    let actual_hash = state.state_hash();
    if actual_hash != expected_hash {
        return Err(ReplayError::HashMismatch {
            expected: expected_hash,
            actual: actual_hash,
        });
    }

    Ok(())
}

/// FNV-1a hasher for state hashing and the commit chain.
///
/// The hash is expanded to 32 bytes for compatibility with cryptographic hashes.
pub struct StateHasher {
    hash: u64,
}

impl StateHasher {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Create a new hasher.
    pub fn new() -> Self {
        Self {
            hash: Self::FNV_OFFSET,
        }
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, v: u8) {
        self.hash ^= v as u64;
        self.hash = self.hash.wrapping_mul(Self::FNV_PRIME);
    }

    /// Write a u32.
    pub fn write_u32(&mut self, v: u32) {
        for b in v.to_le_bytes() {
            self.write_u8(b);
        }
    }

    /// Write a u64.
    pub fn write_u64(&mut self, v: u64) {
        for b in v.to_le_bytes() {
            self.write_u8(b);
        }
    }

    /// Finalize and return a 32-byte hash.
    ///
    /// The 64-bit FNV hash is expanded to 32 bytes by iteratively
    /// multiplying by the FNV prime.
    pub fn finalize(&self) -> [u8; 32] {
        let mut result = [0u8; 32];
        let mut h = self.hash;

        for chunk in result.chunks_mut(8) {
            let bytes = h.to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
            h = h.wrapping_mul(Self::FNV_PRIME);
        }

        result
    }
}

impl Default for StateHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitlog::CommitLog;
    use alloc::collections::BTreeMap;
    use alloc::format;

    /// Minimal replay target: pid -> cursor
    #[derive(Default)]
    struct Cursors {
        procs: BTreeMap<ProcessId, u64>,
    }

    impl Replayable for Cursors {
        fn replay_genesis(&mut self) -> ReplayResult<()> {
            Ok(())
        }

        fn replay_create_process(
            &mut self,
            pid: ProcessId,
            _parent: ProcessId,
            _priority: Priority,
            cursor: u64,
            _script_len: u64,
        ) -> ReplayResult<()> {
            if self.procs.insert(pid, cursor).is_some() {
                return Err(ReplayError::DuplicateProcess(pid));
            }
            Ok(())
        }

        fn replay_step_process(&mut self, pid: ProcessId, cursor: u64) -> ReplayResult<()> {
            let slot = self
                .procs
                .get_mut(&pid)
                .ok_or(ReplayError::ProcessNotFound(pid))?;
            *slot = cursor;
            Ok(())
        }

        fn replay_exit_process(&mut self, pid: ProcessId) -> ReplayResult<()> {
            self.procs
                .remove(&pid)
                .map(|_| ())
                .ok_or(ReplayError::ProcessNotFound(pid))
        }

        fn replay_drop_process(&mut self, pid: ProcessId) -> ReplayResult<()> {
            self.replay_exit_process(pid)
        }

        fn state_hash(&self) -> [u8; 32] {
            let mut h = StateHasher::new();
            for (pid, cursor) in &self.procs {
                h.write_u64(*pid);
                h.write_u64(*cursor);
            }
            h.finalize()
        }
    }

    fn created(pid: ProcessId) -> CommitType {
        CommitType::ProcessCreated {
            pid,
            parent: 0,
            priority: 0,
            cursor: 0,
            script_len: 2,
        }
    }

    #[test]
    fn test_state_hasher_deterministic() {
        let mut h1 = StateHasher::new();
        let mut h2 = StateHasher::new();

        h1.write_u64(42);
        h1.write_u32(7);
        h1.write_u8(0xff);

        h2.write_u64(42);
        h2.write_u32(7);
        h2.write_u8(0xff);

        assert_eq!(h1.finalize(), h2.finalize());
    }

    #[test]
    fn test_state_hasher_order_matters() {
        let mut h1 = StateHasher::new();
        let mut h2 = StateHasher::new();

        h1.write_u64(1);
        h1.write_u64(2);

        h2.write_u64(2);
        h2.write_u64(1);

        assert_ne!(h1.finalize(), h2.finalize());
    }

    #[test]
    fn test_replay_reduces_commits() {
        let mut log = CommitLog::new(0);
        log.append(created(1), None, 1);
        log.append(created(2), None, 1);
        log.append(CommitType::ProcessStepped { pid: 1, cursor: 1 }, None, 2);
        log.append(CommitType::ProcessExited { pid: 2 }, None, 3);

        let mut state = Cursors::default();
        replay(&mut state, log.commits()).unwrap();

        assert_eq!(state.procs.len(), 1);
        assert_eq!(state.procs[&1], 1);
    }

    #[test]
    fn test_replay_and_verify_detects_mismatch() {
        let mut log = CommitLog::new(0);
        log.append(created(1), None, 1);

        let mut expected = Cursors::default();
        expected.procs.insert(1, 0);
        let good = expected.state_hash();

        assert_eq!(replay_and_verify(&mut Cursors::default(), log.commits(), good), Ok(()));

        let err = replay_and_verify(&mut Cursors::default(), log.commits(), [0u8; 32]);
        assert!(matches!(err, Err(ReplayError::HashMismatch { .. })));
    }

    #[test]
    fn test_replay_stops_at_first_error() {
        let mut log = CommitLog::new(0);
        log.append(CommitType::ProcessExited { pid: 9 }, None, 1);
        log.append(created(1), None, 2);

        let mut state = Cursors::default();
        assert_eq!(
            replay(&mut state, log.commits()),
            Err(ReplayError::ProcessNotFound(9))
        );
        assert!(state.procs.is_empty());
    }

    #[test]
    fn test_replay_error_display() {
        let err = ReplayError::ProcessNotFound(123);
        assert_eq!(format!("{}", err), "replay: process 123 not found");

        let err = ReplayError::HashMismatch {
            expected: [0u8; 32],
            actual: [1u8; 32],
        };
        assert!(format!("{}", err).starts_with("state hash mismatch"));
    }
}
