//! Commit Log for Deterministic Replay
//!
//! Records runnable-set mutations as commits for deterministic replay.
//! Each commit links to the previous via hash chain.
//!
//! # Core Invariant
//!
//! > `reduce(genesis, commits) -> state`
//!
//! Replaying the same CommitLog always produces the same state.

use alloc::collections::VecDeque;
use serde::{Deserialize, Serialize};

use crate::replay::StateHasher;
use crate::types::{CommitId, EventId, Priority, ProcessId};

/// A state mutation record.
///
/// Commits are append-only and form a hash chain for integrity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Commit {
    /// Hash of this commit (computed from contents + prev_commit)
    pub id: CommitId,
    /// Hash of the previous commit (chain integrity)
    pub prev_commit: CommitId,
    /// Sequence number (monotonic)
    pub seq: u64,
    /// Timestamp (nanos since boot)
    pub timestamp: u64,
    /// The type of state mutation
    pub commit_type: CommitType,
    /// Optional: the syscall event that caused this commit
    pub caused_by: Option<EventId>,
}

/// Types of state mutations (for deterministic replay).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitType {
    /// Genesis commit (kernel boot)
    Genesis,

    /// Process admitted to the runnable set (initial or forked)
    ProcessCreated {
        pid: ProcessId,
        /// 0 for initial processes
        parent: ProcessId,
        priority: Priority,
        /// Cursor at admission (a fork child inherits its parent's)
        cursor: u64,
        script_len: u64,
    },
    /// Process executed one syscall; `cursor` is the value after the step
    ProcessStepped { pid: ProcessId, cursor: u64 },
    /// Process executed EXIT and left the runnable set
    ProcessExited { pid: ProcessId },
    /// Process ran off the end of its script and was dropped
    ProcessDropped { pid: ProcessId },
}

impl CommitType {
    /// Stable discriminant used in the hash chain
    fn tag(&self) -> u8 {
        match self {
            CommitType::Genesis => 0,
            CommitType::ProcessCreated { .. } => 1,
            CommitType::ProcessStepped { .. } => 2,
            CommitType::ProcessExited { .. } => 3,
            CommitType::ProcessDropped { .. } => 4,
        }
    }
}

/// Maximum number of commits to keep in memory
const MAX_COMMITLOG_ENTRIES: usize = 100000;

/// Commit log for deterministic replay.
///
/// All runnable-set mutations are recorded as commits.
/// Replaying commits from genesis reconstructs the exact state.
///
/// Every process step appends a commit, so the retained window is a ring:
/// once full, each append drops exactly one commit from the front.
pub struct CommitLog {
    /// Retained commits, oldest first
    commits: VecDeque<Commit>,
    /// Next sequence number
    next_seq: u64,
    /// Hash of the last commit
    last_hash: CommitId,
}

impl CommitLog {
    /// Create a new CommitLog with a genesis commit.
    pub fn new(timestamp: u64) -> Self {
        let genesis = Commit {
            id: [0u8; 32], // Will be computed
            prev_commit: [0u8; 32],
            seq: 0,
            timestamp,
            commit_type: CommitType::Genesis,
            caused_by: None,
        };
        let id = Self::compute_hash(&genesis);
        let genesis = Commit { id, ..genesis };

        let mut commits = VecDeque::new();
        commits.push_back(genesis);

        Self {
            commits,
            next_seq: 1,
            last_hash: id,
        }
    }

    /// Append a new commit to the log.
    ///
    /// Returns the commit ID (hash).
    pub fn append(
        &mut self,
        commit_type: CommitType,
        caused_by: Option<EventId>,
        timestamp: u64,
    ) -> CommitId {
        let commit = Commit {
            id: [0u8; 32], // Will be computed
            prev_commit: self.last_hash,
            seq: self.next_seq,
            timestamp,
            commit_type,
            caused_by,
        };
        let id = Self::compute_hash(&commit);
        let commit = Commit { id, ..commit };

        self.last_hash = id;
        self.next_seq += 1;
        self.commits.push_back(commit);
        if self.commits.len() > MAX_COMMITLOG_ENTRIES {
            self.commits.pop_front();
        }
        id
    }

    /// Compute hash for a commit (FNV-1a, expanded to 32 bytes).
    fn compute_hash(commit: &Commit) -> CommitId {
        let mut h = StateHasher::new();

        for byte in commit.prev_commit {
            h.write_u8(byte);
        }
        h.write_u64(commit.seq);
        h.write_u64(commit.timestamp);
        h.write_u8(commit.commit_type.tag());

        match &commit.commit_type {
            CommitType::Genesis => {}
            CommitType::ProcessCreated {
                pid,
                parent,
                priority,
                cursor,
                script_len,
            } => {
                h.write_u64(*pid);
                h.write_u64(*parent);
                h.write_u32(*priority as u32);
                h.write_u64(*cursor);
                h.write_u64(*script_len);
            }
            CommitType::ProcessStepped { pid, cursor } => {
                h.write_u64(*pid);
                h.write_u64(*cursor);
            }
            CommitType::ProcessExited { pid } | CommitType::ProcessDropped { pid } => {
                h.write_u64(*pid);
            }
        }

        h.finalize()
    }

    /// Retained commits, oldest first.
    pub fn commits(&self) -> &VecDeque<Commit> {
        &self.commits
    }

    /// Get the head commit ID (hash of the most recent commit).
    pub fn head(&self) -> CommitId {
        self.last_hash
    }

    /// Get the current sequence number (of the last commit).
    pub fn current_seq(&self) -> u64 {
        self.next_seq.saturating_sub(1)
    }

    /// Whether the genesis commit is still held in memory.
    ///
    /// Replay from genesis is only possible while this is true.
    pub fn is_complete(&self) -> bool {
        self.commits
            .front()
            .map(|c| c.commit_type == CommitType::Genesis)
            .unwrap_or(false)
    }

    /// Get the number of commits.
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Check if the log is empty (should never be - always has genesis).
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Verify hash chain integrity.
    ///
    /// After trimming, the chain is checked from the oldest retained commit.
    pub fn verify_integrity(&self) -> bool {
        let mut expected_prev = match self.commits.front() {
            Some(first) if first.seq == 0 => [0u8; 32],
            Some(first) => first.prev_commit,
            None => return true,
        };

        for commit in &self.commits {
            if commit.prev_commit != expected_prev {
                return false;
            }
            if Self::compute_hash(commit) != commit.id {
                return false;
            }
            expected_prev = commit.id;
        }

        expected_prev == self.last_hash
    }
}

impl Default for CommitLog {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_commitlog_creation() {
        let log = CommitLog::new(0);
        assert_eq!(log.len(), 1); // Genesis
        assert_eq!(log.current_seq(), 0);
        assert!(log.is_complete());
        assert!(matches!(log.commits()[0].commit_type, CommitType::Genesis));
    }

    #[test]
    fn test_commitlog_append() {
        let mut log = CommitLog::new(0);

        let id1 = log.append(created(1), None, 1000);
        assert_eq!(log.len(), 2);
        assert_eq!(log.current_seq(), 1);
        assert_ne!(id1, [0u8; 32]);

        let id2 = log.append(CommitType::ProcessStepped { pid: 1, cursor: 1 }, Some(0), 2000);
        assert_eq!(log.len(), 3);
        assert_eq!(log.current_seq(), 2);
        assert_ne!(id2, id1);
        assert_eq!(log.head(), id2);
    }

    #[test]
    fn test_commitlog_integrity() {
        let mut log = CommitLog::new(0);

        for i in 1..=10 {
            log.append(created(i), None, i * 1000);
            log.append(CommitType::ProcessDropped { pid: i }, None, i * 1000);
        }

        assert!(log.verify_integrity());
    }

    #[test]
    fn test_commitlog_tamper_detected() {
        let mut log = CommitLog::new(0);
        log.append(created(1), None, 10);
        log.append(CommitType::ProcessExited { pid: 1 }, None, 20);

        log.commits[1].commit_type = created(2);
        assert!(!log.verify_integrity());
    }

    #[test]
    fn test_commitlog_integrity_after_trim() {
        let mut log = CommitLog::new(0);

        for i in 0..(MAX_COMMITLOG_ENTRIES as u64 + 3) {
            log.append(CommitType::ProcessStepped { pid: 1, cursor: i }, None, i);
        }

        assert_eq!(log.len(), MAX_COMMITLOG_ENTRIES);
        assert!(!log.is_complete());
        assert!(log.verify_integrity());
    }

    #[test]
    fn test_commitlog_window_slides_one_at_a_time() {
        let mut log = CommitLog::new(0);
        let extra = 2 * MAX_COMMITLOG_ENTRIES as u64;

        for i in 0..extra {
            log.append(CommitType::ProcessStepped { pid: 1, cursor: i }, None, i);
            assert!(log.len() <= MAX_COMMITLOG_ENTRIES);
        }

        // Window is exactly the newest MAX entries, contiguous by seq
        let front = log.commits().front().map(|c| c.seq);
        let back = log.commits().back().map(|c| c.seq);
        assert_eq!(back, Some(extra));
        assert_eq!(front, Some(extra - MAX_COMMITLOG_ENTRIES as u64 + 1));
        assert!(log
            .commits()
            .iter()
            .zip(log.commits().iter().skip(1))
            .all(|(a, b)| b.seq == a.seq + 1 && b.prev_commit == a.id));
        assert_eq!(log.head(), log.commits()[MAX_COMMITLOG_ENTRIES - 1].id);
    }

    #[test]
    fn test_commitlog_hash_determinism() {
        // Same commits should produce same hashes
        let mut log1 = CommitLog::new(1000);
        let mut log2 = CommitLog::new(1000);

        let commits = [
            created(1),
            CommitType::ProcessStepped { pid: 1, cursor: 1 },
            CommitType::ProcessCreated {
                pid: 2,
                parent: 1,
                priority: -3,
                cursor: 1,
                script_len: 2,
            },
        ];

        for (i, ct) in commits.into_iter().enumerate() {
            let id1 = log1.append(ct.clone(), None, (i + 1) as u64 * 1000);
            let id2 = log2.append(ct, None, (i + 1) as u64 * 1000);
            assert_eq!(id1, id2);
        }

        assert_eq!(log1.head(), log2.head());
    }

    #[test]
    fn test_commit_json_shape() {
        let json = serde_json::to_string(&CommitType::ProcessExited { pid: 4 }).unwrap();
        assert_eq!(json, r#"{"ProcessExited":{"pid":4}}"#);
    }
}
