//! Axiom gateway
//!
//! Every process step enters the kernel here. The gateway brackets the step
//! with a SysLog request/response pair and appends the commit the step
//! produced, tagged with the request that caused it.
//!
//! Mutations no process asked for (admitting initial processes and fork
//! children, exits, reaping) go straight to the CommitLog through
//! [`AxiomGateway::append_internal_commit`].

use crate::commitlog::{CommitLog, CommitType};
use crate::syslog::SysLog;
use crate::types::{CommitId, ProcessId};

/// Owner of both audit logs.
pub struct AxiomGateway {
    syslog: SysLog,
    commitlog: CommitLog,
}

impl AxiomGateway {
    /// Gateway whose CommitLog starts with a genesis commit at `timestamp`.
    pub fn new(timestamp: u64) -> Self {
        Self {
            syslog: SysLog::new(),
            commitlog: CommitLog::new(timestamp),
        }
    }

    /// Run one process step through the audit trail.
    ///
    /// `kernel_fn` performs the step and returns the resulting commit, or a
    /// negative error code. The code is logged as the response result and
    /// handed back; a failed step commits nothing.
    pub fn syscall<F>(
        &mut self,
        sender: ProcessId,
        syscall_num: u32,
        cursor: u64,
        timestamp: u64,
        kernel_fn: F,
    ) -> Result<CommitId, i64>
    where
        F: FnOnce() -> Result<CommitType, i64>,
    {
        let request_id = self
            .syslog
            .log_request(sender, syscall_num, cursor, timestamp);

        let outcome = kernel_fn()
            .map(|commit| self.commitlog.append(commit, Some(request_id), timestamp));

        let result = match outcome {
            Ok(_) => 0,
            Err(code) => code,
        };
        self.syslog
            .log_response(sender, request_id, result, timestamp);
        outcome
    }

    pub fn syslog(&self) -> &SysLog {
        &self.syslog
    }

    pub fn commitlog(&self) -> &CommitLog {
        &self.commitlog
    }

    /// Commit a mutation that has no SysLog request behind it.
    pub fn append_internal_commit(&mut self, commit_type: CommitType, timestamp: u64) -> CommitId {
        self.commitlog.append(commit_type, None, timestamp)
    }

    pub fn verify_integrity(&self) -> bool {
        self.commitlog.verify_integrity()
    }

    /// Sizes and head of both logs.
    pub fn state_summary(&self) -> GatewayState {
        GatewayState {
            syslog_len: self.syslog.len(),
            syslog_next_id: self.syslog.next_id(),
            commitlog_len: self.commitlog.len(),
            commitlog_seq: self.commitlog.current_seq(),
            commitlog_head: self.commitlog.head(),
        }
    }
}

/// Point-in-time view of the audit logs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatewayState {
    /// Events retained in SysLog
    pub syslog_len: usize,
    pub syslog_next_id: u64,
    /// Commits retained in CommitLog
    pub commitlog_len: usize,
    /// Sequence number of the newest commit
    pub commitlog_seq: u64,
    pub commitlog_head: CommitId,
}
