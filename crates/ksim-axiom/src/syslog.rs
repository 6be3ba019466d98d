//! System Event Log (SysLog)
//!
//! One request and one response per process step. SysLog is the audit
//! trail of what each process asked the kernel to do; CommitLog holds what
//! that did to the runnable set.

use alloc::collections::VecDeque;
use serde::{Deserialize, Serialize};

use crate::types::{EventId, ProcessId};

/// Cap on retained events; older ones are discarded first.
const MAX_SYSLOG_EVENTS: usize = 10000;

/// One audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysEvent {
    /// Monotonic, never reused even after trimming
    pub id: EventId,
    /// Stepped process
    pub sender: ProcessId,
    /// Nanos since boot
    pub timestamp: u64,
    pub event_type: SysEventType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SysEventType {
    /// A process is about to execute the syscall at `cursor`
    Request { syscall_num: u32, cursor: u64 },
    /// Outcome of `request_id`: 0, or a negative kernel error code
    Response { request_id: EventId, result: i64 },
}

impl SysEventType {
    /// Whether this is a response carrying an error code
    pub fn is_failure(&self) -> bool {
        matches!(self, SysEventType::Response { result, .. } if *result < 0)
    }
}

/// Append-only step audit log.
///
/// Once the cap is reached every new event pushes exactly one old event
/// out of the front.
#[derive(Default)]
pub struct SysLog {
    events: VecDeque<SysEvent>,
    next_id: EventId,
}

impl SysLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `sender` is executing `syscall_num` at `cursor`.
    ///
    /// Returns the ID the matching response must refer to.
    pub fn log_request(
        &mut self,
        sender: ProcessId,
        syscall_num: u32,
        cursor: u64,
        timestamp: u64,
    ) -> EventId {
        self.record(
            sender,
            timestamp,
            SysEventType::Request {
                syscall_num,
                cursor,
            },
        )
    }

    /// Record the outcome of request `request_id`.
    pub fn log_response(
        &mut self,
        sender: ProcessId,
        request_id: EventId,
        result: i64,
        timestamp: u64,
    ) -> EventId {
        self.record(
            sender,
            timestamp,
            SysEventType::Response { request_id, result },
        )
    }

    fn record(&mut self, sender: ProcessId, timestamp: u64, event_type: SysEventType) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        self.events.push_back(SysEvent {
            id,
            sender,
            timestamp,
            event_type,
        });
        if self.events.len() > MAX_SYSLOG_EVENTS {
            self.events.pop_front();
        }
        id
    }

    /// Retained events, oldest first
    pub fn events(&self) -> &VecDeque<SysEvent> {
        &self.events
    }

    /// Number of steps that failed
    pub fn error_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type.is_failure())
            .count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// ID the next event will get
    pub fn next_id(&self) -> EventId {
        self.next_id
    }
}
