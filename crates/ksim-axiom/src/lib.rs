//! ksim Axiom Layer
//!
//! The Axiom layer provides:
//! - **SysLog**: Audit trail of every process step (request + response)
//! - **CommitLog**: Hash-chained runnable-set mutations for replay
//! - **AxiomGateway**: Entry point every step flows through
//!
//! # Core Guarantee
//!
//! > Same CommitLog always produces same state.

#![no_std]
extern crate alloc;

pub mod commitlog;
pub mod gateway;
pub mod replay;
pub mod syslog;
pub mod types;

// Re-export main types
pub use commitlog::{Commit, CommitLog, CommitType};
pub use gateway::{AxiomGateway, GatewayState};
pub use replay::{
    apply_commit, replay, replay_and_verify, ReplayError, ReplayResult, Replayable, StateHasher,
};
pub use syslog::{SysEvent, SysEventType, SysLog};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axiom_gateway_creation() {
        let gateway = AxiomGateway::new(0);
        assert_eq!(gateway.syslog().len(), 0);
        assert_eq!(gateway.commitlog().len(), 1); // Genesis commit
    }

    #[test]
    fn test_step_is_audited_and_committed() {
        let mut gateway = AxiomGateway::new(0);

        let cursor = 0;
        let result = gateway.syscall(1, 1, cursor, 1000, || {
            Ok(CommitType::ProcessStepped {
                pid: 1,
                cursor: cursor + 1,
            })
        });

        assert!(result.is_ok());
        assert_eq!(gateway.syslog().len(), 2); // Request + Response
        let last = &gateway.commitlog().commits()[1];
        assert_eq!(last.commit_type, CommitType::ProcessStepped { pid: 1, cursor: 1 });
        assert_eq!(last.caused_by, Some(0));
    }

    #[test]
    fn test_syslog_event_ids_are_monotonic() {
        let mut gateway = AxiomGateway::new(0);

        for cursor in 0..5u64 {
            let _ = gateway.syscall(1, 1, cursor, cursor * 1000, || Err(-3));
        }

        let events = gateway.syslog().events();
        assert_eq!(events.len(), 10);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.id, i as u64);
        }
    }
}
