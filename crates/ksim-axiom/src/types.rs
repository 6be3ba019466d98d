//! Common types for the Axiom layer.

/// Process identifier (matches ksim-kernel-core's `ProcessId.0`)
pub type ProcessId = u64;

/// Event identifier (monotonic, unique within SysLog)
pub type EventId = u64;

/// Commit identifier (32-byte hash)
pub type CommitId = [u8; 32];

/// Scheduling priority as recorded in commits
pub type Priority = i32;
