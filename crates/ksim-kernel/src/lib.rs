//! ksim Kernel
//!
//! Runtime wrapper around the pure `ksim-kernel-core` state machine:
//! - Init-once lifecycle and ownership of the scheduling policy
//! - HAL integration (console output, clock, entropy, debug channel)
//! - Audit trail: every step flows through the Axiom gateway
//! - The run loop (`run`) and deterministic replay (`ReplayState`)

#![no_std]
extern crate alloc;

mod replay;
mod run;

use alloc::boxed::Box;
use alloc::format;
use alloc::vec::Vec;
use ksim_hal::HAL;
use log::{debug, trace, warn};

use ksim_kernel_core::step as core_step;
use ksim_kernel_core::{check_all_invariants, KernelState};

// Re-export HAL types
pub use ksim_hal::{HalError, HAL as HalTrait};

// Re-export core types
pub use ksim_kernel_core::{
    KernelError, PolicyConfig, PolicyKind, PriorityPolicy, Process, ProcessId, ProcessSpec,
    RandomPolicy, SchedulingPolicy, SequentialPolicy, Syscall, SyscallKind,
};

// Re-export Axiom types
pub use ksim_axiom::{
    replay_and_verify, AxiomGateway, Commit, CommitId, CommitLog, CommitType, GatewayState,
    ReplayError, Replayable, SysEvent, SysEventType, SysLog,
};

pub use replay::{ProcessRecord, ReplayState};
pub use run::{run, RunConfig, RunSummary};

/// Request number logged when a process is stepped past the end of its
/// script, where there is no syscall to name.
pub const SYS_NONE: u32 = u32::MAX;

/// Runnable set plus the policy that schedules it; exists once `init` ran.
struct Running {
    state: KernelState,
    policy: Box<dyn SchedulingPolicy>,
}

/// The kernel, generic over HAL implementation.
///
/// All runnable-set mutations go through the methods below, which record
/// them in the Axiom gateway. A kernel is initialized exactly once and runs
/// one workload; create a new kernel for another run.
pub struct Kernel<H: HAL> {
    hal: H,
    /// `None` until `init`
    running: Option<Running>,
    /// Axiom gateway (SysLog + CommitLog)
    axiom: AxiomGateway,
    /// Boot time (for uptime calculation)
    boot_time: u64,
    /// Processes reaped since init
    dropped: u64,
}

impl<H: HAL> Kernel<H> {
    /// Create a new, uninitialized kernel with the given HAL
    pub fn new(hal: H) -> Self {
        let boot_time = hal.now_nanos();
        Self {
            hal,
            running: None,
            axiom: AxiomGateway::new(boot_time),
            boot_time,
            dropped: 0,
        }
    }

    /// Get the HAL
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Get uptime in nanoseconds
    pub fn uptime_nanos(&self) -> u64 {
        self.hal.now_nanos().saturating_sub(self.boot_time)
    }

    /// Get the SysLog (step audit trail)
    pub fn syslog(&self) -> &SysLog {
        self.axiom.syslog()
    }

    /// Get the CommitLog (runnable-set mutations for replay)
    pub fn commitlog(&self) -> &CommitLog {
        self.axiom.commitlog()
    }

    /// Summary of both audit logs
    pub fn audit_summary(&self) -> GatewayState {
        self.axiom.state_summary()
    }

    fn running(&self) -> Result<&Running, KernelError> {
        self.running.as_ref().ok_or(KernelError::NotInitialized)
    }

    fn running_mut(&mut self) -> Result<&mut Running, KernelError> {
        self.running.as_mut().ok_or(KernelError::NotInitialized)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Install `policy` and admit `initial` in order (PIDs 1..=n).
    ///
    /// Processes with an empty script are exhausted from the start and are
    /// dropped immediately. Fails with `AlreadyInitialized` on a second call.
    pub fn init(
        &mut self,
        policy: Box<dyn SchedulingPolicy>,
        initial: Vec<ProcessSpec>,
    ) -> Result<(), KernelError> {
        if self.running.is_some() {
            return Err(KernelError::AlreadyInitialized);
        }

        let policy_name = policy.name();
        let total = initial.len();
        self.running = Some(Running {
            state: KernelState::new(),
            policy,
        });

        for spec in initial {
            let pid = self.spawn(Process::from(spec))?;
            self.reap(pid)?;
        }

        self.hal.debug_write(&format!(
            "ksim: kernel initialized, {} runnable of {} processes, policy {}",
            self.count(),
            total,
            policy_name
        ));
        debug!(
            "init: {} processes admitted under {} policy",
            self.count(),
            policy_name
        );
        Ok(())
    }

    /// `init` with a policy built from `config`.
    ///
    /// An unseeded random policy draws its seed from the HAL entropy source,
    /// falling back to the clock when the platform has none.
    pub fn init_with_config(
        &mut self,
        config: PolicyConfig,
        initial: Vec<ProcessSpec>,
    ) -> Result<(), KernelError> {
        let fallback_seed = match (config.kind, config.seed) {
            (PolicyKind::Random, None) => self.hal.random_u64().unwrap_or_else(|e| {
                warn!("entropy unavailable ({}), seeding from the clock", e);
                self.hal.now_nanos()
            }),
            _ => 0,
        };
        self.init(config.build(fallback_seed), initial)
    }

    /// Whether `init` has run
    pub fn is_initialized(&self) -> bool {
        self.running.is_some()
    }

    // ========================================================================
    // Read-only accessors
    // ========================================================================

    /// Size of the runnable set (0 before `init`)
    pub fn count(&self) -> usize {
        self.running.as_ref().map_or(0, |r| r.state.count())
    }

    /// A runnable process
    pub fn process(&self, pid: ProcessId) -> Option<&Process> {
        self.running.as_ref()?.state.get_process(pid)
    }

    /// Runnable PIDs in insertion order
    pub fn runnable(&self) -> Vec<ProcessId> {
        self.running
            .as_ref()
            .map(|r| r.state.runnable_ids())
            .unwrap_or_default()
    }

    /// Name of the installed policy
    pub fn policy_name(&self) -> Option<&'static str> {
        self.running.as_ref().map(|r| r.policy.name())
    }

    /// Processes dropped for running off the end of their script since init
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Deterministic hash of the runnable set, comparable with
    /// [`ReplayState`]'s hash of the same commits.
    pub fn state_hash(&self) -> [u8; 32] {
        match &self.running {
            Some(r) => replay::hash_processes(r.state.processes.values()),
            None => replay::hash_processes(core::iter::empty()),
        }
    }

    /// Fail with `InvariantViolated` on the first broken kernel invariant.
    pub fn check_invariants(&self) -> Result<(), KernelError> {
        let running = self.running()?;
        match check_all_invariants(&running.state).into_iter().next() {
            Some(v) => {
                warn!("invariant {} violated: {}", v.invariant, v.description);
                Err(KernelError::InvariantViolated(v.invariant))
            }
            None => Ok(()),
        }
    }

    /// Replay the commit log from genesis and compare with the live state.
    pub fn verify_replay(&self) -> Result<(), ReplayError> {
        let log = self.commitlog();
        if !log.is_complete() {
            return Err(ReplayError::InvalidCommit(format!(
                "commit log trimmed, oldest retained seq {}",
                log.commits().front().map_or(0, |c| c.seq)
            )));
        }
        replay_and_verify(&mut ReplayState::new(), log.commits(), self.state_hash())
    }

    // ========================================================================
    // Kernel operations - mutations route through AxiomGateway
    // ========================================================================

    /// Ask the policy for the next process to run.
    ///
    /// Never mutates the runnable set. Fails with `NoRunnableProcess` when it
    /// is empty, `NotReaped` when a process was stepped off the end of its
    /// script and never passed to [`Kernel::reap`], and `PolicyViolation`
    /// when the policy misbehaves.
    pub fn schedule(&mut self) -> Result<ProcessId, KernelError> {
        let running = self.running_mut()?;
        let result = core_step::schedule(&running.state, running.policy.as_mut());
        if let Err(KernelError::PolicyViolation(pid)) = result {
            warn!(
                "{} policy selected {} outside the runnable set",
                running.policy.name(),
                pid
            );
        }
        result
    }

    /// Execute one syscall of `pid` and return it, advancing its cursor.
    ///
    /// The step is logged to SysLog as a request (syscall number and the
    /// cursor before the step) and a response (0 or a negative error code).
    pub fn step(&mut self, pid: ProcessId) -> Result<Syscall, KernelError> {
        let timestamp = self.uptime_nanos();
        let running = self.running.as_mut().ok_or(KernelError::NotInitialized)?;
        let process = running
            .state
            .get_process(pid)
            .ok_or(KernelError::ProcessNotFound(pid))?;
        let cursor = process.cursor() as u64;
        let syscall_num = process.peek().map_or(SYS_NONE, |call| call.kind().number());

        let state = &mut running.state;
        let mut outcome = Err(KernelError::ProcessNotFound(pid));
        let _ = self
            .axiom
            .syscall(pid.0, syscall_num, cursor, timestamp, || {
                outcome = core_step::step(state, pid);
                match &outcome {
                    Ok(_) => Ok(CommitType::ProcessStepped {
                        pid: pid.0,
                        cursor: cursor + 1,
                    }),
                    Err(e) => Err(e.code()),
                }
            });

        match &outcome {
            Ok(call) => trace!("{} step {} -> {:?}", pid, cursor, call),
            Err(e) => warn!("step failed: {}", e),
        }
        outcome
    }

    /// Remove `pid` from the runnable set. A second exit is `ProcessNotFound`.
    pub fn exit(&mut self, pid: ProcessId) -> Result<(), KernelError> {
        let timestamp = self.uptime_nanos();
        let running = self.running_mut()?;
        core_step::exit(&mut running.state, pid)?;

        self.axiom
            .append_internal_commit(CommitType::ProcessExited { pid: pid.0 }, timestamp);
        debug!("{} exited, {} runnable", pid, self.count());
        Ok(())
    }

    /// Value copy of a runnable process, for FORK.
    pub fn duplicate(&self, pid: ProcessId) -> Result<Process, KernelError> {
        core_step::duplicate(&self.running()?.state, pid)
    }

    /// Append `process` to the end of the runnable set under a fresh PID.
    pub fn spawn(&mut self, process: Process) -> Result<ProcessId, KernelError> {
        let timestamp = self.uptime_nanos();
        let running = self.running_mut()?;
        let pid = core_step::spawn(&mut running.state, process);

        let commit = running
            .state
            .get_process(pid)
            .map(|p| CommitType::ProcessCreated {
                pid: pid.0,
                parent: p.parent.0,
                priority: p.priority,
                cursor: p.cursor() as u64,
                script_len: p.len() as u64,
            })
            .ok_or(KernelError::ProcessNotFound(pid))?;
        self.axiom.append_internal_commit(commit, timestamp);

        debug!("spawned {}", pid);
        Ok(pid)
    }

    /// Drop `pid` if it ran off the end of its script without EXIT.
    ///
    /// Returns whether it was dropped. Dropping is silent apart from the
    /// `ProcessDropped` commit and a debug log line.
    pub fn reap(&mut self, pid: ProcessId) -> Result<bool, KernelError> {
        let timestamp = self.uptime_nanos();
        let running = self.running_mut()?;
        if !core_step::reap(&mut running.state, pid) {
            return Ok(false);
        }

        self.axiom
            .append_internal_commit(CommitType::ProcessDropped { pid: pid.0 }, timestamp);
        self.dropped += 1;
        debug!("{} exhausted its script without EXIT, dropped", pid);
        Ok(true)
    }

    /// Drive the run loop to completion (see [`run`]).
    pub fn run(&mut self, config: &RunConfig) -> Result<RunSummary, KernelError> {
        run::run(self, config)
    }
}
