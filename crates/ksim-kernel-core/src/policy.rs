//! Scheduling policies
//!
//! A policy picks the next process to run from the current runnable set.
//! Policies see the set in insertion order (oldest PID first), never mutate
//! it, and must return one of the references they were given.

use alloc::boxed::Box;
use core::fmt;
use core::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::types::Process;

/// Pluggable process selection strategy.
pub trait SchedulingPolicy {
    /// Short policy name for logs
    fn name(&self) -> &'static str;

    /// Choose a process from `runnable`.
    ///
    /// Returns `None` only for an empty slice; the kernel never calls a
    /// policy with an empty set.
    fn select<'a>(&mut self, runnable: &[&'a Process]) -> Option<&'a Process>;
}

/// FIFO: always the oldest runnable process.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialPolicy;

impl SchedulingPolicy for SequentialPolicy {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn select<'a>(&mut self, runnable: &[&'a Process]) -> Option<&'a Process> {
        runnable.first().copied()
    }
}

/// Highest priority wins; ties go to the oldest process.
///
/// Lower-priority processes starve for as long as a higher-priority one is
/// runnable.
#[derive(Clone, Copy, Debug, Default)]
pub struct PriorityPolicy;

impl SchedulingPolicy for PriorityPolicy {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn select<'a>(&mut self, runnable: &[&'a Process]) -> Option<&'a Process> {
        // Iterator::max_by_key keeps the last maximum, we need the first.
        runnable.iter().copied().fold(None, |best, proc| match best {
            Some(b) if b.priority >= proc.priority => Some(b),
            _ => Some(proc),
        })
    }
}

/// Uniformly random choice from an injected generator.
pub struct RandomPolicy<R: RngCore> {
    rng: R,
}

impl<R: RngCore> RandomPolicy<R> {
    /// Policy drawing from `rng`
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomPolicy<StdRng> {
    /// Reproducible policy: the same seed yields the same choices.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> SchedulingPolicy for RandomPolicy<R> {
    fn name(&self) -> &'static str {
        "random"
    }

    fn select<'a>(&mut self, runnable: &[&'a Process]) -> Option<&'a Process> {
        if runnable.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..runnable.len());
        Some(runnable[idx])
    }
}

// ============================================================================
// Policy configuration
// ============================================================================

/// The built-in policies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Sequential,
    Priority,
    Random,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Sequential => write!(f, "sequential"),
            PolicyKind::Priority => write!(f, "priority"),
            PolicyKind::Random => write!(f, "random"),
        }
    }
}

/// Unknown policy name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownPolicy;

impl fmt::Display for UnknownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown policy (expected sequential, priority or random)")
    }
}

impl FromStr for PolicyKind {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" | "fifo" => Ok(PolicyKind::Sequential),
            "priority" => Ok(PolicyKind::Priority),
            "random" => Ok(PolicyKind::Random),
            _ => Err(UnknownPolicy),
        }
    }
}

/// Policy selection plus optional seed for the random policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Which policy to run
    #[serde(default)]
    pub kind: PolicyKind,
    /// Seed for `Random`; ignored by the deterministic policies
    #[serde(default)]
    pub seed: Option<u64>,
}

impl PolicyConfig {
    /// Config for `kind` without a seed
    pub fn new(kind: PolicyKind) -> Self {
        Self { kind, seed: None }
    }

    /// Build the policy. `fallback_seed` is used when `Random` has no seed.
    pub fn build(&self, fallback_seed: u64) -> Box<dyn SchedulingPolicy> {
        match self.kind {
            PolicyKind::Sequential => Box::new(SequentialPolicy),
            PolicyKind::Priority => Box::new(PriorityPolicy),
            PolicyKind::Random => {
                Box::new(RandomPolicy::seeded(self.seed.unwrap_or(fallback_seed)))
            }
        }
    }
}
