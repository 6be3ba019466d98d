//! Scenario files
//!
//! A scenario is the initial runnable set plus the policy to run it under:
//!
//! ```json
//! {
//!   "policy": { "kind": "random", "seed": 7 },
//!   "max_steps": 10000,
//!   "processes": [
//!     { "script": [{"kind": "write", "arg": "A"}, {"kind": "exit"}], "priority": 1 }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ksim_kernel_core::{PolicyConfig, PolicyKind, ProcessSpec, Syscall};
use serde::{Deserialize, Serialize};

/// Tokens written by the built-in demo
const DEMO_TOKENS: [&str; 3] = ["A", "B", "C"];
/// Writes per demo process
const DEMO_REPEATS: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Step budget; unbounded when absent
    #[serde(default)]
    pub max_steps: Option<u64>,
    /// Initial processes, in admission order
    #[serde(default)]
    pub processes: Vec<ProcessSpec>,
}

impl Scenario {
    /// Read and parse a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("read scenario: {}", path.display()))?;
        Self::from_json(&bytes).with_context(|| format!("parse scenario: {}", path.display()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Three processes writing A, B and C five times each, interleaved by
    /// the random policy.
    pub fn demo() -> Self {
        let processes = DEMO_TOKENS
            .iter()
            .map(|token| {
                let mut script: Vec<Syscall> =
                    (0..DEMO_REPEATS).map(|_| Syscall::write(*token)).collect();
                script.push(Syscall::exit());
                ProcessSpec::new(script)
            })
            .collect();

        Self {
            policy: PolicyConfig::new(PolicyKind::Random),
            max_steps: None,
            processes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_scenario() {
        let json = br#"{
            "policy": { "kind": "priority" },
            "max_steps": 50,
            "processes": [
                { "script": [{"kind": "write", "arg": "A"}, {"kind": "exit"}], "priority": 1 },
                { "script": [{"kind": "write_double", "arg": "B"}, {"kind": "fork"}] }
            ]
        }"#;

        let scenario = Scenario::from_json(json).unwrap();
        assert_eq!(scenario.policy.kind, PolicyKind::Priority);
        assert_eq!(scenario.policy.seed, None);
        assert_eq!(scenario.max_steps, Some(50));
        assert_eq!(scenario.processes.len(), 2);
        assert_eq!(scenario.processes[0].priority, 1);
        assert_eq!(scenario.processes[1].priority, 0);
        assert_eq!(
            scenario.processes[1].script,
            vec![Syscall::write_double("B"), Syscall::fork()]
        );
    }

    #[test]
    fn test_defaults() {
        let scenario = Scenario::from_json(b"{}").unwrap();
        assert_eq!(scenario, Scenario::default());
        assert_eq!(scenario.policy.kind, PolicyKind::Sequential);
    }

    #[test]
    fn test_write_without_arg_rejected() {
        let json = br#"{ "processes": [ { "script": [{"kind": "write"}] } ] }"#;
        assert!(Scenario::from_json(json).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Scenario::from_json(br#"{ "polcy": {} }"#).is_err());
    }

    #[test]
    fn test_demo_shape() {
        let demo = Scenario::demo();
        assert_eq!(demo.policy.kind, PolicyKind::Random);
        assert_eq!(demo.processes.len(), 3);
        for spec in &demo.processes {
            assert_eq!(spec.script.len(), DEMO_REPEATS + 1);
            assert_eq!(spec.script.last(), Some(&Syscall::exit()));
        }
    }
}
