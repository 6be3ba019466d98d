//! ksim runner
//!
//! Loads a scenario (or the built-in demo), runs it on the host console and
//! prints the output stream followed by a newline. Diagnostics go to stderr.

mod config;
mod hal;
mod logger;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use ksim_hal::HAL;
use ksim_kernel::{Kernel, PolicyKind, RunConfig, RunSummary};
use log::{info, LevelFilter};

use crate::config::Scenario;
use crate::hal::StdHal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Sequential,
    Priority,
    Random,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Sequential => PolicyKind::Sequential,
            PolicyArg::Priority => PolicyKind::Priority,
            PolicyArg::Random => PolicyKind::Random,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ksim-runner")]
#[command(about = "Run a process scenario on the ksim kernel.", long_about = None)]
struct Cli {
    /// Scenario JSON file; runs the built-in demo when omitted
    #[arg(value_name = "SCENARIO")]
    scenario: Option<PathBuf>,

    /// Override the scenario's scheduling policy
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Seed for the random policy
    #[arg(long)]
    seed: Option<u64>,

    /// Stop with an error after this many steps
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,

    /// Check kernel invariants after every step
    #[arg(long)]
    check_invariants: bool,

    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: LevelFilter,

    /// Print the audit log summary and verify replay after the run
    #[arg(long)]
    audit: bool,
}

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The logger may not be installed yet, so report on stderr directly
            eprintln!("{}", failure_message(&e));
            ExitCode::FAILURE
        }
    }
}

fn failure_message(e: &anyhow::Error) -> String {
    format!("ksim-runner: {:#}", e)
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.log_level).context("install logger")?;

    let mut scenario = match &cli.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::demo(),
    };
    apply_overrides(&mut scenario, &cli);
    info!(
        "{} processes, policy {}",
        scenario.processes.len(),
        scenario.policy.kind
    );

    let mut kernel = Kernel::new(StdHal::new());
    kernel
        .init_with_config(scenario.policy, scenario.processes)
        .map_err(|e| anyhow!("{}", e))
        .context("init kernel")?;

    let mut config = RunConfig::new();
    config.max_steps = scenario.max_steps;
    config.check_invariants = cli.check_invariants;

    let outcome = kernel.run(&config);

    // Output stays on stdout even when the run failed part way
    kernel.hal().console_write("\n");
    kernel
        .hal()
        .console_flush()
        .map_err(|e| anyhow!("{}", e))
        .context("flush console")?;

    let summary = outcome.map_err(|e| anyhow!("{}", e)).context("run")?;

    if cli.audit {
        print_audit(&kernel, &summary)?;
    }
    Ok(())
}

fn apply_overrides(scenario: &mut Scenario, cli: &Cli) {
    if let Some(policy) = cli.policy {
        scenario.policy.kind = policy.into();
    }
    if cli.seed.is_some() {
        scenario.policy.seed = cli.seed;
    }
    if cli.max_steps.is_some() {
        scenario.max_steps = cli.max_steps;
    }
}

fn print_audit<H: HAL>(kernel: &Kernel<H>, summary: &RunSummary) -> Result<()> {
    let audit = kernel.audit_summary();

    eprintln!(
        "run: {} steps, {} tokens, {} forks, {} exits, {} dropped, peak {} runnable",
        summary.steps,
        summary.emitted,
        summary.forks,
        summary.exits,
        summary.dropped,
        summary.peak_runnable
    );
    eprintln!(
        "syslog: {} events ({} failed)",
        audit.syslog_len,
        kernel.syslog().error_count()
    );
    eprintln!(
        "commitlog: {} commits, seq {}, head {}",
        audit.commitlog_len,
        audit.commitlog_seq,
        hex_prefix(&audit.commitlog_head)
    );

    if !kernel.commitlog().verify_integrity() {
        return Err(anyhow!("commit chain broken"));
    }
    kernel
        .verify_replay()
        .map_err(|e| anyhow!("{}", e))
        .context("verify replay")?;
    eprintln!("replay: ok");
    Ok(())
}

fn hex_prefix(id: &[u8; 32]) -> String {
    id[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksim_hal_mock::MockHal;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_defaults() {
        let cli = cli(&["ksim-runner"]);
        assert!(cli.scenario.is_none());
        assert_eq!(cli.log_level, LevelFilter::Warn);
        assert!(!cli.audit);
    }

    #[test]
    fn test_overrides_win() {
        let cli = cli(&[
            "ksim-runner",
            "demo.json",
            "--policy",
            "priority",
            "--seed",
            "3",
            "--max-steps",
            "10",
        ]);
        let mut scenario = Scenario::demo();
        apply_overrides(&mut scenario, &cli);

        assert_eq!(scenario.policy.kind, PolicyKind::Priority);
        assert_eq!(scenario.policy.seed, Some(3));
        assert_eq!(scenario.max_steps, Some(10));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(Cli::try_parse_from(["ksim-runner", "--policy", "lottery"]).is_err());
    }

    #[test]
    fn test_demo_output() {
        let mut scenario = Scenario::demo();
        scenario.policy.seed = Some(11);

        let mut kernel = Kernel::new(MockHal::new());
        kernel
            .init_with_config(scenario.policy, scenario.processes)
            .unwrap();
        let summary = kernel.run(&RunConfig::new()).unwrap();
        let out = kernel.hal().console_output();

        assert_eq!(out.len(), 15);
        for token in ["A", "B", "C"] {
            assert_eq!(out.matches(token).count(), 5);
        }
        assert_eq!(summary.exits, 3);
        assert!(print_audit(&kernel, &summary).is_ok());
    }

    #[test]
    fn test_failure_message_carries_context_once() {
        let err = anyhow!("step limit 3 reached").context("run");
        let msg = failure_message(&err);
        assert_eq!(msg, "ksim-runner: run: step limit 3 reached");
        assert_eq!(msg.matches("step limit").count(), 1);
    }

    #[test]
    fn test_hex_prefix() {
        let mut id = [0u8; 32];
        id[0] = 0xab;
        id[7] = 0x01;
        assert_eq!(hex_prefix(&id), "ab00000000000001");
    }
}
