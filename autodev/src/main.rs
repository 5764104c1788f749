//! Autonomous coding agent harness CLI.
//!
//! `run` drives the session loop against a project directory; `check` and
//! `hook` expose the security gate (interactively and as the agent CLI's
//! interception endpoint); `status` prints cached progress.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use autodev::core::gate::SecurityGate;
use autodev::core::policy::GatePolicy;
use autodev::exit_codes;
use autodev::hook::{answer_hook_event, answer_with_denial, load_policy};
use autodev::io::config::{config_path, load_config, write_config};
use autodev::io::engine::ClaudeEngine;
use autodev::io::git;
use autodev::io::project_state::load_project_state;
use autodev::logging;
use autodev::looping::{LoopConfig, LoopStop, SessionReport, run_loop};

#[derive(Parser)]
#[command(
    name = "autodev",
    version,
    about = "Long-running autonomous coding agent harness"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the autonomous session loop against a project directory.
    Run {
        /// Directory the agent works in (created if missing).
        #[arg(long)]
        project_dir: PathBuf,
        /// Stop after this many sessions (default: unlimited).
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Model for the agent CLI (overrides the config file).
        #[arg(long)]
        model: Option<String>,
        /// Application spec copied into the project before bootstrap.
        #[arg(long)]
        spec: Option<PathBuf>,
    },
    /// Evaluate one command line against the security gate and print the verdict.
    Check {
        /// The shell command line to judge.
        command_line: String,
        /// Serialized gate policy to use instead of the built-in default.
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Answer one pre-tool-use hook event on stdin (registered by the engine).
    Hook {
        /// Serialized gate policy written by the engine.
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Print cached tracker progress and git status for a project.
    Status {
        #[arg(long)]
        project_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(exit_codes::INVALID as u8)
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            project_dir,
            max_iterations,
            model,
            spec,
        } => cmd_run(project_dir, max_iterations, model, spec),
        Command::Check {
            command_line,
            policy,
        } => cmd_check(&command_line, policy.as_deref()),
        Command::Hook { policy } => cmd_hook(policy.as_deref()),
        Command::Status { project_dir } => cmd_status(&project_dir),
    }
}

fn cmd_run(
    project_dir: PathBuf,
    max_iterations: Option<u32>,
    model: Option<String>,
    spec: Option<PathBuf>,
) -> Result<i32> {
    let cfg_path = config_path(&project_dir);
    let config = load_config(&cfg_path)?;
    if !cfg_path.exists() {
        // Leave an editable default config behind for later runs.
        write_config(&cfg_path, &config)?;
    }
    let mut policy = GatePolicy::default();
    policy.allow_extra(config.extra_allowed_commands.clone());
    policy.validate()?;
    let gate = SecurityGate::new(policy);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_latch = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_latch.store(true, Ordering::SeqCst);
        eprintln!("\ninterrupt received; finishing the current session, then stopping");
    })
    .context("set ctrl-c handler")?;

    let loop_config = LoopConfig {
        max_iterations,
        session_delay: Duration::from_secs(config.session_delay_secs),
        model: model.unwrap_or(config.model),
        max_turns: config.max_turns,
        session_timeout: Duration::from_secs(config.session_timeout_secs),
        output_limit_bytes: config.output_limit_bytes,
        spec_path: spec,
    };

    println!("project directory: {}", project_dir.display());
    println!("model: {}", loop_config.model);
    match max_iterations {
        Some(max) => println!("max sessions: {max}"),
        None => println!("max sessions: unlimited"),
    }

    let outcome = run_loop(
        &project_dir,
        &ClaudeEngine,
        &gate,
        &loop_config,
        &stop,
        print_session_report,
    )?;

    println!("\nsessions run: {}", outcome.sessions_run);
    match outcome.stop {
        LoopStop::MaxIterations { iterations } => {
            println!("stopped: session cap ({iterations}) reached; rerun to continue");
            Ok(exit_codes::OK)
        }
        LoopStop::Interrupted => {
            println!("stopped: interrupted; rerun to resume where the agent left off");
            Ok(exit_codes::OK)
        }
        LoopStop::EngineFailure { error } => {
            eprintln!("stopped: session failed: {error}");
            Ok(exit_codes::SESSION_FAILED)
        }
    }
}

fn print_session_report(report: &SessionReport) {
    let verdict = if report.result.completed_normally {
        "completed"
    } else {
        "failed"
    };
    println!(
        "session {} ({}) {}",
        report.iteration,
        report.kind.as_str(),
        verdict
    );
    if report.git.initialized {
        if let Some((hash, subject)) = &report.git.last_commit {
            println!("  last commit: {hash} {subject}");
        }
        if report.git.uncommitted_changes {
            println!("  warning: uncommitted changes left in the working tree");
        }
    } else {
        println!("  warning: project is not a git repository");
    }
}

fn cmd_check(command_line: &str, policy_path: Option<&std::path::Path>) -> Result<i32> {
    let policy = match policy_path {
        Some(path) => load_policy(path)?,
        None => GatePolicy::default(),
    };
    let gate = SecurityGate::new(policy);
    match gate.evaluate(command_line).reason() {
        None => {
            println!("allowed");
            Ok(exit_codes::OK)
        }
        Some(reason) => {
            println!("blocked: {reason}");
            Ok(exit_codes::BLOCKED)
        }
    }
}

/// Hook mode always exits 0; the decision travels in the response JSON, and
/// any failure to build the gate becomes a deny rather than an error.
fn cmd_hook(policy_path: Option<&std::path::Path>) -> Result<i32> {
    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();
    let policy = match policy_path {
        Some(path) => match load_policy(path) {
            Ok(policy) => policy,
            Err(err) => {
                answer_with_denial(&mut stdout, &format!("gate policy unavailable: {err:#}"))?;
                return Ok(exit_codes::OK);
            }
        },
        None => GatePolicy::default(),
    };
    let gate = SecurityGate::new(policy);
    answer_hook_event(&gate, &mut stdin, &mut stdout)?;
    Ok(exit_codes::OK)
}

fn cmd_status(project_dir: &std::path::Path) -> Result<i32> {
    match load_project_state(project_dir)? {
        None => println!("tracker: not yet bootstrapped"),
        Some(state) => {
            println!("tracker: initialized");
            println!("  total issues: {}", state.total_issues);
            println!("  meta issue: {}", state.meta_issue_id);
            println!("  project id: {}", state.project_id);
        }
    }

    let summary = git::summarize(project_dir);
    if summary.initialized {
        println!("git: initialized on branch {}", summary.branch);
        match summary.last_commit {
            Some((hash, subject)) => println!("  last commit: {hash} {subject}"),
            None => println!("  no commits yet"),
        }
        if summary.uncommitted_changes {
            println!("  uncommitted changes present");
        }
    } else {
        println!("git: not initialized");
    }
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_flags() {
        let cli = Cli::parse_from([
            "autodev",
            "run",
            "--project-dir",
            "./demo",
            "--max-iterations",
            "5",
        ]);
        match cli.command {
            Command::Run {
                project_dir,
                max_iterations,
                model,
                spec,
            } => {
                assert_eq!(project_dir, PathBuf::from("./demo"));
                assert_eq!(max_iterations, Some(5));
                assert_eq!(model, None);
                assert_eq!(spec, None);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parse_check_positional() {
        let cli = Cli::parse_from(["autodev", "check", "ls && pwd"]);
        match cli.command {
            Command::Check {
                command_line,
                policy,
            } => {
                assert_eq!(command_line, "ls && pwd");
                assert_eq!(policy, None);
            }
            _ => panic!("expected check command"),
        }
    }
}
