//! Session engine abstraction over the external agent CLI.
//!
//! The [`SessionEngine`] trait decouples the loop from the actual agent
//! backend (currently `claude -p`). Tests use scripted engines that replay
//! predetermined sessions without spawning processes.
//!
//! The gate travels with every request: [`ClaudeEngine`] serializes the
//! gate's policy next to the project and registers this binary's `hook`
//! subcommand as the CLI's pre-tool-use interceptor, so the out-of-process
//! hook enforces exactly the policy the loop was configured with, before any
//! command is spawned.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::core::gate::SecurityGate;
use crate::core::policy::GatePolicy;
use crate::io::CONTROL_DIR;
use crate::io::process::{CommandOutput, run_command_with_timeout};

/// Parameters for one agent session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Project directory the session works in.
    pub workdir: PathBuf,
    /// Task prompt fed to the agent.
    pub prompt: String,
    /// Model identifier for the agent CLI.
    pub model: String,
    /// Hard cap on tool invocations within the session.
    pub max_turns: u32,
    /// Wall-clock budget for the whole session.
    pub timeout: Duration,
    /// Truncate captured session output beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Where to write the session's stdout/stderr log.
    pub session_log_path: PathBuf,
}

/// What one session reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRunResult {
    /// True when the session ran to completion; false is unrecoverable and
    /// stops the loop.
    pub completed_normally: bool,
    pub error: Option<String>,
}

impl SessionRunResult {
    pub fn ok() -> Self {
        Self {
            completed_normally: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            completed_normally: false,
            error: Some(error.into()),
        }
    }
}

/// Abstraction over agent session backends.
pub trait SessionEngine {
    /// Run one agent session with the gate registered as the pre-command
    /// interceptor for every shell command the session attempts.
    fn run_session(
        &self,
        request: &SessionRequest,
        gate: &SecurityGate,
    ) -> Result<SessionRunResult>;
}

/// Engine that spawns the `claude` CLI.
pub struct ClaudeEngine;

impl SessionEngine for ClaudeEngine {
    #[instrument(skip_all, fields(model = %request.model, timeout_secs = request.timeout.as_secs()))]
    fn run_session(
        &self,
        request: &SessionRequest,
        gate: &SecurityGate,
    ) -> Result<SessionRunResult> {
        info!(workdir = %request.workdir.display(), "starting agent session");

        let settings_path = install_gate_hook(&request.workdir, gate.policy())
            .context("install command interception hook")?;

        let mut cmd = Command::new("claude");
        cmd.arg("-p")
            .arg("--model")
            .arg(&request.model)
            .arg("--max-turns")
            .arg(request.max_turns.to_string())
            .arg("--settings")
            .arg(&settings_path)
            .current_dir(&request.workdir);

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .context("run claude session")?;

        write_session_log(&request.session_log_path, &output)?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "session timed out");
            return Ok(SessionRunResult::failed(format!(
                "session timed out after {}s",
                request.timeout.as_secs()
            )));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "session exited with failure");
            return Ok(SessionRunResult::failed(format!(
                "agent CLI exited with status {:?}: {}",
                output.status.code(),
                output.stderr_tail(400)
            )));
        }

        debug!("session completed normally");
        Ok(SessionRunResult::ok())
    }
}

/// Write the gate policy and a settings file registering `autodev hook` as
/// the CLI's `PreToolUse` interceptor for shell commands. Returns the
/// settings path to pass to the CLI.
fn install_gate_hook(workdir: &Path, policy: &GatePolicy) -> Result<PathBuf> {
    let control_dir = workdir.join(CONTROL_DIR);
    fs::create_dir_all(&control_dir)
        .with_context(|| format!("create control dir {}", control_dir.display()))?;

    let policy_path = control_dir.join("policy.json");
    let mut policy_json = serde_json::to_string_pretty(policy)?;
    policy_json.push('\n');
    fs::write(&policy_path, policy_json)
        .with_context(|| format!("write gate policy {}", policy_path.display()))?;

    let hook_command = hook_command_line(&policy_path)?;
    let settings = json!({
        "hooks": {
            "PreToolUse": [{
                "matcher": "Bash",
                "hooks": [{ "type": "command", "command": hook_command }]
            }]
        }
    });
    let settings_path = control_dir.join("settings.json");
    let mut settings_json = serde_json::to_string_pretty(&settings)?;
    settings_json.push('\n');
    fs::write(&settings_path, settings_json)
        .with_context(|| format!("write hook settings {}", settings_path.display()))?;
    Ok(settings_path)
}

/// Shell command line the CLI runs for each interception, pointing back at
/// this binary's `hook` subcommand with the serialized policy.
fn hook_command_line(policy_path: &Path) -> Result<String> {
    let exe = std::env::current_exe().context("locate harness executable")?;
    let quoted_exe = shlex::try_quote(&exe.to_string_lossy())
        .map_err(|_| anyhow!("harness executable path contains a NUL byte"))?
        .into_owned();
    let quoted_policy = shlex::try_quote(&policy_path.to_string_lossy())
        .map_err(|_| anyhow!("policy path contains a NUL byte"))?
        .into_owned();
    Ok(format!("{quoted_exe} hook --policy {quoted_policy}"))
}

fn write_session_log(path: &Path, output: &CommandOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create session log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    if output.truncated_bytes > 0 {
        buf.push_str(&format!(
            "\n[session output truncated {} bytes]\n",
            output.truncated_bytes
        ));
    }
    if output.timed_out {
        buf.push_str("\n[session timed out]\n");
    }
    fs::write(path, buf).with_context(|| format!("write session log {}", path.display()))
}
