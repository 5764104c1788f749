//! Pre-tool-use hook surface for the external agent CLI.
//!
//! The engine registers `autodev hook --policy <file>` as the CLI's command
//! interceptor: the CLI pipes one JSON event per tool call to this process
//! and reads the decision back on stdout, before any process is spawned.
//! Everything here fails closed: an event or policy this process cannot
//! read produces a deny, never an allow and never a crash.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::core::gate::SecurityGate;
use crate::core::policy::GatePolicy;

/// Tool name the CLI uses for shell commands.
const SHELL_TOOL: &str = "Bash";

#[derive(Debug, Deserialize)]
struct HookEvent {
    #[serde(default)]
    tool_name: String,
    #[serde(default)]
    tool_input: ToolInput,
}

#[derive(Debug, Default, Deserialize)]
struct ToolInput {
    #[serde(default)]
    command: Option<String>,
}

struct HookDecision {
    allow: bool,
    reason: String,
}

impl HookDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allow: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
        }
    }
}

/// Load a serialized [`GatePolicy`] written by the engine.
pub fn load_policy(path: &Path) -> Result<GatePolicy> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read gate policy {}", path.display()))?;
    let policy: GatePolicy = serde_json::from_str(&contents)
        .with_context(|| format!("parse gate policy {}", path.display()))?;
    policy.validate()?;
    Ok(policy)
}

/// Answer one hook event from `input` with a decision on `output`.
pub fn answer_hook_event(
    gate: &SecurityGate,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<()> {
    let mut raw = String::new();
    input.read_to_string(&mut raw).context("read hook event")?;
    let decision = match serde_json::from_str::<HookEvent>(&raw) {
        Ok(event) => decide(gate, &event),
        Err(err) => HookDecision::deny(format!("unreadable hook event: {err}")),
    };
    write_decision(output, &decision)
}

/// Emit an unconditional deny, for when the gate itself could not be built.
pub fn answer_with_denial(output: &mut dyn Write, reason: &str) -> Result<()> {
    write_decision(output, &HookDecision::deny(reason))
}

fn decide(gate: &SecurityGate, event: &HookEvent) -> HookDecision {
    if event.tool_name != SHELL_TOOL {
        debug!(tool = %event.tool_name, "non-shell tool passes through");
        return HookDecision::allow("not a shell command");
    }
    let Some(command) = event.tool_input.command.as_deref() else {
        return HookDecision::deny("shell event carries no command");
    };
    let verdict = gate.evaluate(command);
    match verdict.reason() {
        None => HookDecision::allow(""),
        Some(reason) => HookDecision::deny(reason),
    }
}

fn write_decision(output: &mut dyn Write, decision: &HookDecision) -> Result<()> {
    let body = json!({
        "hookSpecificOutput": {
            "hookEventName": "PreToolUse",
            "permissionDecision": if decision.allow { "allow" } else { "deny" },
            "permissionDecisionReason": decision.reason,
        }
    });
    let mut line = body.to_string();
    line.push('\n');
    output
        .write_all(line.as_bytes())
        .context("write hook decision")
}
