//! Per-command semantic checks layered on allowlist membership.
//!
//! Each check encodes one narrow safety property. `Err` carries the denial
//! reason; there is no panic or error path that could read as an allow, so an
//! input a check cannot confidently classify is denied.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::command::SubCommand;
use crate::core::policy::ValidatorKind;

/// Processes `pkill` may target. Anything else, including bare PIDs and
/// wildcard patterns, is denied.
const EXPECTED_DEV_PROCESSES: [&str; 10] = [
    "esbuild", "next", "node", "nodemon", "npm", "npx", "python", "python3", "vite", "webpack",
];

/// The one script the agent may execute directly, exactly as written.
const SETUP_SCRIPT: &str = "./init.sh";

/// Symbolic modes that only add execute permission (`+x`, `u+x`, `ug+x`, ...).
static EXEC_ONLY_MODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ugoa]*\+x$").expect("mode pattern should be valid"));

/// Run the check bound to `kind` against one extracted sub-command.
pub fn check(kind: ValidatorKind, command: &SubCommand) -> Result<(), String> {
    match kind {
        ValidatorKind::KillSignal => check_kill_signal(command),
        ValidatorKind::FileMode => check_file_mode(command),
        ValidatorKind::ScriptPath => check_script_path(command),
    }
}

/// `pkill` only ever targets the fixed dev-process names; signal flags are
/// fine, but an invocation with no named target (or a target outside the set)
/// could reach arbitrary processes.
fn check_kill_signal(command: &SubCommand) -> Result<(), String> {
    let targets: Vec<&String> = command
        .args
        .iter()
        .filter(|arg| !arg.starts_with('-'))
        .collect();
    if targets.is_empty() {
        return Err("no process name given; refusing signals without a named target".to_string());
    }
    for target in targets {
        if !EXPECTED_DEV_PROCESSES.contains(&target.as_str()) {
            return Err(format!("'{target}' is not an expected dev process"));
        }
    }
    Ok(())
}

/// `chmod` is only for making scripts executable: the mode must be exactly an
/// execute-add form, with no flags (no `-R`) and at least one target file.
fn check_file_mode(command: &SubCommand) -> Result<(), String> {
    if let Some(flag) = command.args.iter().find(|arg| arg.starts_with('-')) {
        return Err(format!("flag '{flag}' is not permitted"));
    }
    let Some(mode) = command.args.first() else {
        return Err("no mode given".to_string());
    };
    if !EXEC_ONLY_MODE.is_match(mode) {
        return Err(format!(
            "mode '{mode}' changes more than execute permission"
        ));
    }
    if command.args.len() == 1 {
        return Err("no target file given".to_string());
    }
    Ok(())
}

/// Direct script execution is limited to the setup script at its fixed
/// relative path: no absolute paths, no `..`, no other script names.
fn check_script_path(command: &SubCommand) -> Result<(), String> {
    if command.program != SETUP_SCRIPT {
        return Err(format!(
            "only '{SETUP_SCRIPT}' may be run directly, not '{}'",
            command.program
        ));
    }
    Ok(())
}
