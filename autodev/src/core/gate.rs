//! The pre-execution security gate.
//!
//! Composes the command extractor, the allowlist and the extra validators
//! into a single allow/deny decision per command line. Evaluation is
//! deterministic and spawns nothing; the only side effect is an audit log
//! line per decision.

use tracing::{debug, warn};

use crate::core::command::extract_commands;
use crate::core::policy::GatePolicy;
use crate::core::validators;

/// Decision for one command line.
///
/// The denial categories stay distinct: a caller may want to react to a parse
/// failure (rephrase and retry) differently from a policy denial (don't).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// A sub-command's base name is not in the allowlist.
    DenyUnlisted { command: String },
    /// A sub-command failed the semantic check bound to its name.
    DenyValidation { command: String, reason: String },
    /// The line is not valid shell input.
    DenyUnparseable { reason: String },
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    /// Denial reason to surface to the agent; `None` when allowed.
    pub fn reason(&self) -> Option<String> {
        match self {
            Verdict::Allow => None,
            Verdict::DenyUnlisted { command } => {
                Some(format!("command '{command}' is not in the allowlist"))
            }
            Verdict::DenyValidation { command, reason } => {
                Some(format!("command '{command}' failed extra validation: {reason}"))
            }
            Verdict::DenyUnparseable { reason } => {
                Some(format!("command line could not be parsed: {reason}"))
            }
        }
    }
}

/// The enforcement point for every shell command the agent attempts.
#[derive(Debug, Clone)]
pub struct SecurityGate {
    policy: GatePolicy,
}

impl SecurityGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Decide one command line, emitting an audit line for the decision.
    ///
    /// The whole line must tokenize before any per-command checks run, so a
    /// parse failure anywhere denies the line regardless of position. After
    /// that, the first denying sub-command short-circuits the scan.
    pub fn evaluate(&self, line: &str) -> Verdict {
        let verdict = self.decide(line);
        match &verdict {
            Verdict::Allow => debug!(command = line, "allowed"),
            denied => warn!(
                command = line,
                reason = denied.reason().as_deref().unwrap_or_default(),
                "blocked"
            ),
        }
        verdict
    }

    fn decide(&self, line: &str) -> Verdict {
        let commands = match extract_commands(line) {
            Ok(commands) => commands,
            Err(err) => {
                return Verdict::DenyUnparseable {
                    reason: err.to_string(),
                };
            }
        };

        for command in &commands {
            if !self.policy.is_allowed(&command.base_name) {
                return Verdict::DenyUnlisted {
                    command: command.base_name.clone(),
                };
            }
            if let Some(kind) = self.policy.validator_for(&command.base_name)
                && let Err(reason) = validators::check(kind, command)
            {
                return Verdict::DenyValidation {
                    command: command.raw.clone(),
                    reason,
                };
            }
        }
        Verdict::Allow
    }
}
