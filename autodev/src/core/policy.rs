//! Allowlist policy: which commands the agent may run at all, and which of
//! those need a further semantic check before they count as safe.
//!
//! The policy is an explicit constructed value rather than global state, so
//! tests can build independently configured gates, and it is serializable so
//! the out-of-process hook enforces exactly the policy the loop was built
//! with.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Base command names permitted without further scrutiny.
///
/// Deliberately excludes anything capable of unrestricted code execution
/// (`bash`, `sh`), network exfiltration (`curl`, `wget`), deletion (`rm`),
/// or privilege change (`sudo`). Sensitive names appear only through the
/// validator table below.
const DEFAULT_ALLOWED: [&str; 26] = [
    "cat", "cp", "date", "diff", "du", "echo", "find", "git", "grep", "head", "ls", "mkdir", "mv",
    "node", "npm", "npx", "pip", "pip3", "pwd", "python", "python3", "rg", "sort", "tail", "touch",
    "wc",
];

/// Extra semantic check bound to a command whose name alone is not evidence
/// of safety. Closed set: dispatch is by this tag, never by runtime
/// inspection of argument shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    /// Signal delivery restricted to known dev processes (`pkill`).
    KillSignal,
    /// Mode changes restricted to adding execute permission (`chmod`).
    FileMode,
    /// Direct invocation restricted to one fixed relative script (`./init.sh`).
    ScriptPath,
}

/// The gate's configuration: the allowlist plus the validator dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Base executable names permitted to run.
    pub allowed: BTreeSet<String>,
    /// Subset of `allowed` that additionally requires a semantic check.
    pub validators: BTreeMap<String, ValidatorKind>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        let mut allowed: BTreeSet<String> =
            DEFAULT_ALLOWED.iter().map(|name| name.to_string()).collect();
        let validators = BTreeMap::from([
            ("pkill".to_string(), ValidatorKind::KillSignal),
            ("chmod".to_string(), ValidatorKind::FileMode),
            ("init.sh".to_string(), ValidatorKind::ScriptPath),
        ]);
        allowed.extend(validators.keys().cloned());
        Self { allowed, validators }
    }
}

impl GatePolicy {
    pub fn is_allowed(&self, base_name: &str) -> bool {
        self.allowed.contains(base_name)
    }

    pub fn validator_for(&self, base_name: &str) -> Option<ValidatorKind> {
        self.validators.get(base_name).copied()
    }

    /// Extend the allowed set (never the validator table) with operator-supplied
    /// names from config.
    pub fn allow_extra<I: IntoIterator<Item = String>>(&mut self, names: I) {
        for name in names {
            let name = name.trim().to_string();
            if !name.is_empty() {
                self.allowed.insert(name);
            }
        }
    }

    /// Check structural invariants: no empty names, and every validator-bound
    /// name is also allowlisted (a validator on a non-allowlisted name would
    /// never run).
    pub fn validate(&self) -> Result<()> {
        if self.allowed.iter().any(|name| name.trim().is_empty()) {
            return Err(anyhow!("allowlist contains an empty command name"));
        }
        for name in self.validators.keys() {
            if !self.allowed.contains(name) {
                return Err(anyhow!(
                    "validator bound to '{name}' which is not in the allowlist"
                ));
            }
        }
        Ok(())
    }
}
