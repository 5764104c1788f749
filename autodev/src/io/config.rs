//! Harness configuration stored under `.autodev/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::CONTROL_DIR;

/// Default model for agent sessions.
pub const DEFAULT_MODEL: &str = "claude-opus-4-5-20251101";

/// Harness configuration (TOML).
///
/// Edited by humans; missing fields default to sensible values and a missing
/// file means all defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Model identifier passed to the agent CLI.
    pub model: String,

    /// Pause between sessions, letting subprocesses from the previous session
    /// wind down before the next one starts.
    pub session_delay_secs: u64,

    /// Wall-clock budget for one agent session.
    pub session_timeout_secs: u64,

    /// Hard cap on tool invocations within one session.
    pub max_turns: u32,

    /// Truncate captured session output beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Extra base command names to allowlist on top of the built-in policy.
    pub extra_allowed_commands: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            session_delay_secs: 3,
            session_timeout_secs: 60 * 60,
            max_turns: 200,
            output_limit_bytes: 1_000_000,
            extra_allowed_commands: Vec::new(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must not be empty"));
        }
        if self.session_timeout_secs == 0 {
            return Err(anyhow!("session_timeout_secs must be > 0"));
        }
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONTROL_DIR).join("config.toml")
}

/// Load config from a TOML file; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');

    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, HarnessConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = config_path(temp.path());
        let cfg = HarnessConfig {
            extra_allowed_commands: vec!["cargo".to_string()],
            ..HarnessConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn rejects_zero_timeout_and_empty_model() {
        let cfg = HarnessConfig {
            session_timeout_secs: 0,
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = HarnessConfig {
            model: "  ".to_string(),
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
