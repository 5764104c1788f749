//! Auto-continuation loop across agent sessions.
//!
//! One session at a time against one project directory. Each iteration
//! re-reads the durable project marker to pick the session kind, runs one
//! session through the engine (with the gate as its command interceptor), and
//! keeps going until an iteration cap, an engine failure, or the stop latch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::gate::SecurityGate;
use crate::core::session::{SessionKind, select_session_kind};
use crate::io::CONTROL_DIR;
use crate::io::engine::{SessionEngine, SessionRequest, SessionRunResult};
use crate::io::git::{self, GitSummary};
use crate::io::project_state::load_project_state;
use crate::io::prompt::{copy_spec_into_project, render_session_prompt};

/// Reason why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The configured session cap was reached.
    MaxIterations { iterations: u32 },
    /// The engine reported an unrecoverable session failure (not retried).
    EngineFailure { error: String },
    /// The external stop latch was set between sessions.
    Interrupted,
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub sessions_run: u32,
    pub stop: LoopStop,
}

/// What one finished session looked like, for the caller's reporting.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub iteration: u32,
    pub kind: SessionKind,
    pub result: SessionRunResult,
    pub git: GitSummary,
}

/// Loop configuration, resolved from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Stop after this many sessions; `None` runs until failure or stop.
    pub max_iterations: Option<u32>,
    /// Pause between sessions so subprocesses from the previous session can
    /// wind down before the next one starts.
    pub session_delay: Duration,
    pub model: String,
    pub max_turns: u32,
    pub session_timeout: Duration,
    pub output_limit_bytes: usize,
    /// Application spec to copy into the project before bootstrap.
    pub spec_path: Option<PathBuf>,
}

/// Run sessions until a stop condition is hit.
///
/// Fatal errors (corrupt project marker, engine spawn failure) propagate as
/// `Err`; expected stop causes come back as [`LoopOutcome`]. The stop latch
/// is observed between sessions: once set, no further session starts.
pub fn run_loop<E: SessionEngine, F: FnMut(&SessionReport)>(
    project_dir: &Path,
    engine: &E,
    gate: &SecurityGate,
    config: &LoopConfig,
    stop: &AtomicBool,
    mut on_session: F,
) -> Result<LoopOutcome> {
    fs::create_dir_all(project_dir)
        .with_context(|| format!("create project directory {}", project_dir.display()))?;

    let mut sessions_run = 0u32;
    loop {
        if stop.load(Ordering::SeqCst) {
            info!(sessions_run, "stop latched, not starting another session");
            return Ok(LoopOutcome {
                sessions_run,
                stop: LoopStop::Interrupted,
            });
        }
        if let Some(max) = config.max_iterations
            && sessions_run >= max
        {
            info!(max_iterations = max, "session cap reached");
            return Ok(LoopOutcome {
                sessions_run,
                stop: LoopStop::MaxIterations { iterations: max },
            });
        }

        let iteration = sessions_run + 1;
        let state = load_project_state(project_dir).context("load project marker")?;
        let kind = select_session_kind(state.as_ref());
        if kind == SessionKind::Bootstrap {
            prepare_bootstrap(project_dir, config.spec_path.as_deref())?;
        }

        let prompt = render_session_prompt(kind, state.as_ref())?;
        let request = SessionRequest {
            workdir: project_dir.to_path_buf(),
            prompt,
            model: config.model.clone(),
            max_turns: config.max_turns,
            timeout: config.session_timeout,
            output_limit_bytes: config.output_limit_bytes,
            session_log_path: session_log_path(project_dir, iteration),
        };

        info!(iteration, kind = kind.as_str(), "starting session");
        let result = engine
            .run_session(&request, gate)
            .context("run agent session")?;
        sessions_run = iteration;

        let git = git::summarize(project_dir);
        if git.initialized && git.uncommitted_changes {
            warn!(iteration, "session left uncommitted changes");
        }
        on_session(&SessionReport {
            iteration,
            kind,
            result: result.clone(),
            git,
        });

        if !result.completed_normally {
            let error = result
                .error
                .unwrap_or_else(|| "session did not complete".to_string());
            warn!(iteration, error = %error, "engine reported failure, stopping");
            return Ok(LoopOutcome {
                sessions_run,
                stop: LoopStop::EngineFailure { error },
            });
        }

        sleep_between_sessions(config.session_delay, stop);
    }
}

/// One-time setup before a bootstrap session: a git repository for the agent
/// to commit into, and the application spec where the prompt says it is.
fn prepare_bootstrap(project_dir: &Path, spec_path: Option<&Path>) -> Result<()> {
    match git::ensure_initialized(project_dir) {
        Ok(msg) => info!(project_dir = %project_dir.display(), "{msg}"),
        // The initializer prompt also tells the agent to commit; a missing
        // git here degrades the session rather than blocking it.
        Err(err) => warn!(err = %err, "could not initialize git, continuing"),
    }
    if let Some(spec) = spec_path {
        let dest = copy_spec_into_project(spec, project_dir)?;
        info!(spec = %dest.display(), "application spec staged for the initializer");
    }
    Ok(())
}

fn session_log_path(project_dir: &Path, iteration: u32) -> PathBuf {
    project_dir
        .join(CONTROL_DIR)
        .join("sessions")
        .join(format!("{iteration}.log"))
}

/// Sleep in short slices so a latched stop cuts the delay short.
fn sleep_between_sessions(delay: Duration, stop: &AtomicBool) {
    let slice = Duration::from_millis(100);
    let mut remaining = delay;
    while remaining > Duration::ZERO {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let nap = remaining.min(slice);
        thread::sleep(nap);
        remaining = remaining.saturating_sub(nap);
    }
}
