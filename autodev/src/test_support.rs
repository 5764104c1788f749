//! Test-only doubles and fixtures for gate and loop tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use crate::core::gate::{SecurityGate, Verdict};
use crate::core::session::ProjectState;
use crate::io::engine::{SessionEngine, SessionRequest, SessionRunResult};
use crate::io::project_state::write_project_state;

/// One scripted agent session.
pub struct ScriptedSession {
    /// Command lines the "agent" asks to run; each is routed through the gate
    /// exactly like a real interception.
    pub command_lines: Vec<String>,
    /// Project marker the session leaves behind, simulating the bootstrap
    /// agent writing its state file.
    pub writes_state: Option<ProjectState>,
    pub result: SessionRunResult,
}

impl ScriptedSession {
    pub fn completing(writes_state: Option<ProjectState>) -> Self {
        Self {
            command_lines: Vec::new(),
            writes_state,
            result: SessionRunResult::ok(),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            command_lines: Vec::new(),
            writes_state: None,
            result: SessionRunResult::failed(error),
        }
    }

    pub fn with_commands(mut self, command_lines: &[&str]) -> Self {
        self.command_lines = command_lines.iter().map(|l| l.to_string()).collect();
        self
    }
}

/// Engine double that replays scripted sessions without spawning anything,
/// recording the prompts it was given and the verdicts the gate produced.
pub struct ScriptedEngine {
    sessions: Mutex<VecDeque<ScriptedSession>>,
    prompts: Mutex<Vec<String>>,
    verdicts: Mutex<Vec<Verdict>>,
}

impl ScriptedEngine {
    pub fn new(sessions: Vec<ScriptedSession>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            prompts: Mutex::new(Vec::new()),
            verdicts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    /// Gate verdicts produced for scripted command lines, in order.
    pub fn verdicts(&self) -> Vec<Verdict> {
        self.verdicts.lock().expect("verdicts lock").clone()
    }

    pub fn sessions_left(&self) -> usize {
        self.sessions.lock().expect("sessions lock").len()
    }
}

impl SessionEngine for ScriptedEngine {
    fn run_session(
        &self,
        request: &SessionRequest,
        gate: &SecurityGate,
    ) -> Result<SessionRunResult> {
        let session = self
            .sessions
            .lock()
            .expect("sessions lock")
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted session left"))?;

        self.prompts
            .lock()
            .expect("prompts lock")
            .push(request.prompt.clone());
        for line in &session.command_lines {
            let verdict = gate.evaluate(line);
            self.verdicts.lock().expect("verdicts lock").push(verdict);
        }
        if let Some(state) = &session.writes_state {
            write_project_state(&request.workdir, state)?;
        }
        Ok(session.result.clone())
    }
}

/// Temp project directory for loop tests.
pub struct TestProject {
    temp: tempfile::TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }
}

/// A project marker as the bootstrap session would write it.
pub fn initialized_state(total_issues: u64) -> ProjectState {
    ProjectState {
        initialized: true,
        total_issues,
        meta_issue_id: "META-1".to_string(),
        project_id: "proj-1".to_string(),
    }
}
