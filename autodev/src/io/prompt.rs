//! Session prompt rendering.
//!
//! Two templates, one per session kind. Rendering bakes in the marker-file
//! name and the cached tracker counters so each fresh-context session knows
//! where the durable state lives.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, context};

use crate::core::session::{ProjectState, SessionKind};
use crate::io::project_state::PROJECT_STATE_FILE;

const INITIALIZER_TEMPLATE: &str = include_str!("prompts/initializer.md");
const CODING_TEMPLATE: &str = include_str!("prompts/coding.md");

/// Name the application spec gets inside the project directory.
pub const APP_SPEC_FILE: &str = "APP_SPEC.md";

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("initializer", INITIALIZER_TEMPLATE)
            .expect("initializer template should be valid");
        env.add_template("coding", CODING_TEMPLATE)
            .expect("coding template should be valid");
        Self { env }
    }

    fn render_initializer(&self) -> Result<String> {
        let template = self.env.get_template("initializer")?;
        let rendered = template.render(context! {
            spec_file => APP_SPEC_FILE,
            state_file => PROJECT_STATE_FILE,
        })?;
        Ok(rendered)
    }

    fn render_coding(&self, state: Option<&ProjectState>) -> Result<String> {
        let template = self.env.get_template("coding")?;
        let rendered = template.render(context! {
            state_file => PROJECT_STATE_FILE,
            total_issues => state.map(|s| s.total_issues).filter(|n| *n > 0),
            meta_issue_id => state.map(|s| s.meta_issue_id.as_str()).filter(|id| !id.is_empty()),
        })?;
        Ok(rendered)
    }
}

/// Render the task prompt for one session of the given kind.
pub fn render_session_prompt(kind: SessionKind, state: Option<&ProjectState>) -> Result<String> {
    let engine = PromptEngine::new();
    match kind {
        SessionKind::Bootstrap => engine.render_initializer(),
        SessionKind::Continue => engine.render_coding(state),
    }
}

/// Copy the application spec into the project as `APP_SPEC.md` so the
/// initializer session can read it. An existing copy is left untouched.
pub fn copy_spec_into_project(spec_path: &Path, project_dir: &Path) -> Result<PathBuf> {
    if !spec_path.is_file() {
        return Err(anyhow!("spec file {} not found", spec_path.display()));
    }
    let dest = project_dir.join(APP_SPEC_FILE);
    if dest.exists() {
        return Ok(dest);
    }
    fs::copy(spec_path, &dest).with_context(|| {
        format!(
            "copy spec {} into project as {}",
            spec_path.display(),
            dest.display()
        )
    })?;
    Ok(dest)
}
