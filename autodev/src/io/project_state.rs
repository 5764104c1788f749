//! Durable project marker storage for session-type selection.
//!
//! The marker lives inside the project directory so it travels with the
//! project, not with the harness installation. The bootstrap session creates
//! it; every later session only reads it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::session::ProjectState;

/// Marker file the bootstrap session writes at the project root.
pub const PROJECT_STATE_FILE: &str = ".tracker_project.json";

pub fn project_state_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_STATE_FILE)
}

/// Load the project marker.
///
/// An absent file means the project was never bootstrapped. A file that
/// exists but does not parse is a hard error, not a re-bootstrap: guessing
/// here could overwrite real work.
pub fn load_project_state(project_dir: &Path) -> Result<Option<ProjectState>> {
    let path = project_state_path(project_dir);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no project marker, never bootstrapped");
            return Ok(None);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read project marker {}", path.display()));
        }
    };
    let state: ProjectState = serde_json::from_str(&contents).with_context(|| {
        format!(
            "project marker {} exists but is malformed; fix or remove it before rerunning",
            path.display()
        )
    })?;
    debug!(
        total_issues = state.total_issues,
        initialized = state.initialized,
        "project marker loaded"
    );
    Ok(Some(state))
}

/// Atomically write the project marker (temp file + rename), so a crash can
/// never leave a half-written record behind.
pub fn write_project_state(project_dir: &Path, state: &ProjectState) -> Result<()> {
    let path = project_state_path(project_dir);
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp project marker {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &path)
        .with_context(|| format!("replace project marker {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> ProjectState {
        ProjectState {
            initialized: true,
            total_issues: 50,
            meta_issue_id: "DEMO-1".to_string(),
            project_id: "proj-abc".to_string(),
        }
    }

    #[test]
    fn absent_marker_reads_as_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let loaded = load_project_state(temp.path()).expect("load");
        assert_eq!(loaded, None);
    }

    #[test]
    fn marker_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = sample_state();
        write_project_state(temp.path(), &state).expect("write");
        let loaded = load_project_state(temp.path()).expect("load");
        assert_eq!(loaded, Some(state));
    }

    /// A malformed marker must surface as an error, never as "not
    /// bootstrapped": silently re-bootstrapping would clobber real work.
    #[test]
    fn malformed_marker_is_a_hard_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(project_state_path(temp.path()), "{not json").expect("write junk");
        let err = load_project_state(temp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("malformed"));
    }

    #[test]
    fn write_leaves_no_temp_file_behind() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_project_state(temp.path(), &sample_state()).expect("write");
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
