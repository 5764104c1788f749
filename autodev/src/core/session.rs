//! Session-type selection from the durable project marker.

use serde::{Deserialize, Serialize};

/// Cached tracker-project record the bootstrap session leaves behind.
///
/// Read (never partially mutated) on every later session start; the counters
/// are informational, only `initialized` drives mode selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    /// True once the bootstrap session finished setting the project up.
    pub initialized: bool,
    /// Number of issues the bootstrap session filed in the tracker.
    pub total_issues: u64,
    /// Opaque tracker identifier of the META progress issue.
    pub meta_issue_id: String,
    /// Opaque tracker identifier of the project.
    pub project_id: String,
}

/// Which kind of session to run next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// First session against a project: set everything up.
    Bootstrap,
    /// Any later session: keep working through the backlog.
    Continue,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Bootstrap => "bootstrap",
            SessionKind::Continue => "continue",
        }
    }
}

/// Select the session kind from the (possibly absent) project marker.
///
/// Absent marker or one not yet flagged `initialized` means the project still
/// needs bootstrapping.
pub fn select_session_kind(state: Option<&ProjectState>) -> SessionKind {
    match state {
        Some(state) if state.initialized => SessionKind::Continue,
        _ => SessionKind::Bootstrap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(initialized: bool) -> ProjectState {
        ProjectState {
            initialized,
            total_issues: 50,
            meta_issue_id: "META-1".to_string(),
            project_id: "proj-1".to_string(),
        }
    }

    #[test]
    fn absent_state_selects_bootstrap() {
        assert_eq!(select_session_kind(None), SessionKind::Bootstrap);
    }

    #[test]
    fn initialized_state_selects_continue() {
        assert_eq!(
            select_session_kind(Some(&state(true))),
            SessionKind::Continue
        );
    }

    #[test]
    fn uninitialized_record_still_selects_bootstrap() {
        assert_eq!(
            select_session_kind(Some(&state(false))),
            SessionKind::Bootstrap
        );
    }
}
