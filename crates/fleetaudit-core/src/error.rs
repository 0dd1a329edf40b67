//! Error types for the fleet audit engine.

use thiserror::Error;

/// Errors produced by the audit engine and its collaborators.
///
/// Per-package probe failures are deliberately *not* represented here — they
/// degrade to sentinel values or diagnostic strings so that one bad
/// repository never aborts a fleet-wide audit.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A git invocation failed (non-zero exit or spawn failure).
    #[error("git command failed in {path}: {detail}")]
    Git { path: String, detail: String },

    /// A concurrent audit task could not be joined (task panic).
    #[error("audit task join error: {0}")]
    TaskJoin(String),

    /// A package manifest could not be read or parsed.
    #[error("manifest read failed in {path}: {detail}")]
    Manifest { path: String, detail: String },

    /// The pull-request lookup backend reported a transport failure.
    #[error("pull request lookup failed for branch '{branch}': {detail}")]
    PrLookup { branch: String, detail: String },
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_error_displays_path_and_detail() {
        let err = AuditError::Git {
            path: "/repos/api".to_string(),
            detail: "fatal: not a git repository".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/repos/api"));
        assert!(msg.contains("not a git repository"));
    }

    #[test]
    fn test_pr_lookup_error_displays_branch() {
        let err = AuditError::PrLookup {
            branch: "working".to_string(),
            detail: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("working"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_task_join_error_displays_detail() {
        let err = AuditError::TaskJoin("task 3 panicked".to_string());
        assert!(err.to_string().contains("task 3 panicked"));
    }
}
