//! Auto-sync: the one explicitly-requested mutating operation.
//!
//! Applies checkout → pull → push in strict order, each step optional,
//! stopping at the first failure. A pull that cannot fast-forward is a
//! recognized outcome ("Fast-forward not possible"), not a generic error —
//! callers fall back to manual resolution rather than retrying.

use std::path::Path;

use tracing::info;

use crate::model::{SyncOutcome, SyncPlan};
use crate::probe::GitRunner;

/// Execute the requested sync steps against one repository.
pub async fn auto_sync(git: &dyn GitRunner, path: &Path, plan: &SyncPlan) -> SyncOutcome {
    let mut actions = Vec::new();

    if let Some(branch) = &plan.checkout {
        match git.run(&["checkout", branch], path, false).await {
            Ok(_) => {
                info!(path = %path.display(), branch, "checked out branch");
                actions.push(format!("checked out '{branch}'"));
            }
            Err(e) => return SyncOutcome::failed(actions, format!("checkout failed: {e}")),
        }
    }

    if plan.pull {
        match git.run(&["pull", "--ff-only"], path, true).await {
            Ok(_) => {
                info!(path = %path.display(), "pulled latest changes");
                actions.push("pulled latest changes".to_string());
            }
            Err(e) => {
                let detail = e.to_string().to_lowercase();
                let reason = if detail.contains("fast-forward") || detail.contains("divergent") {
                    "Fast-forward not possible".to_string()
                } else {
                    format!("pull failed: {e}")
                };
                return SyncOutcome::failed(actions, reason);
            }
        }
    }

    if plan.push {
        match git.run(&["push"], path, false).await {
            Ok(_) => {
                info!(path = %path.display(), "pushed to remote");
                actions.push("pushed to remote".to_string());
            }
            Err(e) => return SyncOutcome::failed(actions, format!("push failed: {e}")),
        }
    }

    SyncOutcome::completed(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuditError, Result};
    use crate::probe::GitOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every command; fails those whose first argument is listed.
    struct RecordingGit {
        seen: Mutex<Vec<String>>,
        fail_step: Option<(String, String)>,
    }

    impl RecordingGit {
        fn ok() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail_step: None,
            }
        }

        fn failing(step: &str, detail: &str) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail_step: Some((step.to_string(), detail.to_string())),
            }
        }
    }

    #[async_trait]
    impl GitRunner for RecordingGit {
        async fn run(&self, args: &[&str], cwd: &Path, _quiet: bool) -> Result<GitOutput> {
            self.seen.lock().unwrap().push(args.join(" "));
            if let Some((step, detail)) = &self.fail_step {
                if args.first() == Some(&step.as_str()) {
                    return Err(AuditError::Git {
                        path: cwd.display().to_string(),
                        detail: detail.clone(),
                    });
                }
            }
            Ok(GitOutput {
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn full_plan() -> SyncPlan {
        SyncPlan {
            checkout: Some("main".to_string()),
            pull: true,
            push: true,
        }
    }

    #[tokio::test]
    async fn test_steps_run_in_checkout_pull_push_order() {
        let git = RecordingGit::ok();
        let outcome = auto_sync(&git, Path::new("/r"), &full_plan()).await;

        assert!(outcome.success);
        assert_eq!(outcome.actions.len(), 3);
        let seen = git.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec!["checkout main", "pull --ff-only", "push"]
        );
    }

    #[tokio::test]
    async fn test_non_fast_forward_pull_is_the_recognized_outcome() {
        let git = RecordingGit::failing("pull", "fatal: Not possible to fast-forward, aborting.");
        let outcome = auto_sync(&git, Path::new("/r"), &full_plan()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Fast-forward not possible"));
        // Checkout happened; push never ran.
        assert_eq!(outcome.actions, vec!["checked out 'main'"]);
        assert!(!git.seen.lock().unwrap().iter().any(|c| c == "push"));
    }

    #[tokio::test]
    async fn test_divergent_branches_also_map_to_fast_forward_outcome() {
        let git = RecordingGit::failing("pull", "fatal: You have divergent branches");
        let outcome = auto_sync(&git, Path::new("/r"), &full_plan()).await;
        assert_eq!(outcome.error.as_deref(), Some("Fast-forward not possible"));
    }

    #[tokio::test]
    async fn test_checkout_failure_stops_the_chain() {
        let git = RecordingGit::failing("checkout", "pathspec 'main' did not match");
        let outcome = auto_sync(&git, Path::new("/r"), &full_plan()).await;

        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("checkout failed"));
        assert!(outcome.actions.is_empty());
        assert_eq!(git.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_steps_are_individually_optional() {
        let git = RecordingGit::ok();
        let plan = SyncPlan {
            checkout: None,
            pull: true,
            push: false,
        };
        let outcome = auto_sync(&git, Path::new("/r"), &plan).await;
        assert!(outcome.success);
        assert_eq!(outcome.actions, vec!["pulled latest changes"]);
        assert_eq!(*git.seen.lock().unwrap(), vec!["pull --ff-only"]);
    }

    #[tokio::test]
    async fn test_empty_plan_succeeds_with_no_actions() {
        let git = RecordingGit::ok();
        let outcome = auto_sync(&git, Path::new("/r"), &SyncPlan::default()).await;
        assert!(outcome.success);
        assert!(outcome.actions.is_empty());
        assert!(git.seen.lock().unwrap().is_empty());
    }
}
