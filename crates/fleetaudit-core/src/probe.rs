//! Single-repository prober and the injected collaborator seams.
//!
//! Everything here is built on one primitive: [`GitRunner::run`], which
//! executes a git command and errors on non-zero exit. The prober turns that
//! primitive into point queries (current branch, remote existence,
//! ahead/behind counts, non-destructive conflict probe, target-branch SHA
//! comparison). Every operation fails softly — a bad repository yields a
//! sentinel or neutral value, never an error that aborts the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{PullRequestRef, TargetBranchSync};

/// Sentinel branch name when the current branch could not be determined.
pub const UNKNOWN_BRANCH: &str = "unknown";

/// Sentinel branch name for paths that are not git repositories.
pub const NON_GIT_BRANCH: &str = "non-git";

/// Fixed remote name; the audit only compares against `origin`.
pub const REMOTE_NAME: &str = "origin";

/// Captured output of a successful git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// The single subprocess primitive all probe operations are built from.
///
/// `quiet` suppresses error-level logging for probes where a non-zero exit
/// is an expected answer rather than a failure.
#[async_trait]
pub trait GitRunner: Send + Sync {
    async fn run(&self, args: &[&str], cwd: &Path, quiet: bool) -> Result<GitOutput>;
}

/// Minimal view of a package's version-declaring manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Reads and parses a package's manifest. `Ok(None)` means "no manifest
/// present", which is not an error.
#[async_trait]
pub trait ManifestReader: Send + Sync {
    async fn read(&self, dir: &Path) -> Result<Option<Manifest>>;
}

/// Finds an open pull request whose head ref is the given branch.
///
/// `Ok(None)` covers both "no PR" and "not hosted anywhere we can ask";
/// an `Err` is a genuine transport failure, surfaced by the orchestrator
/// as a warning string rather than a propagated error.
#[async_trait]
pub trait PrLookup: Send + Sync {
    async fn find_open_by_head_ref(
        &self,
        branch: &str,
        path: &Path,
    ) -> Result<Option<PullRequestRef>>;
}

/// Answers point queries about one repository via one-shot git calls.
///
/// Holds no state beyond the injected runner; safe to share across
/// concurrent audit tasks.
pub struct RepoProber {
    git: Arc<dyn GitRunner>,
}

impl RepoProber {
    pub fn new(git: Arc<dyn GitRunner>) -> Self {
        Self { git }
    }

    /// Current branch name, or the `"unknown"` sentinel on any failure.
    pub async fn current_branch(&self, path: &Path) -> String {
        match self
            .git
            .run(&["rev-parse", "--abbrev-ref", "HEAD"], path, true)
            .await
        {
            Ok(out) => {
                let name = out.stdout.trim().to_string();
                if name.is_empty() {
                    UNKNOWN_BRANCH.to_string()
                } else {
                    name
                }
            }
            Err(e) => {
                debug!(path = %path.display(), "could not determine current branch: {e}");
                UNKNOWN_BRANCH.to_string()
            }
        }
    }

    /// Whether `path` is inside a git work tree.
    pub async fn is_git_repository(&self, path: &Path) -> bool {
        self.git
            .run(&["rev-parse", "--is-inside-work-tree"], path, true)
            .await
            .is_ok()
    }

    /// Repository root containing `path`, or `None` when it has none.
    pub async fn repository_root(&self, path: &Path) -> Option<PathBuf> {
        match self
            .git
            .run(&["rev-parse", "--show-toplevel"], path, true)
            .await
        {
            Ok(out) => {
                let root = out.stdout.trim();
                if root.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(root))
                }
            }
            Err(_) => None,
        }
    }

    /// Whether `branch` exists on the remote. A non-zero exit from the
    /// remote listing is treated as "does not exist", not as an error.
    pub async fn remote_branch_exists(&self, path: &Path, branch: &str) -> bool {
        match self
            .git
            .run(&["ls-remote", "--heads", REMOTE_NAME, branch], path, true)
            .await
        {
            Ok(out) => !out.stdout.trim().is_empty(),
            Err(_) => false,
        }
    }

    /// Commits ahead of / behind the remote tracking branch. Parse failure
    /// yields `(0, 0)` with a logged warning; callers are never aborted.
    pub async fn ahead_behind(&self, path: &Path, branch: &str) -> (u32, u32) {
        let range = format!("{branch}...{REMOTE_NAME}/{branch}");
        match self.left_right_counts(path, &range).await {
            Some(counts) => counts,
            None => {
                warn!(
                    path = %path.display(),
                    branch,
                    "could not compute ahead/behind counts; assuming (0, 0)"
                );
                (0, 0)
            }
        }
    }

    /// Probe whether merging `branch` into the remote tracking ref of
    /// `target` would conflict, without touching the working tree or index.
    ///
    /// Computes the merge base, then asks `git merge-tree` for an in-memory
    /// merge result and scans it for conflict markers. Safe to call
    /// repeatedly and concurrently against the same repository.
    pub async fn merge_conflict_probe(&self, path: &Path, branch: &str, target: &str) -> bool {
        let target_ref = format!("{REMOTE_NAME}/{target}");
        let base = match self
            .git
            .run(&["merge-base", branch, &target_ref], path, true)
            .await
        {
            Ok(out) => out.stdout.trim().to_string(),
            Err(e) => {
                debug!(
                    path = %path.display(),
                    branch,
                    target,
                    "no merge base available, skipping conflict probe: {e}"
                );
                return false;
            }
        };
        if base.is_empty() {
            return false;
        }

        match self
            .git
            .run(&["merge-tree", &base, branch, &target_ref], path, true)
            .await
        {
            Ok(out) => {
                out.stdout.contains("<<<<<<<") || out.stdout.contains("changed in both")
            }
            Err(e) => {
                warn!(path = %path.display(), branch, "merge-tree probe failed: {e}");
                false
            }
        }
    }

    /// Local and remote tips of the target branch. Absence of either ref is
    /// an answer, not an error.
    pub async fn target_branch_shas(
        &self,
        path: &Path,
        target: &str,
    ) -> (Option<String>, Option<String>) {
        let local_ref = format!("refs/heads/{target}");
        let remote_ref = format!("refs/remotes/{REMOTE_NAME}/{target}");
        let local = self.rev_parse(path, &local_ref).await;
        let remote = self.rev_parse(path, &remote_ref).await;
        (local, remote)
    }

    /// Classify the target branch's sync state within this repository.
    ///
    /// Behind-only means the local tip is an ancestor of the remote and can
    /// be fast-forwarded; any local-only commit means the branch diverged
    /// and must be hard-reset to the remote.
    pub async fn target_branch_sync(&self, path: &Path, target: &str) -> TargetBranchSync {
        if !self.is_git_repository(path).await {
            return TargetBranchSync::non_repository(target);
        }

        let (local, remote) = self.target_branch_shas(path, target).await;
        let mut sync = TargetBranchSync {
            target_branch: target.to_string(),
            local_exists: local.is_some(),
            remote_exists: remote.is_some(),
            local_sha: local.clone(),
            remote_sha: remote.clone(),
            exact_match: false,
            can_fast_forward: false,
            needs_reset: false,
            error: None,
        };

        if let (Some(local_sha), Some(remote_sha)) = (local, remote) {
            if local_sha == remote_sha {
                sync.exact_match = true;
            } else {
                let range = format!("{local_sha}...{remote_sha}");
                match self.left_right_counts(path, &range).await {
                    Some((ahead, _)) if ahead > 0 => sync.needs_reset = true,
                    Some((_, behind)) if behind > 0 => sync.can_fast_forward = true,
                    Some(_) => {}
                    None => {
                        sync.error =
                            Some(format!("could not compare '{target}' tips {range}"));
                    }
                }
            }
        }

        sync
    }

    /// Fetch the remote. Idempotent; Phase 2 of the orchestrator runs this
    /// once per physical repository so later probes can skip it.
    pub async fn fetch_remote(&self, path: &Path) -> bool {
        match self.git.run(&["fetch", REMOTE_NAME], path, true).await {
            Ok(_) => true,
            Err(e) => {
                warn!(path = %path.display(), "fetch failed: {e}");
                false
            }
        }
    }

    async fn rev_parse(&self, path: &Path, rev: &str) -> Option<String> {
        match self
            .git
            .run(&["rev-parse", "--verify", rev], path, true)
            .await
        {
            Ok(out) => {
                let sha = out.stdout.trim().to_string();
                if sha.is_empty() {
                    None
                } else {
                    Some(sha)
                }
            }
            Err(_) => None,
        }
    }

    /// Two tab-separated counts from `git rev-list --left-right --count`.
    async fn left_right_counts(&self, path: &Path, range: &str) -> Option<(u32, u32)> {
        let out = self
            .git
            .run(&["rev-list", "--left-right", "--count", range], path, true)
            .await
            .ok()?;
        let mut parts = out.stdout.split_whitespace();
        let ahead = parts.next()?.parse().ok()?;
        let behind = parts.next()?.parse().ok()?;
        Some((ahead, behind))
    }
}
