//! Audit data model: per-package snapshots and the fleet-level report.
//!
//! Every type here is built once per audit pass and never mutated afterwards.
//! Each orchestrator phase produces fresh values rather than patching
//! existing ones.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default shared release-target branch.
pub const DEFAULT_TARGET_BRANCH: &str = "main";

/// Default concurrency ceiling for fleet-wide probing.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Identity unit of the audit: one package checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Display identity, e.g. `"@org/api"`.
    pub name: String,
    /// Filesystem location of the repository checkout.
    pub path: PathBuf,
}

impl Package {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Snapshot of one package's current branch relative to its remote.
///
/// Invariant: when `remote_exists` is false, `ahead` and `behind` are both 0
/// (no meaningful comparison is possible).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchStatus {
    /// Current branch name, or a sentinel (`"unknown"` / `"non-git"`).
    pub name: String,
    pub is_on_expected_branch: bool,
    pub expected_branch: Option<String>,
    /// Commits the local branch has that the remote lacks.
    pub ahead: u32,
    /// Commits the remote has that the local branch lacks.
    pub behind: u32,
    pub has_unpushed_commits: bool,
    pub needs_sync: bool,
    pub remote_exists: bool,
    pub has_merge_conflicts: bool,
    pub conflicts_with: Option<String>,
    pub has_open_pr: bool,
    pub pr_url: Option<String>,
    pub pr_number: Option<u64>,
}

impl BranchStatus {
    /// Neutral status for a branch that could not be compared to anything.
    pub fn new(name: impl Into<String>, expected_branch: &str) -> Self {
        let name = name.into();
        Self {
            is_on_expected_branch: name == expected_branch,
            name,
            expected_branch: Some(expected_branch.to_string()),
            ahead: 0,
            behind: 0,
            has_unpushed_commits: false,
            needs_sync: false,
            remote_exists: false,
            has_merge_conflicts: false,
            conflicts_with: None,
            has_open_pr: false,
            pr_url: None,
            pr_number: None,
        }
    }

    /// Record ahead/behind counts, keeping the derived flags consistent.
    pub fn with_counts(mut self, ahead: u32, behind: u32) -> Self {
        self.ahead = ahead;
        self.behind = behind;
        self.has_unpushed_commits = ahead > 0;
        self.needs_sync = behind > 0;
        self
    }
}

/// Sync state of the shared release-target branch within one repository.
///
/// `exact_match`, `can_fast_forward` and `needs_reset` are mutually exclusive
/// when both branches exist. When either branch is absent all three are
/// false, except that `exact_match` defaults true for the non-repository
/// case (nothing was checked, nothing can be out of sync).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBranchSync {
    pub target_branch: String,
    pub local_exists: bool,
    pub remote_exists: bool,
    pub local_sha: Option<String>,
    pub remote_sha: Option<String>,
    pub exact_match: bool,
    pub can_fast_forward: bool,
    pub needs_reset: bool,
    pub error: Option<String>,
}

impl TargetBranchSync {
    /// Status for a path that is not a git repository: vacuously in sync.
    pub fn non_repository(target_branch: impl Into<String>) -> Self {
        Self {
            target_branch: target_branch.into(),
            local_exists: false,
            remote_exists: false,
            local_sha: None,
            remote_sha: None,
            exact_match: true,
            can_fast_forward: false,
            needs_reset: false,
            error: None,
        }
    }

    /// True when both branches exist but their tips differ.
    pub fn is_out_of_sync(&self) -> bool {
        self.local_exists && self.remote_exists && !self.exact_match
    }
}

/// Result of validating a package's declared version against its branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStatus {
    pub version: String,
    pub is_valid: bool,
    pub issue: Option<String>,
    pub fix: Option<String>,
}

/// Per-package audit aggregate. `fixes[i]` pairs with `issues[i]`.
///
/// `warnings` carries soft diagnostics ("we couldn't check this"), kept
/// separate from `issues` ("this is broken").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageAudit {
    pub package_name: String,
    pub path: PathBuf,
    pub status: BranchStatus,
    pub version_status: Option<VersionStatus>,
    pub target_sync: Option<TargetBranchSync>,
    pub issues: Vec<String>,
    pub fixes: Vec<String>,
    pub warnings: Vec<String>,
}

impl PackageAudit {
    /// A package with zero issues is "good" (warnings do not count).
    pub fn is_good(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Fleet-level audit aggregate. `audits` preserves input package order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub total_packages: usize,
    /// Packages with zero issues.
    pub good_packages: usize,
    /// Packages with at least one issue.
    pub issues_found: usize,
    /// Packages whose declared version does not fit their branch.
    pub version_issues: usize,
    /// Packages whose local target branch exists but does not match its remote.
    pub target_sync_issues: usize,
    pub expected_branch: String,
    pub target_branch: String,
    pub audits: Vec<PackageAudit>,
    pub generated_at: DateTime<Utc>,
}

impl AuditReport {
    /// Derive the aggregate counters from a completed audit list.
    pub fn new(
        expected_branch: impl Into<String>,
        target_branch: impl Into<String>,
        audits: Vec<PackageAudit>,
    ) -> Self {
        let total_packages = audits.len();
        let good_packages = audits.iter().filter(|a| a.is_good()).count();
        let issues_found = total_packages - good_packages;
        let version_issues = audits
            .iter()
            .filter(|a| a.version_status.as_ref().is_some_and(|v| !v.is_valid))
            .count();
        let target_sync_issues = audits
            .iter()
            .filter(|a| a.target_sync.as_ref().is_some_and(|t| t.is_out_of_sync()))
            .count();
        Self {
            total_packages,
            good_packages,
            issues_found,
            version_issues,
            target_sync_issues,
            expected_branch: expected_branch.into(),
            target_branch: target_branch.into(),
            audits,
            generated_at: Utc::now(),
        }
    }
}

/// Enumerated audit configuration with documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditOptions {
    /// Shared release-target branch. Default `"main"`.
    pub target_branch: String,
    /// Expected working branch. When `None`, Phase 1 votes on the most
    /// common current branch across the fleet.
    pub expected_branch: Option<String>,
    /// Look up open pull requests per branch. Default on.
    pub check_pr: bool,
    /// Probe for would-be merge conflicts against the target. Default on.
    pub check_conflicts: bool,
    /// Validate declared versions against branch conventions. Default on.
    pub check_versions: bool,
    /// Concurrency ceiling for fleet-wide probing. Default 5.
    pub concurrency: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            target_branch: DEFAULT_TARGET_BRANCH.to_string(),
            expected_branch: None,
            check_pr: true,
            check_conflicts: true,
            check_versions: true,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// An open pull request found for a branch, consumed as an opaque fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub html_url: String,
    pub number: u64,
}

/// Steps requested from the auto-sync executor, applied strictly in
/// checkout → pull → push order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Branch to check out first, if any.
    pub checkout: Option<String>,
    pub pull: bool,
    pub push: bool,
}

/// Outcome of an auto-sync run: the actions that completed, and the first
/// failure if one occurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub actions: Vec<String>,
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn completed(actions: Vec<String>) -> Self {
        Self {
            success: true,
            actions,
            error: None,
        }
    }

    pub fn failed(actions: Vec<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            actions,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audit_with_issues(name: &str, issues: Vec<&str>) -> PackageAudit {
        PackageAudit {
            package_name: name.to_string(),
            path: PathBuf::from(format!("/{name}")),
            status: BranchStatus::new("main", "main"),
            version_status: None,
            target_sync: None,
            issues: issues.into_iter().map(String::from).collect(),
            fixes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_report_counts_good_and_issues() {
        let audits = vec![
            audit_with_issues("a", vec![]),
            audit_with_issues("b", vec!["behind remote"]),
            audit_with_issues("c", vec![]),
            audit_with_issues("d", vec!["unpushed", "behind remote"]),
            audit_with_issues("e", vec!["no remote"]),
        ];
        let report = AuditReport::new("main", "main", audits);
        assert_eq!(report.total_packages, 5);
        assert_eq!(report.good_packages, 2);
        assert_eq!(report.issues_found, 3);
    }

    #[test]
    fn test_report_counts_version_and_target_sync_issues() {
        let mut bad_version = audit_with_issues("a", vec!["version mismatch"]);
        bad_version.version_status = Some(VersionStatus {
            version: "1.2.3".to_string(),
            is_valid: false,
            issue: Some("release version on development branch".to_string()),
            fix: None,
        });

        let mut desynced = audit_with_issues("b", vec!["target branch behind"]);
        desynced.target_sync = Some(TargetBranchSync {
            target_branch: "main".to_string(),
            local_exists: true,
            remote_exists: true,
            local_sha: Some("aaa".to_string()),
            remote_sha: Some("bbb".to_string()),
            exact_match: false,
            can_fast_forward: true,
            needs_reset: false,
            error: None,
        });

        let report = AuditReport::new("main", "main", vec![bad_version, desynced]);
        assert_eq!(report.version_issues, 1);
        assert_eq!(report.target_sync_issues, 1);
    }

    #[test]
    fn test_branch_status_with_counts_derives_flags() {
        let status = BranchStatus::new("working", "working").with_counts(2, 0);
        assert!(status.has_unpushed_commits);
        assert!(!status.needs_sync);

        let status = BranchStatus::new("working", "working").with_counts(0, 3);
        assert!(!status.has_unpushed_commits);
        assert!(status.needs_sync);
    }

    #[test]
    fn test_non_repository_target_sync_is_vacuously_in_sync() {
        let sync = TargetBranchSync::non_repository("main");
        assert!(sync.exact_match);
        assert!(!sync.can_fast_forward);
        assert!(!sync.needs_reset);
        assert!(!sync.is_out_of_sync());
    }

    #[test]
    fn test_audit_options_defaults() {
        let opts = AuditOptions::default();
        assert_eq!(opts.target_branch, "main");
        assert!(opts.expected_branch.is_none());
        assert!(opts.check_pr && opts.check_conflicts && opts.check_versions);
        assert_eq!(opts.concurrency, 5);
    }

    #[test]
    fn test_serde_round_trip_package() {
        let pkg = Package::new("@org/api", "/repos/api");
        let json = serde_json::to_string(&pkg).expect("serialize");
        let back: Package = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(pkg, back);
    }
}
