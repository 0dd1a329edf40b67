//! Fleet-wide audit orchestration.
//!
//! [`FleetAuditor`] drives three strictly-ordered phases:
//!
//! 1. Determine the expected branch (supplied, or the most common current
//!    branch across the fleet).
//! 2. Fetch each unique physical repository once (deduplicated).
//! 3. Audit every package concurrently with a bounded ceiling, skipping
//!    fetches because Phase 2 already performed them.
//!
//! Phase 2 completes for all repositories before Phase 3 starts — a hard
//! barrier Phase 3's skip-fetch correctness depends on.
//!
//! Failures are converted to data at the narrowest scope: one bad
//! repository degrades its own [`PackageAudit`], never the fleet result.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::dedupe::unique_repository_roots;
use crate::error::Result;
use crate::executor::map_bounded;
use crate::model::{
    AuditOptions, AuditReport, BranchStatus, Package, PackageAudit, TargetBranchSync,
    VersionStatus, DEFAULT_TARGET_BRANCH,
};
use crate::probe::{GitRunner, ManifestReader, PrLookup, RepoProber, NON_GIT_BRANCH, UNKNOWN_BRANCH};
use crate::version::validate_version_branch;

/// Audits the synchronization state of a fleet of packages.
pub struct FleetAuditor {
    context: Arc<AuditContext>,
}

impl FleetAuditor {
    pub fn new(
        git: Arc<dyn GitRunner>,
        manifests: Arc<dyn ManifestReader>,
        prs: Arc<dyn PrLookup>,
        options: AuditOptions,
    ) -> Self {
        Self {
            context: Arc::new(AuditContext {
                prober: Arc::new(RepoProber::new(git)),
                manifests,
                prs,
                options,
            }),
        }
    }

    /// Run the full three-phase audit. Always returns a complete report for
    /// every supplied package, in input order, regardless of per-package
    /// probe failures.
    pub async fn audit(&self, packages: Vec<Package>) -> Result<AuditReport> {
        let ctx = &self.context;
        let concurrency = ctx.options.concurrency;

        // Phase 1: expected branch.
        let expected_branch = match &ctx.options.expected_branch {
            Some(branch) => branch.clone(),
            None => self.determine_expected_branch(&packages).await?,
        };
        info!(expected_branch, packages = packages.len(), "starting fleet audit");

        // Phase 2: one fetch per physical repository.
        let roots = unique_repository_roots(&packages, &ctx.prober).await;
        debug!(repositories = roots.len(), "fetching unique repositories");
        {
            let ctx = Arc::clone(ctx);
            map_bounded(roots, concurrency, move |root, _| {
                let ctx = Arc::clone(&ctx);
                async move {
                    // fetch_remote logs its own failures; Phase 3 operates
                    // on whatever state is locally available.
                    ctx.prober.fetch_remote(&root).await;
                }
            })
            .await?;
        }

        // Phase 3: full per-package audit.
        let audits = {
            let ctx = Arc::clone(ctx);
            let expected = expected_branch.clone();
            map_bounded(packages, concurrency, move |package, _| {
                let ctx = Arc::clone(&ctx);
                let expected = expected.clone();
                async move { ctx.audit_package(package, &expected).await }
            })
            .await?
        };

        Ok(AuditReport::new(
            expected_branch,
            ctx.options.target_branch.clone(),
            audits,
        ))
    }

    /// Most common current branch across the fleet, excluding the
    /// `"unknown"` / `"non-git"` sentinels. Ties break to the first branch
    /// seen; falls back to `"main"` when nothing usable is found.
    async fn determine_expected_branch(&self, packages: &[Package]) -> Result<String> {
        let ctx = Arc::clone(&self.context);
        let names = map_bounded(
            packages.to_vec(),
            self.context.options.concurrency,
            move |package, _| {
                let ctx = Arc::clone(&ctx);
                async move {
                    if ctx.prober.is_git_repository(&package.path).await {
                        ctx.prober.current_branch(&package.path).await
                    } else {
                        NON_GIT_BRANCH.to_string()
                    }
                }
            },
        )
        .await?;

        let mut tally: Vec<(String, usize)> = Vec::new();
        for name in names {
            if name == UNKNOWN_BRANCH || name == NON_GIT_BRANCH {
                continue;
            }
            match tally.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 += 1,
                None => tally.push((name, 1)),
            }
        }

        let mut best: Option<(String, usize)> = None;
        for (name, count) in tally {
            // Strict comparison keeps the first-seen branch on ties.
            if best.as_ref().map_or(true, |(_, c)| count > *c) {
                best = Some((name, count));
            }
        }
        Ok(best
            .map(|(name, _)| name)
            .unwrap_or_else(|| DEFAULT_TARGET_BRANCH.to_string()))
    }
}

/// Shared state threaded through the concurrent audit tasks.
struct AuditContext {
    prober: Arc<RepoProber>,
    manifests: Arc<dyn ManifestReader>,
    prs: Arc<dyn PrLookup>,
    options: AuditOptions,
}

impl AuditContext {
    async fn audit_package(&self, package: Package, expected_branch: &str) -> PackageAudit {
        let path = package.path.clone();
        let target = &self.options.target_branch;
        let mut warnings = Vec::new();

        // Fetch was already performed per-repository in Phase 2.
        let target_sync = self.prober.target_branch_sync(&path, target).await;
        if let Some(error) = &target_sync.error {
            warnings.push(error.clone());
        }

        let status = self.branch_status(&path, expected_branch, &mut warnings).await;

        let version_status = if self.options.check_versions {
            self.version_status(&path, &status.name, &mut warnings).await
        } else {
            None
        };

        let (issues, fixes) = derive_issues(
            &status,
            version_status.as_ref(),
            &target_sync,
            expected_branch,
            target,
        );

        PackageAudit {
            package_name: package.name,
            path,
            status,
            version_status,
            target_sync: Some(target_sync),
            issues,
            fixes,
            warnings,
        }
    }

    async fn branch_status(
        &self,
        path: &Path,
        expected_branch: &str,
        warnings: &mut Vec<String>,
    ) -> BranchStatus {
        let name = self.prober.current_branch(path).await;
        let mut status = BranchStatus::new(&name, expected_branch);
        if name == UNKNOWN_BRANCH {
            warnings.push("could not determine current branch; branch probes skipped".to_string());
            return status;
        }

        status.remote_exists = self.prober.remote_branch_exists(path, &name).await;
        if status.remote_exists {
            let (ahead, behind) = self.prober.ahead_behind(path, &name).await;
            status = status.with_counts(ahead, behind);
        }

        let target = &self.options.target_branch;
        if self.options.check_conflicts && name != *target {
            if self.prober.merge_conflict_probe(path, &name, target).await {
                status.has_merge_conflicts = true;
                status.conflicts_with = Some(target.clone());
            }
        }

        if self.options.check_pr && name != *target {
            match self.prs.find_open_by_head_ref(&name, path).await {
                Ok(Some(pr)) => {
                    status.has_open_pr = true;
                    status.pr_url = Some(pr.html_url);
                    status.pr_number = Some(pr.number);
                }
                Ok(None) => {}
                Err(e) => {
                    warnings.push(format!("could not check for an open pull request: {e}"));
                }
            }
        }

        status
    }

    async fn version_status(
        &self,
        path: &Path,
        branch: &str,
        warnings: &mut Vec<String>,
    ) -> Option<VersionStatus> {
        match self.manifests.read(path).await {
            Ok(Some(manifest)) => manifest
                .version
                .map(|version| validate_version_branch(&version, branch)),
            Ok(None) => None,
            Err(e) => {
                warnings.push(format!("could not read manifest: {e}"));
                None
            }
        }
    }
}

/// Apply the fixed issue-derivation rules. Every rule is evaluated
/// independently and all that apply are appended in this order, keeping the
/// remediation ordering deterministic. `fixes[i]` pairs with `issues[i]`.
fn derive_issues(
    status: &BranchStatus,
    version_status: Option<&VersionStatus>,
    target_sync: &TargetBranchSync,
    expected_branch: &str,
    target_branch: &str,
) -> (Vec<String>, Vec<String>) {
    let mut issues = Vec::new();
    let mut fixes = Vec::new();
    let probed = status.name != UNKNOWN_BRANCH && status.name != NON_GIT_BRANCH;

    // Rules 1-6 only apply when the branch could actually be probed;
    // a failed probe is a warning, not an actionable issue.
    if probed {
        if !status.is_on_expected_branch {
            issues.push(format!(
                "Not on expected branch (on '{}', expected '{expected_branch}')",
                status.name
            ));
            fixes.push(format!("git checkout {expected_branch}"));
        }
        if status.has_merge_conflicts {
            issues.push(format!(
                "CRITICAL: merge conflicts with '{}'",
                status.conflicts_with.as_deref().unwrap_or(target_branch)
            ));
            fixes.push(format!(
                "Resolve manually: git merge origin/{target_branch}, fix conflicts, commit"
            ));
        }
        if status.has_open_pr {
            let label = status
                .pr_number
                .map(|n| format!("#{n}"))
                .unwrap_or_else(|| "(unnumbered)".to_string());
            issues.push(format!(
                "CRITICAL: open PR {label} already exists for branch '{}'",
                status.name
            ));
            fixes.push(match &status.pr_url {
                Some(url) => format!("Review the existing PR before pushing: {url}"),
                None => "Review the existing PR before pushing".to_string(),
            });
        }
        if status.has_unpushed_commits {
            issues.push(format!("{} unpushed commit(s)", status.ahead));
            fixes.push("git push".to_string());
        }
        if status.needs_sync {
            issues.push(format!("Behind remote by {} commit(s)", status.behind));
            fixes.push("git pull".to_string());
        }
        if !status.remote_exists {
            issues.push(format!("No remote branch '{}'", status.name));
            fixes.push(format!("git push -u origin {}", status.name));
        }
    }

    if let Some(vs) = version_status {
        if !vs.is_valid {
            issues.push(
                vs.issue
                    .clone()
                    .unwrap_or_else(|| format!("version '{}' does not fit its branch", vs.version)),
            );
            fixes.push(
                vs.fix
                    .clone()
                    .unwrap_or_else(|| "Adjust the manifest version".to_string()),
            );
        }
    }

    if target_sync.needs_reset {
        issues.push(format!(
            "CRITICAL: local '{target_branch}' has diverged from origin/{target_branch}"
        ));
        fixes.push(format!(
            "git checkout {target_branch} && git reset --hard origin/{target_branch}"
        ));
    } else if target_sync.can_fast_forward {
        issues.push(format!(
            "Local '{target_branch}' is behind origin/{target_branch}"
        ));
        fixes.push(format!("git fetch origin {target_branch}:{target_branch}"));
    } else if !target_sync.local_exists && target_sync.remote_exists {
        issues.push(format!("Local branch '{target_branch}' is missing"));
        fixes.push(format!("git branch {target_branch} origin/{target_branch}"));
    }

    (issues, fixes)
}
