//! Human-readable remediation report rendering.
//!
//! Pure transformation of an [`AuditReport`] into a priority-ordered action
//! plan. The final numbered workflow puts target-branch sync first because
//! every other check is computed against the fetched target state — fixing
//! it first keeps a re-run honest.

use crate::model::{AuditReport, PackageAudit};

/// Display cap for the "good packages" listing.
const GOOD_DISPLAY_CAP: usize = 10;

/// Render the full remediation report as plain text.
pub fn render_report(report: &AuditReport) -> String {
    let mut out = String::new();

    out.push_str("# Fleet Branch Audit\n\n");
    out.push_str(&format!(
        "Packages: {} total, {} good, {} with issues\n",
        report.total_packages, report.good_packages, report.issues_found
    ));
    out.push_str(&format!("Expected branch: {}\n", report.expected_branch));
    out.push_str(&format!("Target branch: {}\n", report.target_branch));

    render_good_section(report, &mut out);
    render_version_section(report, &mut out);
    render_target_sync_section(report, &mut out);
    render_warning_section(report, &mut out);
    render_detail_section(report, &mut out);
    render_workflow(report, &mut out);

    out
}

fn render_good_section(report: &AuditReport, out: &mut String) {
    let good: Vec<&PackageAudit> = report.audits.iter().filter(|a| a.is_good()).collect();
    if good.is_empty() {
        return;
    }
    out.push_str("\n## Ready to publish\n\n");
    for audit in good.iter().take(GOOD_DISPLAY_CAP) {
        out.push_str(&format!("- {} (on '{}')\n", audit.package_name, audit.status.name));
    }
    if good.len() > GOOD_DISPLAY_CAP {
        out.push_str(&format!("  … and {} more\n", good.len() - GOOD_DISPLAY_CAP));
    }
}

fn render_version_section(report: &AuditReport, out: &mut String) {
    if report.version_issues == 0 {
        return;
    }
    out.push_str("\n## Version issues\n\n");
    for audit in &report.audits {
        if let Some(vs) = &audit.version_status {
            if !vs.is_valid {
                out.push_str(&format!(
                    "- {}: {}\n",
                    audit.package_name,
                    vs.issue.as_deref().unwrap_or("version does not fit its branch")
                ));
            }
        }
    }
}

fn render_target_sync_section(report: &AuditReport, out: &mut String) {
    if report.target_sync_issues == 0 {
        return;
    }
    out.push_str("\n## Target branch out of sync\n\n");
    for audit in &report.audits {
        if let Some(sync) = &audit.target_sync {
            if sync.is_out_of_sync() {
                let kind = if sync.needs_reset {
                    "diverged, needs reset"
                } else if sync.can_fast_forward {
                    "behind, can fast-forward"
                } else {
                    "out of sync"
                };
                out.push_str(&format!(
                    "- {}: '{}' {}\n",
                    audit.package_name, sync.target_branch, kind
                ));
            }
        }
    }
}

fn render_warning_section(report: &AuditReport, out: &mut String) {
    let warned: Vec<&PackageAudit> = report
        .audits
        .iter()
        .filter(|a| !a.warnings.is_empty())
        .collect();
    if warned.is_empty() {
        return;
    }
    // "We couldn't check this" is kept apart from "this is broken".
    out.push_str("\n## Warnings\n\n");
    for audit in warned {
        for warning in &audit.warnings {
            out.push_str(&format!("- {}: {warning}\n", audit.package_name));
        }
    }
}

fn render_detail_section(report: &AuditReport, out: &mut String) {
    let mut flagged: Vec<&PackageAudit> =
        report.audits.iter().filter(|a| !a.is_good()).collect();
    if flagged.is_empty() {
        return;
    }
    // Stable sort: equal severities keep input package order.
    flagged.sort_by(|a, b| severity(b).cmp(&severity(a)));

    out.push_str("\n## Packages needing attention\n\n");
    for audit in flagged {
        out.push_str(&format!(
            "### {} (on '{}')\n",
            audit.package_name, audit.status.name
        ));
        for (i, issue) in audit.issues.iter().enumerate() {
            out.push_str(&format!("- {issue}\n"));
            if let Some(fix) = audit.fixes.get(i) {
                out.push_str(&format!("  fix: {fix}\n"));
            }
        }
        out.push('\n');
    }
}

/// Merge conflicts dominate, then open PRs, then sheer issue count (which
/// follows derivation order).
fn severity(audit: &PackageAudit) -> u32 {
    let mut score = audit.issues.len() as u32;
    if audit.status.has_merge_conflicts {
        score += 1000;
    }
    if audit.status.has_open_pr {
        score += 500;
    }
    if audit.target_sync.as_ref().is_some_and(|t| t.needs_reset) {
        score += 250;
    }
    score
}

fn render_workflow(report: &AuditReport, out: &mut String) {
    if report.issues_found == 0 {
        out.push_str("\nAll packages are in sync. Safe to publish.\n");
        return;
    }

    let any = |pred: &dyn Fn(&PackageAudit) -> bool| report.audits.iter().any(pred);
    let mut steps: Vec<&str> = Vec::new();

    if any(&|a| a.target_sync.as_ref().is_some_and(|t| t.is_out_of_sync())) {
        steps.push("Sync target branches (reset diverged, fast-forward stale) so later checks compare against fresh state");
    }
    if any(&|a| a.status.has_merge_conflicts) {
        steps.push("Resolve merge conflicts (blocking)");
    }
    if any(&|a| a.version_status.as_ref().is_some_and(|v| !v.is_valid)) {
        steps.push("Fix version/branch mismatches");
    }
    if any(&|a| a.status.has_open_pr) {
        steps.push("Review open pull requests before pushing further changes");
    }
    if any(&|a| !a.status.is_on_expected_branch && !a.issues.is_empty()) {
        steps.push("Check out the expected branch where packages drifted");
    }
    if any(&|a| a.status.has_unpushed_commits || a.status.needs_sync) {
        steps.push("Sync with remotes (git pull, then git push)");
    }
    if any(&|a| !a.status.remote_exists && !a.issues.is_empty()) {
        steps.push("Create missing remote branches (git push -u origin <branch>)");
    }

    out.push_str("\n## Suggested workflow\n\n");
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!("{}. {step}\n", i + 1));
    }
}
