//! Pure version-string vs branch-convention validation.
//!
//! Development-family branches are expected to carry a prerelease suffix
//! (`X.Y.Z-tag…`); release-family branches must be a bare `X.Y.Z`; any other
//! branch accepts either shape.

use regex::Regex;

use crate::model::VersionStatus;

const VERSION_SHAPE: &str = r"^\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?$";

const DEVELOPMENT_BRANCHES: &[&str] = &["dev", "develop", "development", "working"];
const RELEASE_BRANCHES: &[&str] = &["main", "master", "production", "release"];

/// The version shape a branch family expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpectedShape {
    Prerelease,
    Release,
    Either,
}

fn classify_branch(branch: &str) -> ExpectedShape {
    if DEVELOPMENT_BRANCHES.contains(&branch) {
        ExpectedShape::Prerelease
    } else if RELEASE_BRANCHES.contains(&branch) || branch.starts_with("release/") {
        ExpectedShape::Release
    } else {
        ExpectedShape::Either
    }
}

/// Validate `version` against the naming convention of `branch`.
///
/// No side effects, no I/O. Rules are applied in a fixed order: format
/// check first, then the family-specific shape checks.
pub fn validate_version_branch(version: &str, branch: &str) -> VersionStatus {
    let shape = Regex::new(VERSION_SHAPE).expect("version pattern is valid");
    if !shape.is_match(version) {
        return VersionStatus {
            version: version.to_string(),
            is_valid: false,
            issue: Some(format!("invalid version format: '{version}'")),
            fix: Some("Set a semver version (X.Y.Z or X.Y.Z-tag) in the manifest".to_string()),
        };
    }

    let is_prerelease = version.contains('-');
    match classify_branch(branch) {
        ExpectedShape::Prerelease if !is_prerelease => VersionStatus {
            version: version.to_string(),
            is_valid: false,
            issue: Some(format!(
                "release version '{version}' on development branch '{branch}'"
            )),
            fix: Some(format!(
                "Bump to a prerelease version (e.g. '{version}-dev.0') or merge to a release branch"
            )),
        },
        ExpectedShape::Release if is_prerelease => VersionStatus {
            version: version.to_string(),
            is_valid: false,
            issue: Some(format!(
                "development version '{version}' on release branch '{branch}'"
            )),
            fix: Some("Promote to a bare release version (X.Y.Z) before publishing".to_string()),
        },
        _ => VersionStatus {
            version: version.to_string(),
            is_valid: true,
            issue: None,
            fix: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerelease_on_development_branch_is_valid() {
        let status = validate_version_branch("1.2.3-dev.0", "working");
        assert!(status.is_valid);
        assert!(status.issue.is_none());
    }

    #[test]
    fn test_release_version_on_development_branch_is_invalid() {
        let status = validate_version_branch("1.2.3", "working");
        assert!(!status.is_valid);
        assert!(status.issue.as_deref().unwrap().contains("development branch"));
        assert!(status.fix.is_some());
    }

    #[test]
    fn test_release_version_on_main_is_valid() {
        let status = validate_version_branch("1.2.3", "main");
        assert!(status.is_valid);
    }

    #[test]
    fn test_prerelease_on_main_is_invalid() {
        let status = validate_version_branch("1.2.3-dev.0", "main");
        assert!(!status.is_valid);
        assert!(status.issue.as_deref().unwrap().contains("release branch"));
    }

    #[test]
    fn test_other_family_accepts_both_shapes() {
        assert!(validate_version_branch("1.2.3", "feature/x").is_valid);
        assert!(validate_version_branch("1.2.3-rc.1", "feature/x").is_valid);
    }

    #[test]
    fn test_malformed_version_is_invalid_format() {
        let status = validate_version_branch("bad-version", "main");
        assert!(!status.is_valid);
        assert!(status.issue.as_deref().unwrap().contains("invalid version format"));
    }

    #[test]
    fn test_format_check_runs_before_family_rules() {
        // Malformed on a development branch reports format, not family.
        let status = validate_version_branch("1.2", "working");
        assert!(!status.is_valid);
        assert!(status.issue.as_deref().unwrap().contains("invalid version format"));
    }

    #[test]
    fn test_all_development_family_names() {
        for branch in ["dev", "develop", "development", "working"] {
            assert!(
                !validate_version_branch("1.0.0", branch).is_valid,
                "bare release version should be rejected on '{branch}'"
            );
            assert!(validate_version_branch("1.0.0-beta.1", branch).is_valid);
        }
    }

    #[test]
    fn test_all_release_family_names_including_release_prefix() {
        for branch in ["main", "master", "production", "release", "release/2.0"] {
            assert!(
                !validate_version_branch("1.0.0-beta.1", branch).is_valid,
                "prerelease should be rejected on '{branch}'"
            );
            assert!(validate_version_branch("1.0.0", branch).is_valid);
        }
    }

    #[test]
    fn test_prerelease_with_dotted_tag_matches_shape() {
        assert!(validate_version_branch("10.20.30-alpha.beta.1", "dev").is_valid);
    }
}
