//! Repository deduplication: packages sharing a physical repository are
//! fetched once, not once per package.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::warn;

use crate::model::Package;
use crate::probe::RepoProber;

/// Resolve the repository root of every package and reduce to the unique
/// set, preserving first-seen order.
///
/// Packages whose root cannot be resolved are excluded from the shared
/// fetch (degraded, not fatal) — they are still audited individually later.
pub async fn unique_repository_roots(packages: &[Package], prober: &RepoProber) -> Vec<PathBuf> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut roots = Vec::new();
    for package in packages {
        match prober.repository_root(&package.path).await {
            Some(root) => {
                if seen.insert(root.clone()) {
                    roots.push(root);
                }
            }
            None => {
                warn!(
                    package = %package.name,
                    path = %package.path.display(),
                    "could not resolve repository root; excluding from shared fetch"
                );
            }
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuditError, Result};
    use crate::probe::{GitOutput, GitRunner};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    /// Maps package paths to repository roots; unmapped paths fail.
    struct RootsByPath {
        roots: HashMap<PathBuf, String>,
    }

    #[async_trait]
    impl GitRunner for RootsByPath {
        async fn run(&self, args: &[&str], cwd: &Path, _quiet: bool) -> Result<GitOutput> {
            assert_eq!(args.join(" "), "rev-parse --show-toplevel");
            match self.roots.get(cwd) {
                Some(root) => Ok(GitOutput {
                    stdout: format!("{root}\n"),
                    stderr: String::new(),
                }),
                None => Err(AuditError::Git {
                    path: cwd.display().to_string(),
                    detail: "not a git repository".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_packages_sharing_a_root_collapse_to_one_entry() {
        let roots: HashMap<PathBuf, String> = [
            (PathBuf::from("/mono/pkg-a"), "/mono".to_string()),
            (PathBuf::from("/mono/pkg-b"), "/mono".to_string()),
            (PathBuf::from("/solo"), "/solo".to_string()),
        ]
        .into_iter()
        .collect();
        let prober = RepoProber::new(Arc::new(RootsByPath { roots }));

        let packages = vec![
            Package::new("a", "/mono/pkg-a"),
            Package::new("b", "/mono/pkg-b"),
            Package::new("c", "/solo"),
        ];
        let unique = unique_repository_roots(&packages, &prober).await;
        assert_eq!(unique, vec![PathBuf::from("/mono"), PathBuf::from("/solo")]);
    }

    #[tokio::test]
    async fn test_unresolvable_root_is_excluded_not_fatal() {
        let roots: HashMap<PathBuf, String> =
            [(PathBuf::from("/ok"), "/ok".to_string())].into_iter().collect();
        let prober = RepoProber::new(Arc::new(RootsByPath { roots }));

        let packages = vec![Package::new("bad", "/not-a-repo"), Package::new("ok", "/ok")];
        let unique = unique_repository_roots(&packages, &prober).await;
        assert_eq!(unique, vec![PathBuf::from("/ok")]);
    }

    #[tokio::test]
    async fn test_first_seen_order_is_preserved() {
        let roots: HashMap<PathBuf, String> = [
            (PathBuf::from("/z"), "/z".to_string()),
            (PathBuf::from("/a"), "/a".to_string()),
        ]
        .into_iter()
        .collect();
        let prober = RepoProber::new(Arc::new(RootsByPath { roots }));

        let packages = vec![Package::new("z", "/z"), Package::new("a", "/a")];
        let unique = unique_repository_roots(&packages, &prober).await;
        assert_eq!(unique, vec![PathBuf::from("/z"), PathBuf::from("/a")]);
    }
}
