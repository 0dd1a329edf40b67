//! Real collaborator backends: git subprocess, filesystem manifests, and
//! the GitHub pull-request lookup.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use fleetaudit_core::{
    AuditError, GitOutput, GitRunner, Manifest, ManifestReader, PrLookup, PullRequestRef,
    Result, REMOTE_NAME,
};

/// Runs git as a subprocess via tokio, erroring on non-zero exit.
pub struct GitCli;

#[async_trait]
impl GitRunner for GitCli {
    async fn run(&self, args: &[&str], cwd: &Path, quiet: bool) -> Result<GitOutput> {
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| AuditError::Git {
                path: cwd.display().to_string(),
                detail: format!("failed to run git: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if !quiet {
                debug!(path = %cwd.display(), args = ?args, "git command failed: {stderr}");
            }
            let detail = if stderr.is_empty() {
                format!("git {} exited with {}", args.join(" "), output.status)
            } else {
                stderr
            };
            return Err(AuditError::Git {
                path: cwd.display().to_string(),
                detail,
            });
        }

        Ok(GitOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Reads `Cargo.toml` first, falling back to `package.json`.
pub struct FsManifestReader;

#[async_trait]
impl ManifestReader for FsManifestReader {
    async fn read(&self, dir: &Path) -> Result<Option<Manifest>> {
        let cargo = dir.join("Cargo.toml");
        if let Ok(text) = tokio::fs::read_to_string(&cargo).await {
            let value: toml::Value = text.parse().map_err(|e: toml::de::Error| {
                AuditError::Manifest {
                    path: cargo.display().to_string(),
                    detail: e.to_string(),
                }
            })?;
            let package = value.get("package");
            return Ok(Some(Manifest {
                name: package
                    .and_then(|p| p.get("name"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                version: package
                    .and_then(|p| p.get("version"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
            }));
        }

        let package_json = dir.join("package.json");
        if let Ok(text) = tokio::fs::read_to_string(&package_json).await {
            let value: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| AuditError::Manifest {
                    path: package_json.display().to_string(),
                    detail: e.to_string(),
                })?;
            return Ok(Some(Manifest {
                name: value.get("name").and_then(|v| v.as_str()).map(String::from),
                version: value
                    .get("version")
                    .and_then(|v| v.as_str())
                    .map(String::from),
            }));
        }

        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct PullRequestItem {
    html_url: String,
    number: u64,
}

/// Looks up open pull requests through the GitHub REST API.
///
/// The repository slug is parsed from the `origin` remote URL; repositories
/// not hosted on GitHub simply answer "no PR". A missing `GITHUB_TOKEN`
/// still works for public repositories.
pub struct GitHubPrLookup {
    client: reqwest::Client,
    token: Option<String>,
    git: Arc<dyn GitRunner>,
    api_base: String,
}

impl GitHubPrLookup {
    pub fn new(git: Arc<dyn GitRunner>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fleetaudit/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            token: std::env::var("GITHUB_TOKEN").ok(),
            git,
            api_base: "https://api.github.com".to_string(),
        }
    }

    async fn origin_slug(&self, path: &Path) -> Option<String> {
        let out = self
            .git
            .run(&["remote", "get-url", REMOTE_NAME], path, true)
            .await
            .ok()?;
        parse_github_slug(out.stdout.trim())
    }
}

#[async_trait]
impl PrLookup for GitHubPrLookup {
    async fn find_open_by_head_ref(
        &self,
        branch: &str,
        path: &Path,
    ) -> Result<Option<PullRequestRef>> {
        let Some(slug) = self.origin_slug(path).await else {
            debug!(path = %path.display(), "origin is not a GitHub remote; skipping PR lookup");
            return Ok(None);
        };
        let owner = slug.split('/').next().unwrap_or("");
        let head = format!("{owner}:{branch}");
        let url = format!("{}/repos/{slug}/pulls", self.api_base);

        let mut request = self
            .client
            .get(&url)
            .query(&[("state", "open"), ("head", head.as_str())])
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| AuditError::PrLookup {
            branch: branch.to_string(),
            detail: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(AuditError::PrLookup {
                branch: branch.to_string(),
                detail: format!("GitHub API returned {}", response.status()),
            });
        }

        let items: Vec<PullRequestItem> =
            response.json().await.map_err(|e| AuditError::PrLookup {
                branch: branch.to_string(),
                detail: e.to_string(),
            })?;
        Ok(items.into_iter().next().map(|item| PullRequestRef {
            html_url: item.html_url,
            number: item.number,
        }))
    }
}

/// Extract `owner/repo` from the common GitHub remote URL shapes.
pub fn parse_github_slug(url: &str) -> Option<String> {
    let rest = if let Some(rest) = url.strip_prefix("git@github.com:") {
        rest
    } else if let Some(rest) = url.strip_prefix("ssh://git@github.com/") {
        rest
    } else if let Some(rest) = url.strip_prefix("https://github.com/") {
        rest
    } else if let Some(rest) = url.strip_prefix("http://github.com/") {
        rest
    } else {
        return None;
    };
    let slug = rest.trim_end_matches('/').trim_end_matches(".git");
    let mut parts = slug.splitn(2, '/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    if repo.contains('/') {
        return None;
    }
    Some(format!("{owner}/{repo}"))
}
