//! fleetaudit - fleet branch audit CLI
//!
//! ## Commands
//!
//! - `audit`: audit the branch synchronization state of a set of package
//!   checkouts and print a priority-ordered remediation plan
//! - `sync`: apply the minimal checkout → pull → push sequence to one
//!   repository

mod backend;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

use backend::{FsManifestReader, GitCli, GitHubPrLookup};
use fleetaudit_core::{
    auto_sync, init_tracing, render_report, AuditOptions, FleetAuditor, GitRunner, ManifestReader,
    Package, SyncPlan, DEFAULT_CONCURRENCY,
};

#[derive(Parser)]
#[command(name = "fleetaudit")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pre-release branch synchronization audit for package fleets", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit the branch state of package checkouts
    Audit {
        /// Package checkout paths (default: current directory)
        paths: Vec<PathBuf>,

        /// Shared release-target branch
        #[arg(long, default_value = "main")]
        target_branch: String,

        /// Expected working branch (default: most common branch in the fleet)
        #[arg(long)]
        expected_branch: Option<String>,

        /// Skip the open-pull-request lookup
        #[arg(long)]
        no_pr: bool,

        /// Skip the merge-conflict probe
        #[arg(long)]
        no_conflicts: bool,

        /// Skip version/branch validation
        #[arg(long)]
        no_versions: bool,

        /// Concurrency ceiling for probing
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Check out, pull and push one repository
    Sync {
        /// Repository path
        path: PathBuf,

        /// Branch to check out first
        #[arg(long)]
        checkout: Option<String>,

        /// Skip the pull step
        #[arg(long)]
        no_pull: bool,

        /// Push after pulling
        #[arg(long)]
        push: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json_logs, level);

    match cli.command {
        Commands::Audit {
            paths,
            target_branch,
            expected_branch,
            no_pr,
            no_conflicts,
            no_versions,
            concurrency,
            json,
        } => {
            let options = AuditOptions {
                target_branch,
                expected_branch,
                check_pr: !no_pr,
                check_conflicts: !no_conflicts,
                check_versions: !no_versions,
                concurrency,
            };
            run_audit(paths, options, json).await
        }
        Commands::Sync {
            path,
            checkout,
            no_pull,
            push,
        } => run_sync(path, checkout, no_pull, push).await,
    }
}

async fn run_audit(paths: Vec<PathBuf>, options: AuditOptions, json: bool) -> Result<()> {
    let git: Arc<dyn GitRunner> = Arc::new(GitCli);
    let manifests = Arc::new(FsManifestReader);
    let prs = Arc::new(GitHubPrLookup::new(Arc::clone(&git)));

    let paths = if paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        paths
    };
    let packages = build_packages(paths, manifests.as_ref()).await;

    let auditor = FleetAuditor::new(git, manifests, prs, options);
    let report = auditor.audit(packages).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }

    if report.issues_found > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Package names come from the manifest when one is present, else the
/// directory name.
async fn build_packages(paths: Vec<PathBuf>, manifests: &FsManifestReader) -> Vec<Package> {
    let mut packages = Vec::with_capacity(paths.len());
    for path in paths {
        let manifest_name = match manifests.read(&path).await {
            Ok(Some(manifest)) => manifest.name,
            _ => None,
        };
        let name = manifest_name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string())
        });
        packages.push(Package::new(name, path));
    }
    packages
}

async fn run_sync(path: PathBuf, checkout: Option<String>, no_pull: bool, push: bool) -> Result<()> {
    let plan = SyncPlan {
        checkout,
        pull: !no_pull,
        push,
    };
    let outcome = auto_sync(&GitCli, &path, &plan).await;

    for action in &outcome.actions {
        println!("✓ {action}");
    }
    if let Some(error) = &outcome.error {
        eprintln!("✗ {error}");
        std::process::exit(1);
    }
    Ok(())
}
