//! fleetaudit core library
//!
//! Audits the branch synchronization state of many independent repositories
//! (a fleet of packages) before a coordinated release and produces
//! machine-actionable remediation instructions: which packages are safe to
//! publish right now, and for the rest, exactly what commands fix them and
//! in what order.
//!
//! The audit is a point-in-time snapshot, not a lock: it never mutates a
//! repository's working tree or index, and the remote state it observes may
//! change afterwards. The only mutating operation is the explicitly
//! requested [`sync::auto_sync`].

pub mod dedupe;
pub mod error;
pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod sync;
pub mod telemetry;
pub mod version;

pub use dedupe::unique_repository_roots;
pub use error::{AuditError, Result};
pub use executor::map_bounded;
pub use model::{
    AuditOptions, AuditReport, BranchStatus, Package, PackageAudit, PullRequestRef, SyncOutcome,
    SyncPlan, TargetBranchSync, VersionStatus, DEFAULT_CONCURRENCY, DEFAULT_TARGET_BRANCH,
};
pub use orchestrator::FleetAuditor;
pub use probe::{
    GitOutput, GitRunner, Manifest, ManifestReader, PrLookup, RepoProber, NON_GIT_BRANCH,
    REMOTE_NAME, UNKNOWN_BRANCH,
};
pub use report::render_report;
pub use sync::auto_sync;
pub use telemetry::init_tracing;
pub use version::validate_version_branch;

/// fleetaudit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
