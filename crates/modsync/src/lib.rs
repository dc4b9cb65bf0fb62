//! Declarative modpack reconciliation
//!
//! The lock file declares what a modpack should contain; this crate
//! makes a directory match it. A pass resolves each declared project
//! against its hosting platforms, fetches the selected files and syncs
//! manually-managed overrides concurrently, then archives or deletes
//! whatever is left over. Per-item failures are reported through
//! callbacks and never abort sibling work.

pub mod data;
pub mod error;
pub mod export;
pub mod fetch;
pub mod http;
pub mod integrity;
pub mod overrides;
pub mod platforms;
pub mod progress;
pub mod reconcile;
pub mod remote;
pub mod resolve;
pub mod sync;

pub use data::{
    ConfigFile, Dirs, LockFile, Project, ProjectFile, ProjectSide, ProjectType,
    CONFIG_FILE_NAME, LOCK_FILE_NAME, STATE_DIR_NAME,
};
pub use error::{ActionError, ErrorSeverity, Result};
pub use export::ExportProfile;
pub use fetch::{fetch, FetchMetrics, FetchMetricsSnapshot};
pub use overrides::{OverrideType, ProjectOverride};
pub use platforms::{get_provider, providers, Multiplatform, Provider};
pub use progress::{FetchCallback, FetchEvent, TaskProgress};
pub use reconcile::{delete_old_files, DeletionActionType};
pub use remote::{remote_install, remote_update, GitRemote, ReconcileSummary};
pub use resolve::{resolve, retrieve_project_files};
pub use sync::sync;

#[cfg(test)]
mod tests;
