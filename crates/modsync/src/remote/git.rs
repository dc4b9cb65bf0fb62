//! Git transport seam
//!
//! The remote bootstrap only needs clone and update; everything else is
//! behind this trait so tests (and alternative transports) can supply
//! their own implementation. Failures carry an opaque reason string;
//! the caller wraps them into the shared error taxonomy.

use std::path::Path;

use async_trait::async_trait;

use crate::progress::TaskProgress;

#[async_trait]
pub trait GitRemote: Send + Sync {
    /// Clone `url` into `dir`, which must not already hold a clone.
    async fn clone_repo(
        &self,
        url: &str,
        dir: &Path,
        branch: Option<&str>,
        on_progress: &TaskProgress,
    ) -> std::result::Result<(), String>;

    /// Bring an existing clone in `dir` up to date with its remote,
    /// discarding local changes.
    async fn update_repo(
        &self,
        dir: &Path,
        branch: Option<&str>,
        on_progress: &TaskProgress,
    ) -> std::result::Result<(), String>;
}
