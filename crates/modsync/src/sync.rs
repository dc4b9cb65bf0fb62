//! Override sync
//!
//! Mirrors manually-managed override files into the output tree. Input
//! order is application order (generic overrides first, side-restricted
//! last), so a side-restricted override wins a shared destination by
//! being copied after the generic one.

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info};

use crate::error::{ActionError, Result};
use crate::http;
use crate::integrity::hash_file;
use crate::overrides::ProjectOverride;
use crate::progress::ErrorCallback;

/// Called once per override that lands in the output tree.
pub type SyncSuccessCallback = Arc<dyn Fn(&ProjectOverride, &Path) + Send + Sync>;

pub fn null_sync_success_callback() -> SyncSuccessCallback {
    Arc::new(|_, _| {})
}

/// Copy every override into `working_dir`.
///
/// Copies run sequentially in precedence order; a later override to the
/// same destination must observe the earlier one's bytes. Per-item
/// failures go to `on_error` and do not stop the pass. When
/// `sync_primary_directories` is set, an override naming a directory is
/// expanded to every file under it.
pub async fn sync(
    overrides: &[ProjectOverride],
    working_dir: &Path,
    on_error: ErrorCallback,
    on_success: SyncSuccessCallback,
    sync_primary_directories: bool,
) -> Option<ActionError> {
    if let Err(e) = fs::create_dir_all(working_dir).await {
        return Some(ActionError::fs(working_dir, e));
    }

    let mut copied = 0usize;
    let mut skipped = 0usize;

    for item in overrides {
        let source = item.full_source_path();

        if source.is_dir() {
            if !sync_primary_directories {
                debug!("skipping directory override {}", source.display());
                continue;
            }
            let files = match crate::overrides::walk_files(&source).await {
                Ok(files) => files,
                Err(e) => {
                    on_error(e);
                    continue;
                }
            };
            for rel in files {
                let expanded = ProjectOverride::new(
                    item.kind,
                    item.path.join(&rel),
                    &item.source_root,
                );
                copy_one(&expanded, working_dir, &on_error, &on_success, &mut copied, &mut skipped)
                    .await;
            }
            continue;
        }

        copy_one(item, working_dir, &on_error, &on_success, &mut copied, &mut skipped).await;
    }

    info!(copied, skipped, "override sync finished");
    None
}

async fn copy_one(
    item: &ProjectOverride,
    working_dir: &Path,
    on_error: &ErrorCallback,
    on_success: &SyncSuccessCallback,
    copied: &mut usize,
    skipped: &mut usize,
) {
    let source = item.full_source_path();
    let dest = item.full_output_path(working_dir);

    if !source.is_file() {
        on_error(ActionError::FileNotFound {
            path: source.display().to_string(),
        });
        return;
    }

    match same_contents(&source, &dest).await {
        Ok(true) => {
            *skipped += 1;
            on_error(ActionError::AlreadyExists {
                path: item.path.display().to_string(),
            });
            return;
        }
        Ok(false) => {}
        Err(e) => {
            on_error(e);
            return;
        }
    }

    if let Err(e) = copy_via_temp(&source, &dest).await {
        on_error(e);
        return;
    }

    *copied += 1;
    on_success(item, &dest);
}

/// Cheap size comparison first, content hash only on a size match.
async fn same_contents(source: &Path, dest: &Path) -> Result<bool> {
    if !dest.is_file() {
        return Ok(false);
    }

    let source_meta = fs::metadata(source)
        .await
        .map_err(|e| ActionError::fs(source, e))?;
    let dest_meta = fs::metadata(dest)
        .await
        .map_err(|e| ActionError::fs(dest, e))?;
    if source_meta.len() != dest_meta.len() {
        return Ok(false);
    }

    let source_hash = hash_file(source, "sha256").await?;
    let dest_hash = hash_file(dest, "sha256").await?;
    Ok(source_hash == dest_hash)
}

/// Copy through a temp file and rename, so the destination is never
/// partially written.
async fn copy_via_temp(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ActionError::fs(parent, e))?;
    }

    let temp = http::temp_path(dest);
    fs::copy(source, &temp)
        .await
        .map_err(|e| ActionError::fs(source, e))?;
    http::promote(&temp, dest).await
}
