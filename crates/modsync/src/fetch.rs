//! Concurrent fetch engine
//!
//! Downloads a batch of resolved files into the output tree. The batch
//! total is fixed up front; per-file failures are reported through the
//! error callback and never abort sibling downloads. Only a failed
//! precondition (the working directory cannot be created) aborts the
//! whole batch.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::data::config_file::ConfigFile;
use crate::data::dirs::Dirs;
use crate::data::lock_file::LockFile;
use crate::data::project::ProjectFile;
use crate::error::{ActionError, Result};
use crate::http;
use crate::integrity::IntegrityCheck;
use crate::progress::{ErrorCallback, FetchCallback, FetchEvent};

/// Concurrent in-flight downloads.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Called once per file that lands in the output tree.
pub type SuccessCallback = Arc<dyn Fn(&Path, &ProjectFile) + Send + Sync>;

pub fn null_success_callback() -> SuccessCallback {
    Arc::new(|_, _| {})
}

/// Batch counters, updated from concurrent downloads.
#[derive(Debug, Default)]
pub struct FetchMetrics {
    total_bytes: AtomicU64,
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    retries: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchMetricsSnapshot {
    pub total_bytes: u64,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub retries: usize,
}

impl FetchMetrics {
    fn record_download(&self, bytes: u64) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FetchMetricsSnapshot {
        FetchMetricsSnapshot {
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_millis(1000 * (1u64 << (attempt.saturating_sub(1)).min(5)))
}

/// Fetch every file in `files` into the working directory.
///
/// Emits `FetchEvent::Progress` with a monotone `(completed, total)`
/// pair after every file reaches a terminal state, including skips and
/// failures. Returns `Some` only when the batch cannot start at all.
pub async fn fetch(
    files: &[ProjectFile],
    lock_file: &LockFile,
    config: Option<&ConfigFile>,
    dirs: &Dirs,
    retry_limit: usize,
    on_event: FetchCallback,
    on_success: SuccessCallback,
    on_error: ErrorCallback,
) -> Option<ActionError> {
    if let Err(e) = fs::create_dir_all(&dirs.working_dir).await {
        return Some(ActionError::fs(&dirs.working_dir, e));
    }

    let total = files.len() as u64;
    let completed = AtomicU64::new(0);
    let metrics = FetchMetrics::default();

    let downloads = files.iter().map(|file| {
        let on_event = on_event.clone();
        let on_success = on_success.clone();
        let on_error = on_error.clone();
        let completed = &completed;
        let metrics = &metrics;
        async move {
            fetch_one(
                file,
                lock_file,
                config,
                dirs,
                retry_limit,
                metrics,
                &on_event,
                &on_success,
                &on_error,
            )
            .await;

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            on_event(FetchEvent::Progress {
                completed: done,
                total,
            });
        }
    });

    stream::iter(downloads)
        .buffer_unordered(DEFAULT_CONCURRENCY)
        .collect::<Vec<()>>()
        .await;

    let snapshot = metrics.snapshot();
    info!(
        downloaded = snapshot.downloaded,
        skipped = snapshot.skipped,
        failed = snapshot.failed,
        retries = snapshot.retries,
        bytes = snapshot.total_bytes,
        "fetch batch finished"
    );
    None
}

#[allow(clippy::too_many_arguments)]
async fn fetch_one(
    file: &ProjectFile,
    lock_file: &LockFile,
    config: Option<&ConfigFile>,
    dirs: &Dirs,
    retry_limit: usize,
    metrics: &FetchMetrics,
    on_event: &FetchCallback,
    on_success: &SuccessCallback,
    on_error: &ErrorCallback,
) {
    let Some(rel_path) = file.relative_output_path(lock_file, config) else {
        metrics.record_failure();
        on_error(ActionError::ProjectNotFound {
            input: file.file_name.clone(),
        });
        return;
    };
    let dest = dirs.working_dir.join(&rel_path);

    if dest.is_file() {
        match file.integrity.matches(&dest).await {
            Ok(true) => {
                metrics.record_skip();
                on_error(ActionError::AlreadyExists {
                    path: rel_path.display().to_string(),
                });
                return;
            }
            Ok(false) => {
                // Stale artifact; replace it with the declared version.
                debug!("replacing stale file {}", dest.display());
                if let Err(e) = fs::remove_file(&dest).await {
                    metrics.record_failure();
                    on_error(ActionError::fs(&dest, e));
                    return;
                }
            }
            Err(e) => {
                metrics.record_failure();
                on_error(e);
                return;
            }
        }
    }

    let Some(url) = file.url.as_deref() else {
        metrics.record_failure();
        on_error(ActionError::NoUrl {
            file_name: file.file_name.clone(),
        });
        return;
    };

    let max_attempts = retry_limit + 1;
    let mut last_reason = String::new();
    for attempt in 1..=max_attempts {
        if attempt > 1 {
            metrics.record_retry();
            on_event(FetchEvent::Retry {
                url: url.to_string(),
                attempt,
                max_attempts,
            });
            tokio::time::sleep(backoff_delay(attempt - 1)).await;
        }

        match download_and_verify(url, &dest, file).await {
            Ok(bytes) => {
                metrics.record_download(bytes);
                on_success(&dest, file);
                return;
            }
            // URL and filesystem problems will not heal on retry.
            Err(e @ ActionError::InvalidUrl { .. }) | Err(e @ ActionError::FileSystem { .. }) => {
                metrics.record_failure();
                on_error(e);
                return;
            }
            Err(e) => {
                warn!("attempt {}/{} for {} failed: {}", attempt, max_attempts, url, e);
                last_reason = e.to_string();
            }
        }
    }

    metrics.record_failure();
    on_error(ActionError::DownloadFailed {
        url: url.to_string(),
        attempts: max_attempts,
        reason: last_reason,
    });
}

/// Download to a temp file, verify, then promote into place. The
/// destination is never visible in a partial or corrupt state.
async fn download_and_verify(url: &str, dest: &Path, file: &ProjectFile) -> Result<u64> {
    let temp = http::temp_path(dest);
    let bytes = http::download_to(url, &temp).await?;

    match file.integrity.check(&temp).await? {
        IntegrityCheck::Ok => {}
        IntegrityCheck::SizeMismatch { expected, actual } => {
            let _ = fs::remove_file(&temp).await;
            return Err(ActionError::SizeMismatch {
                path: dest.to_path_buf(),
                expected,
                actual,
            });
        }
        IntegrityCheck::HashMismatch {
            expected, actual, ..
        } => {
            let _ = fs::remove_file(&temp).await;
            return Err(ActionError::HashMismatch {
                path: dest.to_path_buf(),
                expected,
                actual,
            });
        }
    }

    http::promote(&temp, dest).await?;
    Ok(bytes)
}
