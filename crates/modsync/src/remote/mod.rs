//! Remote-bootstrap orchestration
//!
//! A modpack can be installed from a git repository holding the lock
//! file and override folders. The clone lives in the hidden state
//! directory; every update is clone-then-reconcile, where reconcile is
//! the fixed pipeline: resolve, then fetch and sync concurrently, then
//! stale-file cleanup strictly after both.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::fs;
use tracing::{error, info, warn};

pub mod git;
pub use git::GitRemote;

use crate::data::config_file::ConfigFile;
use crate::data::dirs::Dirs;
use crate::data::lock_file::LockFile;
use crate::error::{ActionError, ErrorSeverity, Result};
use crate::export::ExportProfile;
use crate::fetch;
use crate::overrides;
use crate::platforms::Provider;
use crate::progress::{FetchCallback, FetchEvent, TaskProgress};
use crate::reconcile::{self, DeletionActionType};
use crate::resolve;
use crate::sync;

/// Outcome of one full reconciliation pass. `errors` holds every
/// non-soft per-item failure; soft skips are counted, not errored.
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub fetched: usize,
    pub synced: usize,
    pub deleted: usize,
    pub shelved: usize,
    pub skipped: usize,
    pub errors: Vec<ActionError>,
}

impl ReconcileSummary {
    /// A pass with per-item failures still completed; callers decide
    /// how loudly to report them.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Does `url` look like a git remote we can bootstrap from?
pub fn is_remote_url(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    if parsed.path().ends_with(".git") {
        return true;
    }
    matches!(
        parsed.host_str(),
        Some(host) if host == "github.com"
            || host.ends_with(".github.com")
            || host == "gitlab.com"
            || host.ends_with(".gitlab.com")
    )
}

/// A directory is installable when nothing but the hidden state
/// directory lives in it.
pub async fn working_dir_is_empty(dirs: &Dirs) -> Result<bool> {
    if !dirs.working_dir.is_dir() {
        return Ok(true);
    }
    let mut entries = fs::read_dir(&dirs.working_dir)
        .await
        .map_err(|e| ActionError::fs(&dirs.working_dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ActionError::fs(&dirs.working_dir, e))?
    {
        if entry.path() != dirs.state_dir() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Bootstrap a modpack from a git remote into an uninitialized
/// directory, then run one full reconciliation pass.
///
/// Preconditions are checked in a fixed order: an existing remote wins
/// over a non-empty directory, which wins over a malformed URL.
#[allow(clippy::too_many_arguments)]
pub async fn remote_install(
    git: &dyn GitRemote,
    provider: &dyn Provider,
    dirs: &Dirs,
    url: &str,
    branch: Option<&str>,
    retry_limit: usize,
    profile: &ExportProfile,
    on_progress: &TaskProgress,
    on_event: FetchCallback,
) -> Result<ReconcileSummary> {
    if dirs.remote_dir().is_dir() {
        return Err(ActionError::RemoteAlreadyExists {
            url: url.to_string(),
        });
    }
    if LockFile::exists_at(&dirs.lock_file_path()) || !working_dir_is_empty(dirs).await? {
        return Err(ActionError::CouldNotInstallRemote {
            url: url.to_string(),
        });
    }
    if !is_remote_url(url) {
        return Err(ActionError::InvalidUrl {
            url: url.to_string(),
        });
    }

    let remote_dir = dirs.remote_dir();
    fs::create_dir_all(&remote_dir)
        .await
        .map_err(|e| ActionError::fs(&remote_dir, e))?;

    if let Err(reason) = git.clone_repo(url, &remote_dir, branch, on_progress).await {
        let _ = fs::remove_dir_all(&remote_dir).await;
        return Err(ActionError::GitUpdate {
            dir: remote_dir,
            reason,
        });
    }

    if !LockFile::exists_at(&dirs.remote_lock_file_path()) {
        let _ = fs::remove_dir_all(&remote_dir).await;
        return Err(ActionError::FileNotFound {
            path: dirs.remote_lock_file_path().display().to_string(),
        });
    }

    info!(url, "remote installed, starting first reconciliation");
    run_reconcile(provider, dirs, retry_limit, profile, on_progress, on_event).await
}

/// Pull the latest remote state and reconcile the output tree to it.
#[allow(clippy::too_many_arguments)]
pub async fn remote_update(
    git: &dyn GitRemote,
    provider: &dyn Provider,
    dirs: &Dirs,
    branch: Option<&str>,
    retry_limit: usize,
    profile: &ExportProfile,
    on_progress: &TaskProgress,
    on_event: FetchCallback,
) -> Result<ReconcileSummary> {
    let remote_dir = dirs.remote_dir();
    if !remote_dir.is_dir() {
        return Err(ActionError::FileNotFound {
            path: remote_dir.display().to_string(),
        });
    }

    git.update_repo(&remote_dir, branch, on_progress)
        .await
        .map_err(|reason| ActionError::GitUpdate {
            dir: remote_dir.clone(),
            reason,
        })?;

    run_reconcile(provider, dirs, retry_limit, profile, on_progress, on_event).await
}

/// One full pass against the current remote clone. Fetch and sync run
/// concurrently; stale-file cleanup starts only after both finish, so
/// it observes the final output tree.
async fn run_reconcile(
    provider: &dyn Provider,
    dirs: &Dirs,
    retry_limit: usize,
    profile: &ExportProfile,
    on_progress: &TaskProgress,
    on_event: FetchCallback,
) -> Result<ReconcileSummary> {
    let lock_file = LockFile::read_from(&dirs.remote_lock_file_path()).await?;
    let config = ConfigFile::read_or_default(&dirs.remote_config_file_path()).await?;

    let errors: Arc<Mutex<Vec<ActionError>>> = Arc::new(Mutex::new(Vec::new()));
    let skipped = Arc::new(AtomicUsize::new(0));

    on_progress(Some("resolve"), 0);
    let mut files = Vec::new();
    for result in
        resolve::retrieve_project_files(&lock_file, provider, 1, Some(profile.side)).await
    {
        match result {
            Ok(file) => files.push(file),
            Err(e) => errors.lock().unwrap().push(e),
        }
    }
    on_progress(Some("resolve"), 100);

    let manual_overrides = overrides::read_manual_overrides(
        &dirs.remote_dir(),
        Some(&config),
        Some(&profile.allowed_overrides),
    )
    .await?;

    let collect_error: crate::progress::ErrorCallback = {
        let errors = errors.clone();
        let skipped = skipped.clone();
        Arc::new(move |e: ActionError| {
            if e.is_soft() {
                skipped.fetch_add(1, Ordering::Relaxed);
            } else {
                match e.severity() {
                    ErrorSeverity::Fatal => error!("{}: {}", e.category(), e),
                    _ => warn!("{}: {}", e.category(), e),
                }
                errors.lock().unwrap().push(e);
            }
        })
    };

    let fetched = Arc::new(AtomicUsize::new(0));
    let on_fetched: fetch::SuccessCallback = {
        let fetched = fetched.clone();
        Arc::new(move |_, _| {
            fetched.fetch_add(1, Ordering::Relaxed);
        })
    };

    let synced = Arc::new(AtomicUsize::new(0));
    let on_synced: sync::SyncSuccessCallback = {
        let synced = synced.clone();
        Arc::new(move |_, _| {
            synced.fetch_add(1, Ordering::Relaxed);
        })
    };

    let fetch_events: FetchCallback = {
        let on_event = on_event.clone();
        let on_progress = on_progress.clone();
        Arc::new(move |event: FetchEvent| {
            if let FetchEvent::Progress { completed, total } = event {
                if total > 0 {
                    on_progress(Some("fetch"), ((completed * 100) / total) as u8);
                }
            }
            on_event(event);
        })
    };

    let (fetch_fatal, sync_fatal) = tokio::join!(
        fetch::fetch(
            &files,
            &lock_file,
            Some(&config),
            dirs,
            retry_limit,
            fetch_events,
            on_fetched,
            collect_error.clone(),
        ),
        sync::sync(
            &manual_overrides,
            &dirs.working_dir,
            collect_error.clone(),
            on_synced,
            true,
        ),
    );
    if let Some(e) = fetch_fatal {
        return Err(e);
    }
    if let Some(e) = sync_fatal {
        return Err(e);
    }
    on_progress(Some("sync"), 100);

    let deleted = Arc::new(AtomicUsize::new(0));
    let shelved = Arc::new(AtomicUsize::new(0));
    let on_deletion: reconcile::DeletionCallback = {
        let deleted = deleted.clone();
        let shelved = shelved.clone();
        Arc::new(move |_: &Path, action: DeletionActionType| {
            match action {
                DeletionActionType::Delete => deleted.fetch_add(1, Ordering::Relaxed),
                DeletionActionType::Shelve => shelved.fetch_add(1, Ordering::Relaxed),
            };
        })
    };
    if let Some(e) = reconcile::delete_old_files(
        collect_error.clone(),
        on_deletion,
        &files,
        &manual_overrides,
        &lock_file,
        Some(&config),
        dirs,
    )
    .await
    {
        return Err(e);
    }
    on_progress(Some("cleanup"), 100);

    write_back_selection(&lock_file, &files, dirs, &errors).await;

    let errors = std::mem::take(&mut *errors.lock().unwrap());
    Ok(ReconcileSummary {
        fetched: fetched.load(Ordering::Relaxed),
        synced: synced.load(Ordering::Relaxed),
        deleted: deleted.load(Ordering::Relaxed),
        shelved: shelved.load(Ordering::Relaxed),
        skipped: skipped.load(Ordering::Relaxed),
        errors,
    })
}

/// Persist the files selected by this pass into the local lock file, so
/// the next pass can explain files already on disk without re-resolving.
/// Skipped when nothing changed; a failed write degrades to a per-item
/// error because the output tree itself is already correct.
async fn write_back_selection(
    lock_file: &LockFile,
    files: &[crate::data::project::ProjectFile],
    dirs: &Dirs,
    errors: &Arc<Mutex<Vec<ActionError>>>,
) {
    let mut updated = lock_file.clone();
    for file in files {
        updated.record_resolved(file);
    }

    let path = dirs.lock_file_path();
    let new_text = match updated.to_json_string() {
        Ok(text) => text,
        Err(e) => {
            errors.lock().unwrap().push(e);
            return;
        }
    };
    let current = fs::read_to_string(&path).await.ok();
    if current.as_deref() == Some(new_text.as_str()) {
        return;
    }

    if let Err(e) = updated.write_to(&path).await {
        errors.lock().unwrap().push(e);
    }
}
