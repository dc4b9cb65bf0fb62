//! Stale-file reconciliation
//!
//! After fetch and sync have landed everything the manifest declares,
//! anything left in the managed output folders is an orphan. Orphaned
//! platform artifacts are deleted (they can always be re-fetched);
//! anything else is shelved, preserving its relative path, so user
//! content is never destroyed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info};

use crate::data::config_file::ConfigFile;
use crate::data::dirs::Dirs;
use crate::data::lock_file::LockFile;
use crate::data::project::{ProjectFile, ProjectType};
use crate::error::{ActionError, Result};
use crate::overrides::{self, ProjectOverride};
use crate::progress::ErrorCallback;

/// What happened to an orphaned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionActionType {
    Delete,
    Shelve,
}

impl DeletionActionType {
    pub fn result_text(self) -> &'static str {
        match self {
            DeletionActionType::Delete => "deleted",
            DeletionActionType::Shelve => "shelved",
        }
    }
}

/// Called once per orphan, with its path and disposition.
pub type DeletionCallback = Arc<dyn Fn(&Path, DeletionActionType) + Send + Sync>;

pub fn null_deletion_callback() -> DeletionCallback {
    Arc::new(|_, _| {})
}

/// Remove or shelve files in the managed output folders that nothing in
/// the current pass explains.
///
/// A file is explained when it was just fetched or synced, or when the
/// manifest still references it (files already correct on disk are
/// never re-touched by fetch, so the manifest list is required here).
/// Must run only after fetch and sync have fully completed.
pub async fn delete_old_files(
    on_error: ErrorCallback,
    on_success: DeletionCallback,
    current_files: &[ProjectFile],
    current_overrides: &[ProjectOverride],
    lock_file: &LockFile,
    config: Option<&ConfigFile>,
    dirs: &Dirs,
) -> Option<ActionError> {
    let mut explained: HashSet<PathBuf> = HashSet::new();
    for file in current_files {
        if let Some(rel) = file.relative_output_path(lock_file, config) {
            explained.insert(dirs.working_dir.join(rel));
        }
    }
    for item in current_overrides {
        explained.insert(item.full_output_path(&dirs.working_dir));
    }
    for rel in lock_file.referenced_paths(config) {
        explained.insert(dirs.working_dir.join(rel));
    }

    let mut deleted = 0usize;
    let mut shelved = 0usize;

    for project_type in ProjectType::ALL {
        let output_dir = dirs.output_dir(project_type, config);
        let rel_files = match overrides::walk_files(&output_dir).await {
            Ok(files) => files,
            Err(e) => {
                on_error(e);
                continue;
            }
        };

        for rel in rel_files {
            let path = output_dir.join(&rel);
            if dirs.is_state_path(&path) || explained.contains(&path) {
                continue;
            }
            // In-flight temp files belong to a concurrent pass, not us.
            if path.extension().is_some_and(|ext| ext == "part") {
                continue;
            }

            let action = classify_orphan(&path, project_type);
            let outcome = match action {
                DeletionActionType::Delete => {
                    fs::remove_file(&path).await.map_err(|e| ActionError::fs(&path, e))
                }
                DeletionActionType::Shelve => shelve(&path, dirs).await,
            };

            match outcome {
                Ok(()) => {
                    debug!("{} orphan {}", action.result_text(), path.display());
                    match action {
                        DeletionActionType::Delete => deleted += 1,
                        DeletionActionType::Shelve => shelved += 1,
                    }
                    on_success(&path, action);
                }
                Err(e) => on_error(e),
            }
        }
    }

    info!(deleted, shelved, "stale-file reconciliation finished");
    None
}

/// Platform artifacts are re-downloadable and safe to delete; anything
/// else might be user content and is shelved instead.
fn classify_orphan(path: &Path, project_type: ProjectType) -> DeletionActionType {
    let is_artifact = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            project_type
                .artifact_extensions()
                .iter()
                .any(|a| a.eq_ignore_ascii_case(ext))
        });
    if is_artifact {
        DeletionActionType::Delete
    } else {
        DeletionActionType::Shelve
    }
}

/// Move a file into the shelf, preserving its path relative to the
/// working directory so it can be restored by hand.
async fn shelve(path: &Path, dirs: &Dirs) -> Result<()> {
    let rel = path
        .strip_prefix(&dirs.working_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or(path.as_os_str())));
    let shelf_path = dirs.shelf_dir().join(rel);

    if let Some(parent) = shelf_path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ActionError::fs(parent, e))?;
    }
    fs::rename(path, &shelf_path)
        .await
        .map_err(|e| ActionError::fs(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::project::Project;
    use crate::integrity::Integrity;
    use crate::progress::null_error_callback;

    fn project_file(name: &str) -> ProjectFile {
        ProjectFile {
            file_name: name.to_string(),
            url: None,
            id: None,
            provider: "modrinth".to_string(),
            parent_id: "AA".to_string(),
            integrity: Integrity::default(),
            mc_versions: vec![],
            loaders: vec![],
        }
    }

    fn lock_with_mod(file_name: &str) -> LockFile {
        let mut lock = LockFile::new("pack");
        let mut project = Project::new("modrinth", "AA", "Sodium", ProjectType::Mod);
        project.add_files([project_file(file_name)]);
        lock.add_project(project);
        lock
    }

    #[tokio::test]
    async fn orphaned_artifact_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = Dirs::new(dir.path());
        let mods = dir.path().join("mods");
        fs::create_dir_all(&mods).await.unwrap();
        fs::write(mods.join("kept.jar"), b"k").await.unwrap();
        fs::write(mods.join("orphan.jar"), b"o").await.unwrap();

        let lock = lock_with_mod("kept.jar");
        delete_old_files(
            null_error_callback(),
            null_deletion_callback(),
            &[],
            &[],
            &lock,
            None,
            &dirs,
        )
        .await;

        assert!(mods.join("kept.jar").is_file());
        assert!(!mods.join("orphan.jar").exists());
    }

    #[tokio::test]
    async fn non_artifact_is_shelved_with_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = Dirs::new(dir.path());
        let notes = dir.path().join("mods/notes/readme.txt");
        fs::create_dir_all(notes.parent().unwrap()).await.unwrap();
        fs::write(&notes, b"mine").await.unwrap();

        let lock = LockFile::new("pack");
        delete_old_files(
            null_error_callback(),
            null_deletion_callback(),
            &[],
            &[],
            &lock,
            None,
            &dirs,
        )
        .await;

        assert!(!notes.exists());
        let shelved = dirs.shelf_dir().join("mods/notes/readme.txt");
        assert_eq!(fs::read(&shelved).await.unwrap(), b"mine");
    }

    #[tokio::test]
    async fn freshly_fetched_and_synced_files_are_explained() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = Dirs::new(dir.path());
        let mods = dir.path().join("mods");
        fs::create_dir_all(&mods).await.unwrap();
        fs::write(mods.join("fetched.jar"), b"f").await.unwrap();

        let lock = lock_with_mod("fetched.jar");
        let fetched = lock.projects[0].files.clone();
        delete_old_files(
            null_error_callback(),
            null_deletion_callback(),
            &fetched,
            &[],
            &lock,
            None,
            &dirs,
        )
        .await;

        assert!(mods.join("fetched.jar").is_file());
    }

    #[tokio::test]
    async fn in_flight_temp_files_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = Dirs::new(dir.path());
        let mods = dir.path().join("mods");
        fs::create_dir_all(&mods).await.unwrap();
        fs::write(mods.join("busy.jar.part"), b"p").await.unwrap();

        let lock = LockFile::new("pack");
        delete_old_files(
            null_error_callback(),
            null_deletion_callback(),
            &[],
            &[],
            &lock,
            None,
            &dirs,
        )
        .await;

        assert!(mods.join("busy.jar.part").is_file());
    }
}
