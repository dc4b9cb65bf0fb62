//! The lock file: the single declarative source of truth for desired
//! state. Read fully before any reconciliation pass, never partially
//! trusted, and rewritten atomically via backup-then-replace.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::data::config_file::ConfigFile;
use crate::data::project::{Project, ProjectFile};
use crate::error::{ActionError, Result};
use crate::overrides::OverrideEntry;

pub const LOCK_FILE_NAME: &str = "modsync-lock.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    pub pack_name: String,
    #[serde(default)]
    pub mc_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<OverrideEntry>,
}

impl LockFile {
    pub fn new(pack_name: impl Into<String>) -> Self {
        Self {
            pack_name: pack_name.into(),
            ..Self::default()
        }
    }

    pub fn exists_at(path: &Path) -> bool {
        path.is_file()
    }

    /// Read and validate a lock file. Any read or parse failure is
    /// fatal to the caller's pass.
    pub async fn read_from(path: &Path) -> Result<LockFile> {
        let text = fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ActionError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ActionError::fs(path, e)
            }
        })?;

        let lock_file: LockFile =
            serde_json::from_str(&text).map_err(|e| ActionError::InvalidFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        // A project without identity can never be resolved; reject the
        // whole file rather than reconcile against partial data.
        if let Some(project) = lock_file.projects.iter().find(|p| p.id.is_empty()) {
            return Err(ActionError::InvalidFormat {
                path: path.to_path_buf(),
                reason: format!("project '{}' has an empty identity map", project.name),
            });
        }

        debug!(
            "read lock file '{}': {} projects",
            lock_file.pack_name,
            lock_file.projects.len()
        );
        Ok(lock_file)
    }

    /// Read the lock file if present, otherwise start a fresh one.
    pub async fn read_or_init(path: &Path, pack_name: &str) -> Result<LockFile> {
        if Self::exists_at(path) {
            Self::read_from(path).await
        } else {
            Ok(LockFile::new(pack_name))
        }
    }

    /// Write atomically: the previous bytes are held in memory and
    /// restored if the write fails.
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let backup = fs::read(path).await.ok();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ActionError::fs(parent, e))?;
        }

        let text = self.to_json_string()?;
        if let Err(e) = fs::write(path, &text).await {
            if let Some(old_bytes) = backup {
                if let Err(restore_err) = fs::write(path, &old_bytes).await {
                    warn!(
                        "failed to restore lock file backup at {}: {}",
                        path.display(),
                        restore_err
                    );
                }
            }
            return Err(ActionError::fs(path, e));
        }
        Ok(())
    }

    /// Canonical serialized form. Used by both writes and round-trip
    /// comparisons, so field order and formatting stay stable.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ActionError::InvalidFormat {
            path: PathBuf::from(LOCK_FILE_NAME),
            reason: e.to_string(),
        })
    }

    /// Add a project, replacing any previous entry with the same
    /// identity. Projects are kept in alphabetical order by name.
    pub fn add_project(&mut self, project: Project) {
        self.projects.retain(|p| !p.is_same(&project));
        self.projects.push(project);
        self.projects
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    }

    /// Remove a project by name or by any provider id. Returns the
    /// removed entry, if one matched.
    pub fn remove_project(&mut self, input: &str) -> Option<Project> {
        let index = self.projects.iter().position(|p| {
            p.name.eq_ignore_ascii_case(input) || p.id.values().any(|id| id == input)
        })?;
        Some(self.projects.remove(index))
    }

    pub fn get_project(&self, input: &str) -> Option<&Project> {
        self.projects.iter().find(|p| {
            p.name.eq_ignore_ascii_case(input) || p.id.values().any(|id| id == input)
        })
    }

    pub fn set_mc_versions(&mut self, versions: impl IntoIterator<Item = String>) {
        self.mc_versions = versions.into_iter().collect();
    }

    pub fn set_loaders(&mut self, loaders: impl IntoIterator<Item = String>) {
        self.loaders = loaders.into_iter().collect();
    }

    /// Output paths of every file the manifest still references,
    /// relative to the working directory. Files already correct on disk
    /// are never re-touched by a pass, so the reconciler needs these to
    /// count them as explained.
    pub fn referenced_paths(&self, config: Option<&ConfigFile>) -> Vec<PathBuf> {
        self.projects
            .iter()
            .flat_map(|p| {
                let folder = p.project_type.folder_in(config);
                p.files
                    .iter()
                    .map(move |f| folder.join(&f.file_name))
            })
            .collect()
    }

    /// Record a freshly resolved file as the selected file for its
    /// provider on the parent project. At most one file per provider is
    /// selected at a time.
    pub fn record_resolved(&mut self, file: &ProjectFile) {
        if let Some(project) = self
            .projects
            .iter_mut()
            .find(|p| p.id.values().any(|id| *id == file.parent_id))
        {
            project
                .files
                .retain(|f| f.provider != file.provider);
            project.files.push(file.clone());
        }
    }
}
