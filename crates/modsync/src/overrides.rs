//! Manually-managed override files
//!
//! Overrides are files that must appear verbatim in the output tree
//! rather than being fetched from a platform. They live under one of
//! three roots in the source location; the destination path is derived
//! deterministically from the source path, the root and the type.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::data::config_file::ConfigFile;
use crate::data::project::ProjectSide;
use crate::error::{ActionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideType {
    /// Applies to both sides.
    Override,
    ClientOverride,
    ServerOverride,
}

impl OverrideType {
    pub const ALL: [OverrideType; 3] = [
        OverrideType::Override,
        OverrideType::ClientOverride,
        OverrideType::ServerOverride,
    ];

    /// Source folder this type is read from.
    pub fn folder_name(self) -> &'static str {
        match self {
            OverrideType::Override => "overrides",
            OverrideType::ClientOverride => "client-overrides",
            OverrideType::ServerOverride => "server-overrides",
        }
    }

    /// The side this type is restricted to; generic overrides apply to
    /// both and never conflict.
    pub fn side(self) -> Option<ProjectSide> {
        match self {
            OverrideType::Override => None,
            OverrideType::ClientOverride => Some(ProjectSide::Client),
            OverrideType::ServerOverride => Some(ProjectSide::Server),
        }
    }

    /// Application order: generic first, side-restricted last, so a
    /// side-restricted override wins a shared destination.
    pub fn precedence(self) -> u8 {
        match self {
            OverrideType::Override => 0,
            OverrideType::ClientOverride => 1,
            OverrideType::ServerOverride => 2,
        }
    }

    /// Override types admitted by a side-targeted pass.
    pub fn allowed_for(side: ProjectSide) -> HashSet<OverrideType> {
        match side {
            ProjectSide::Client => {
                HashSet::from([OverrideType::Override, OverrideType::ClientOverride])
            }
            ProjectSide::Server => {
                HashSet::from([OverrideType::Override, OverrideType::ServerOverride])
            }
            ProjectSide::Both => HashSet::from(OverrideType::ALL),
        }
    }
}

/// Declared override entry as persisted in the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub path: String,
    #[serde(rename = "type", default = "OverrideEntry::default_type")]
    pub kind: OverrideType,
}

impl OverrideEntry {
    fn default_type() -> OverrideType {
        OverrideType::Override
    }
}

/// One override to reconcile: where the authoritative copy lives and
/// where it must appear in the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOverride {
    pub kind: OverrideType,
    /// Path relative to the override root.
    pub path: PathBuf,
    /// Root containing the override folders (usually the remote clone).
    pub source_root: PathBuf,
}

impl ProjectOverride {
    pub fn new(kind: OverrideType, path: impl Into<PathBuf>, source_root: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            source_root: source_root.into(),
        }
    }

    pub fn full_source_path(&self) -> PathBuf {
        self.source_root.join(self.kind.folder_name()).join(&self.path)
    }

    /// The destination is derived from the relative path alone; the
    /// type folder is stripped so all types merge into one output tree.
    pub fn full_output_path(&self, working_dir: &Path) -> PathBuf {
        working_dir.join(&self.path)
    }
}

/// Discover manually-managed overrides under `source_root`.
///
/// Every regular file under each override folder becomes one entry;
/// config-declared entries are added afterwards (they may name
/// directories, which sync expands when mirroring is on). The result is
/// ordered by type precedence, then path, so application order is
/// deterministic.
pub async fn read_manual_overrides(
    source_root: &Path,
    config: Option<&ConfigFile>,
    allowed_types: Option<&HashSet<OverrideType>>,
) -> Result<Vec<ProjectOverride>> {
    let mut overrides = Vec::new();

    for kind in OverrideType::ALL {
        if let Some(allowed) = allowed_types {
            if !allowed.contains(&kind) {
                continue;
            }
        }

        let root = source_root.join(kind.folder_name());
        for rel_path in walk_files(&root).await? {
            overrides.push(ProjectOverride::new(kind, rel_path, source_root));
        }

        if let Some(config) = config {
            let declared = match kind {
                OverrideType::Override => &config.overrides,
                OverrideType::ClientOverride => &config.client_overrides,
                OverrideType::ServerOverride => &config.server_overrides,
            };
            for entry in declared {
                let candidate = ProjectOverride::new(kind, entry, source_root);
                if !overrides.contains(&candidate) {
                    overrides.push(candidate);
                }
            }
        }
    }

    overrides.sort_by(|a, b| {
        a.kind
            .precedence()
            .cmp(&b.kind.precedence())
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(overrides)
}

/// All regular files under `root`, as paths relative to it. A missing
/// root is simply empty.
pub async fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| ActionError::fs(&dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ActionError::fs(&dir, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| ActionError::fs(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                if let Ok(rel) = path.strip_prefix(root) {
                    files.push(rel.to_path_buf());
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
