//! Project and project-file entities
//!
//! Projects are value-like: they are rebuilt fresh on every
//! reconciliation pass from the lock file plus live provider responses.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::config_file::ConfigFile;
use crate::data::lock_file::LockFile;
use crate::integrity::Integrity;

/// Closed set of content categories. The category decides the output
/// subfolder a fetched file lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Mod,
    ResourcePack,
    DataPack,
    Shader,
}

impl ProjectType {
    pub const ALL: [ProjectType; 4] = [
        ProjectType::Mod,
        ProjectType::ResourcePack,
        ProjectType::DataPack,
        ProjectType::Shader,
    ];

    pub fn serial_name(self) -> &'static str {
        match self {
            ProjectType::Mod => "mod",
            ProjectType::ResourcePack => "resource_pack",
            ProjectType::DataPack => "data_pack",
            ProjectType::Shader => "shader",
        }
    }

    /// Default output subfolder for this content category.
    pub fn folder_name(self) -> &'static str {
        match self {
            ProjectType::Mod => "mods",
            ProjectType::ResourcePack => "resourcepacks",
            ProjectType::DataPack => "datapacks",
            ProjectType::Shader => "shaderpacks",
        }
    }

    /// File extensions of fetched artifacts for this category. Used by
    /// the stale-file reconciler to tell re-downloadable artifacts from
    /// user content.
    pub fn artifact_extensions(self) -> &'static [&'static str] {
        match self {
            ProjectType::Mod => &["jar"],
            ProjectType::ResourcePack | ProjectType::DataPack | ProjectType::Shader => &["zip"],
        }
    }

    /// Output folder, honoring a config-file remap when present.
    pub fn folder_in(self, config: Option<&ConfigFile>) -> PathBuf {
        config
            .and_then(|c| c.paths.get(self.serial_name()))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(self.folder_name()))
    }
}

/// Which side of the game a project ships on. Governs whether a file is
/// included in a side-targeted pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectSide {
    Client,
    Server,
    #[default]
    Both,
}

impl ProjectSide {
    /// Does a project with this side ship on `target`?
    pub fn on(self, target: ProjectSide) -> bool {
        matches!(self, ProjectSide::Both) || matches!(target, ProjectSide::Both) || self == target
    }
}

/// A concrete file resolved from one provider for one project.
///
/// `parent_id` is the owning project's id on `provider`; it links the
/// file back to its project when computing output paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub provider: String,
    pub parent_id: String,
    #[serde(default)]
    pub integrity: Integrity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mc_versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loaders: Vec<String>,
}

impl ProjectFile {
    /// The project this file belongs to, looked up by provider identity.
    pub fn parent_project<'a>(&self, lock_file: &'a LockFile) -> Option<&'a Project> {
        lock_file
            .projects
            .iter()
            .find(|p| p.id.values().any(|id| *id == self.parent_id))
    }

    /// Deterministic output path relative to the working directory:
    /// project-type folder plus file name.
    pub fn relative_output_path(
        &self,
        lock_file: &LockFile,
        config: Option<&ConfigFile>,
    ) -> Option<PathBuf> {
        let project = self.parent_project(lock_file)?;
        Some(project.project_type.folder_in(config).join(&self.file_name))
    }
}

/// A declared project: an identity map across providers plus the files
/// currently selected for installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Provider serial name to provider-specific project id or slug.
    /// Never empty; a project may exist under different ids on
    /// different providers.
    pub id: BTreeMap<String, String>,
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    #[serde(default)]
    pub side: ProjectSide,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ProjectFile>,
}

impl Project {
    pub fn new(
        provider: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        project_type: ProjectType,
    ) -> Self {
        let mut ids = BTreeMap::new();
        ids.insert(provider.into(), id.into());
        Self {
            id: ids,
            name: name.into(),
            project_type,
            side: ProjectSide::Both,
            files: Vec::new(),
        }
    }

    pub fn with_side(mut self, side: ProjectSide) -> Self {
        self.side = side;
        self
    }

    pub fn id_for(&self, provider: &str) -> Option<&str> {
        self.id.get(provider).map(String::as_str)
    }

    /// Two provider responses describe the same logical project when
    /// their identity maps intersect or their display names match.
    pub fn is_same(&self, other: &Project) -> bool {
        self.id
            .iter()
            .any(|(provider, id)| other.id.get(provider) == Some(id))
            || self.name.eq_ignore_ascii_case(&other.name)
    }

    /// Add files, keeping file names unique within the selected set.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = ProjectFile>) {
        for file in files {
            let duplicate = self
                .files
                .iter()
                .any(|f| f.file_name == file.file_name && f.provider == file.provider);
            if !duplicate {
                self.files.push(file);
            }
        }
    }

    /// Union another provider's view of this project into this one.
    /// All files are kept as legitimate candidates; final selection is
    /// the resolver's job.
    pub fn merge(&mut self, other: Project) {
        for (provider, id) in other.id {
            self.id.entry(provider).or_insert(id);
        }
        if matches!(self.side, ProjectSide::Both) && !matches!(other.side, ProjectSide::Both) {
            self.side = other.side;
        }
        self.add_files(other.files);
    }
}
