//! Filesystem layout contract
//!
//! A pass depends on these roots being stable for its whole duration:
//! the working directory (output tree), a hidden state directory holding
//! the remote-bootstrap clone, and the shelf root where orphaned files
//! are archived instead of deleted.

use std::path::{Path, PathBuf};

use crate::data::config_file::{ConfigFile, CONFIG_FILE_NAME};
use crate::data::lock_file::LOCK_FILE_NAME;
use crate::data::project::ProjectType;

pub const STATE_DIR_NAME: &str = ".modsync";

#[derive(Debug, Clone)]
pub struct Dirs {
    pub working_dir: PathBuf,
}

impl Dirs {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.working_dir.join(STATE_DIR_NAME)
    }

    /// Root of the remote-bootstrap clone.
    pub fn remote_dir(&self) -> PathBuf {
        self.state_dir().join("remote")
    }

    /// Archive root for shelved files.
    pub fn shelf_dir(&self) -> PathBuf {
        self.state_dir().join("shelf")
    }

    pub fn lock_file_path(&self) -> PathBuf {
        self.working_dir.join(LOCK_FILE_NAME)
    }

    pub fn remote_lock_file_path(&self) -> PathBuf {
        self.remote_dir().join(LOCK_FILE_NAME)
    }

    pub fn remote_config_file_path(&self) -> PathBuf {
        self.remote_dir().join(CONFIG_FILE_NAME)
    }

    /// Absolute output folder for a project type.
    pub fn output_dir(&self, project_type: ProjectType, config: Option<&ConfigFile>) -> PathBuf {
        self.working_dir.join(project_type.folder_in(config))
    }

    /// Is `path` inside the hidden state directory?
    pub fn is_state_path(&self, path: &Path) -> bool {
        path.starts_with(self.state_dir())
    }
}
