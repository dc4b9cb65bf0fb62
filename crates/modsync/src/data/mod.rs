//! Data model: the entities reconciliation passes are built from.

pub mod config_file;
pub mod dirs;
pub mod lock_file;
pub mod project;

pub use config_file::{ConfigFile, CONFIG_FILE_NAME};
pub use dirs::{Dirs, STATE_DIR_NAME};
pub use lock_file::{LockFile, LOCK_FILE_NAME};
pub use project::{Project, ProjectFile, ProjectSide, ProjectType};
