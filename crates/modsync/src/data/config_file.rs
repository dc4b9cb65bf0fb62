//! Optional secondary declarative input. Absence is valid and means
//! "use defaults"; it is consumed read-only by reconciliation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{ActionError, Result};

pub const CONFIG_FILE_NAME: &str = "modsync.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Extra override entries, relative to the matching override root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub client_overrides: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_overrides: Vec<String>,
    /// Output folder remaps keyed by project-type serial name
    /// (e.g. `"mod": "plugins"`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn exists_at(path: &Path) -> bool {
        path.is_file()
    }

    pub async fn read_from(path: &Path) -> Result<ConfigFile> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| ActionError::fs(path, e))?;
        serde_json::from_str(&text).map_err(|e| ActionError::InvalidFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read the config when present; a missing file yields defaults, a
    /// malformed one is still an error.
    pub async fn read_or_default(path: &Path) -> Result<ConfigFile> {
        if Self::exists_at(path) {
            Self::read_from(path).await
        } else {
            Ok(ConfigFile::default())
        }
    }
}
