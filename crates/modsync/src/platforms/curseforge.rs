//! CurseForge platform integration
//!
//! The API requires an `x-api-key` header; the key is read from the
//! `CURSEFORGE_API_KEY` environment variable. Requests without a key are
//! still attempted and surface as provider errors, so a pack that only
//! uses other platforms works without one.

use async_trait::async_trait;
use serde::Deserialize;

use crate::data::project::{Project, ProjectFile, ProjectType};
use crate::error::{ActionError, Result};
use crate::http;
use crate::integrity::Integrity;
use crate::platforms::provider::Provider;

const API_URL: &str = "https://api.curseforge.com/v1";
const API_KEY_ENV: &str = "CURSEFORGE_API_KEY";

/// Minecraft's game id in the CurseForge catalogue.
const GAME_ID: u32 = 432;

pub struct CurseForge;

#[derive(Debug, Deserialize)]
struct CfData<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfMod {
    id: u64,
    name: String,
    #[serde(default)]
    class_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CfFile {
    id: u64,
    file_name: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    file_length: Option<u64>,
    #[serde(default)]
    hashes: Vec<CfHash>,
    #[serde(default)]
    game_versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CfHash {
    value: String,
    algo: u8,
}

fn map_class_id(class_id: Option<u32>) -> ProjectType {
    match class_id {
        Some(12) => ProjectType::ResourcePack,
        Some(6552) => ProjectType::Shader,
        Some(6945) => ProjectType::DataPack,
        _ => ProjectType::Mod,
    }
}

fn hash_algo_name(algo: u8) -> Option<&'static str> {
    match algo {
        1 => Some("sha1"),
        2 => Some("md5"),
        _ => None,
    }
}

/// `gameVersions` mixes game versions ("1.20.1") and loader names
/// ("Fabric") in one list; entries starting with a digit are versions.
fn split_game_versions(raw: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut mc_versions = Vec::new();
    let mut loaders = Vec::new();
    for entry in raw {
        if entry.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            mc_versions.push(entry);
        } else {
            loaders.push(entry.to_lowercase());
        }
    }
    (mc_versions, loaders)
}

impl CfFile {
    fn into_project_file(self, parent_id: &str, serial_name: &str) -> ProjectFile {
        let mut integrity = Integrity::new();
        if let Some(size) = self.file_length {
            integrity = integrity.with_size(size);
        }
        for hash in self.hashes {
            if let Some(algo) = hash_algo_name(hash.algo) {
                integrity = integrity.with_hash(algo, hash.value.to_lowercase());
            }
        }

        let (mc_versions, loaders) = split_game_versions(self.game_versions);

        ProjectFile {
            file_name: self.file_name,
            url: self.download_url,
            id: Some(self.id.to_string()),
            provider: serial_name.to_string(),
            parent_id: parent_id.to_string(),
            integrity,
            mc_versions,
            loaders,
        }
    }
}

impl CurseForge {
    fn headers() -> Vec<(&'static str, String)> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.is_empty() => vec![("x-api-key", key)],
            _ => Vec::new(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str, input: &str) -> Result<T> {
        let headers = Self::headers();
        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(k, v)| (*k, v.as_str())).collect();
        http::get_json(url, &header_refs).await.map_err(|e| match e {
            ActionError::Http { url, source } => ActionError::Provider {
                provider: self.name().to_string(),
                input: input.to_string(),
                reason: format!("{source} ({url})"),
            },
            other => other,
        })
    }

    async fn fetch_mod(&self, input: &str) -> Result<CfMod> {
        if input.chars().all(|c| c.is_ascii_digit()) {
            let url = format!("{API_URL}/mods/{input}");
            let raw: CfData<CfMod> = self.get(&url, input).await?;
            return Ok(raw.data);
        }

        // Slug lookup goes through search; an exact slug match is
        // expected to be the only hit.
        let url = format!("{API_URL}/mods/search?gameId={GAME_ID}&slug={input}");
        let raw: CfData<Vec<CfMod>> = self.get(&url, input).await?;
        raw.data
            .into_iter()
            .next()
            .ok_or_else(|| ActionError::ProjectNotFound {
                input: input.to_string(),
            })
    }
}

#[async_trait]
impl Provider for CurseForge {
    fn name(&self) -> &'static str {
        "CurseForge"
    }

    fn serial_name(&self) -> &'static str {
        "curseforge"
    }

    fn site_url(&self) -> Option<&'static str> {
        Some("https://www.curseforge.com")
    }

    async fn request_project(
        &self,
        input: &str,
        project_type: Option<ProjectType>,
    ) -> Result<Project> {
        let raw = self.fetch_mod(input).await?;
        Ok(Project::new(
            self.serial_name(),
            raw.id.to_string(),
            raw.name,
            project_type.unwrap_or_else(|| map_class_id(raw.class_id)),
        ))
    }

    async fn request_project_files(
        &self,
        _mc_versions: &[String],
        _loaders: &[String],
        project_id: &str,
        file_id: Option<&str>,
    ) -> Result<Vec<ProjectFile>> {
        let files: Vec<CfFile> = match file_id {
            Some(file_id) => {
                let url = format!("{API_URL}/mods/{project_id}/files/{file_id}");
                let raw: CfData<CfFile> = self.get(&url, project_id).await?;
                vec![raw.data]
            }
            None => {
                let url = format!("{API_URL}/mods/{project_id}/files");
                let raw: CfData<Vec<CfFile>> = self.get(&url, project_id).await?;
                raw.data
            }
        };

        Ok(files
            .into_iter()
            .map(|f| f.into_project_file(project_id, self.serial_name()))
            .collect())
    }
}
