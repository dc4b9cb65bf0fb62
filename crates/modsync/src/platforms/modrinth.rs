//! Modrinth platform integration

use async_trait::async_trait;
use serde::Deserialize;

use crate::data::project::{Project, ProjectFile, ProjectSide, ProjectType};
use crate::error::{ActionError, Result};
use crate::http;
use crate::integrity::Integrity;
use crate::platforms::provider::Provider;

const API_URL: &str = "https://api.modrinth.com/v2";

pub struct Modrinth;

#[derive(Debug, Deserialize)]
struct MrProject {
    id: String,
    title: String,
    project_type: String,
    client_side: String,
    server_side: String,
}

#[derive(Debug, Deserialize)]
struct MrVersion {
    id: String,
    files: Vec<MrVersionFile>,
    #[serde(default)]
    loaders: Vec<String>,
    #[serde(default)]
    game_versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MrVersionFile {
    url: String,
    filename: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    hashes: MrHashes,
    size: u64,
}

#[derive(Debug, Default, Deserialize)]
struct MrHashes {
    #[serde(default)]
    sha512: Option<String>,
    #[serde(default)]
    sha1: Option<String>,
}

fn map_project_type(raw: &str) -> ProjectType {
    match raw {
        "resourcepack" => ProjectType::ResourcePack,
        "shader" => ProjectType::Shader,
        "datapack" => ProjectType::DataPack,
        _ => ProjectType::Mod,
    }
}

fn map_side(client: &str, server: &str) -> ProjectSide {
    match (client == "unsupported", server == "unsupported") {
        (true, false) => ProjectSide::Server,
        (false, true) => ProjectSide::Client,
        _ => ProjectSide::Both,
    }
}

impl MrVersion {
    fn into_project_file(mut self, parent_id: &str, serial_name: &str) -> Option<ProjectFile> {
        if self.files.is_empty() {
            return None;
        }
        let index = self.files.iter().position(|f| f.primary).unwrap_or(0);
        let file = self.files.remove(index);

        let mut integrity = Integrity::new().with_size(file.size);
        if let Some(sha512) = file.hashes.sha512 {
            integrity = integrity.with_hash("sha512", sha512);
        }
        if let Some(sha1) = file.hashes.sha1 {
            integrity = integrity.with_hash("sha1", sha1);
        }

        Some(ProjectFile {
            file_name: file.filename,
            url: Some(file.url),
            id: Some(self.id),
            provider: serial_name.to_string(),
            parent_id: parent_id.to_string(),
            integrity,
            mc_versions: self.game_versions,
            loaders: self.loaders,
        })
    }
}

#[async_trait]
impl Provider for Modrinth {
    fn name(&self) -> &'static str {
        "Modrinth"
    }

    fn serial_name(&self) -> &'static str {
        "modrinth"
    }

    fn site_url(&self) -> Option<&'static str> {
        Some("https://modrinth.com")
    }

    async fn request_project(
        &self,
        input: &str,
        project_type: Option<ProjectType>,
    ) -> Result<Project> {
        let url = format!("{API_URL}/project/{input}");
        let raw: MrProject = http::get_json(&url, &[]).await.map_err(|e| match e {
            ActionError::Http { url, source } => ActionError::Provider {
                provider: self.name().to_string(),
                input: input.to_string(),
                reason: format!("{source} ({url})"),
            },
            other => other,
        })?;

        Ok(Project::new(
            self.serial_name(),
            raw.id,
            raw.title,
            project_type.unwrap_or_else(|| map_project_type(&raw.project_type)),
        )
        .with_side(map_side(&raw.client_side, &raw.server_side)))
    }

    async fn request_project_files(
        &self,
        _mc_versions: &[String],
        _loaders: &[String],
        project_id: &str,
        file_id: Option<&str>,
    ) -> Result<Vec<ProjectFile>> {
        // The version listing is newest-first by platform convention;
        // environment filtering is the resolver's job.
        let versions: Vec<MrVersion> = match file_id {
            Some(file_id) => {
                let url = format!("{API_URL}/version/{file_id}");
                vec![http::get_json(&url, &[]).await?]
            }
            None => {
                let url = format!("{API_URL}/project/{project_id}/version");
                http::get_json(&url, &[]).await?
            }
        };

        Ok(versions
            .into_iter()
            .filter_map(|v| v.into_project_file(project_id, self.serial_name()))
            .collect())
    }
}
