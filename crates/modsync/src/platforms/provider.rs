//! Provider contract
//!
//! A provider is a hosting platform exposing project lookup and file
//! resolution. New platforms integrate purely by implementing this
//! trait; no other component depends on platform specifics.

use async_trait::async_trait;

use crate::data::project::{Project, ProjectFile, ProjectType};
use crate::error::Result;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name.
    fn name(&self) -> &'static str;

    /// Snake-case name used in identity maps and the lock file.
    fn serial_name(&self) -> &'static str;

    fn site_url(&self) -> Option<&'static str> {
        None
    }

    /// Request a project by id or slug.
    async fn request_project(
        &self,
        input: &str,
        project_type: Option<ProjectType>,
    ) -> Result<Project>;

    /// Request candidate files for a project id, pre-sorted newest-first
    /// by platform convention. `file_id` narrows to one specific file.
    async fn request_project_files(
        &self,
        mc_versions: &[String],
        loaders: &[String],
        project_id: &str,
        file_id: Option<&str>,
    ) -> Result<Vec<ProjectFile>>;

    /// Request a project together with up to `number_of_files` candidate
    /// files for the given environment constraints.
    async fn request_project_with_files(
        &self,
        mc_versions: &[String],
        loaders: &[String],
        input: &str,
        file_id: Option<&str>,
        number_of_files: usize,
        project_type: Option<ProjectType>,
    ) -> Result<Project> {
        let mut project = self.request_project(input, project_type).await?;

        if let Some(project_id) = project.id_for(self.serial_name()).map(str::to_owned) {
            let files = self
                .request_project_files(mc_versions, loaders, &project_id, file_id)
                .await?;
            project.add_files(files.into_iter().take(number_of_files));
        }

        Ok(project)
    }
}
