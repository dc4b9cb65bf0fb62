//! Aggregating provider
//!
//! Fans a request out to every registered platform and merges the
//! results into one cross-platform view. A single platform failing is
//! not an error; only all platforms failing is.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;

use crate::data::project::{Project, ProjectFile, ProjectType};
use crate::error::{ActionError, Result};
use crate::platforms::provider::Provider;

pub struct Multiplatform {
    providers: Vec<Arc<dyn Provider>>,
}

impl Multiplatform {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// Aggregate over the full platform registry.
    pub fn of_registry() -> Self {
        Self::new(crate::platforms::providers().to_vec())
    }
}

#[async_trait]
impl Provider for Multiplatform {
    fn name(&self) -> &'static str {
        "Multiplatform"
    }

    fn serial_name(&self) -> &'static str {
        "multiplatform"
    }

    /// Ask every platform and union the answers. Responses that fail or
    /// describe a different project than the first success are dropped.
    async fn request_project(
        &self,
        input: &str,
        project_type: Option<ProjectType>,
    ) -> Result<Project> {
        let lookups = self
            .providers
            .iter()
            .map(|p| p.request_project(input, project_type));

        let results = join_all(lookups).await;

        let mut merged: Option<Project> = None;
        for (provider, result) in self.providers.iter().zip(results) {
            match result {
                Ok(project) => match merged.as_mut() {
                    None => merged = Some(project),
                    Some(existing) if existing.is_same(&project) => existing.merge(project),
                    Some(existing) => debug!(
                        input,
                        kept = %existing.name,
                        dropped = %project.name,
                        "conflicting project identities, keeping first"
                    ),
                },
                Err(e) => debug!(
                    input,
                    provider = provider.name(),
                    site = provider.site_url(),
                    error = %e,
                    "platform lookup failed"
                ),
            }
        }

        merged.ok_or_else(|| ActionError::ProjectNotFound {
            input: input.to_string(),
        })
    }

    async fn request_project_files(
        &self,
        mc_versions: &[String],
        loaders: &[String],
        project_id: &str,
        file_id: Option<&str>,
    ) -> Result<Vec<ProjectFile>> {
        let lookups = self
            .providers
            .iter()
            .map(|p| p.request_project_files(mc_versions, loaders, project_id, file_id));

        let mut files = Vec::new();
        let mut first_error = None;
        for result in join_all(lookups).await {
            match result {
                Ok(mut found) => files.append(&mut found),
                Err(e) => first_error = first_error.or(Some(e)),
            }
        }

        match (files.is_empty(), first_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(files),
        }
    }

    /// The default composition would resolve files for a single id; here
    /// each platform must be queried with its own id from the merged
    /// identity map.
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

        for provider in &self.providers {
            let Some(project_id) = project.id_for(provider.serial_name()).map(str::to_owned)
            else {
                continue;
            };
            match provider
                .request_project_files(mc_versions, loaders, &project_id, file_id)
                .await
            {
                Ok(files) => project.add_files(files.into_iter().take(number_of_files)),
                Err(e) => debug!(
                    provider = provider.name(),
                    project_id,
                    error = %e,
                    "file lookup failed"
                ),
            }
        }

        Ok(project)
    }
}
