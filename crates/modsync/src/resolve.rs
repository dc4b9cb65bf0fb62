//! File resolution
//!
//! Given a project's candidate files and the pack's environment
//! constraints, pick the files to install. Resolution is pure and
//! deterministic: same candidates and constraints, same selection.

use futures::StreamExt;
use futures::stream;

use crate::data::lock_file::LockFile;
use crate::data::project::{Project, ProjectFile, ProjectSide};
use crate::error::{ActionError, Result};
use crate::platforms::{self, Provider};

/// Loaders every file is compatible with regardless of the pack's
/// declared loader list.
pub const UNIVERSAL_LOADERS: &[&str] = &["minecraft", "iris", "optifine", "datapack"];

/// Concurrent in-flight project resolutions.
const RESOLVE_CONCURRENCY: usize = 5;

/// A file with no declared loaders is loader-agnostic and matches.
fn loader_matches(file_loaders: &[String], acceptable: &[String]) -> bool {
    if file_loaders.is_empty() || acceptable.is_empty() {
        return true;
    }
    file_loaders.iter().any(|l| {
        let l = l.to_lowercase();
        UNIVERSAL_LOADERS.contains(&l.as_str())
            || acceptable.iter().any(|a| a.eq_ignore_ascii_case(&l))
    })
}

/// A file with no declared game versions is version-agnostic and matches.
fn version_matches(file_versions: &[String], acceptable: &[String]) -> bool {
    if file_versions.is_empty() || acceptable.is_empty() {
        return true;
    }
    file_versions
        .iter()
        .any(|v| acceptable.iter().any(|a| a == v))
}

/// Select up to `number_of_files` compatible files from a project's
/// candidates. Candidates are considered in platform-priority order,
/// then in their per-platform order (newest first).
///
/// An empty selection is a normal outcome, not an error; only a project
/// with no identity at all is unresolvable.
pub fn resolve(
    project: &Project,
    mc_versions: &[String],
    loaders: &[String],
    number_of_files: usize,
) -> Result<Vec<ProjectFile>> {
    if project.id.is_empty() {
        return Err(ActionError::ProjectNotFound {
            input: project.name.clone(),
        });
    }

    let mut selected = Vec::new();
    for provider in platforms::providers() {
        for file in &project.files {
            if selected.len() >= number_of_files {
                return Ok(selected);
            }
            if file.provider == provider.serial_name()
                && version_matches(&file.mc_versions, mc_versions)
                && loader_matches(&file.loaders, loaders)
            {
                selected.push(file.clone());
            }
        }
    }
    Ok(selected)
}

/// Re-resolve every project in the lock file against live platform
/// data. Each entry in the result is either a selected file or the
/// error that prevented that project from resolving; one project
/// failing never hides the others.
///
/// `side` filters projects to those shipping on the targeted side.
pub async fn retrieve_project_files(
    lock_file: &LockFile,
    provider: &dyn Provider,
    number_of_files: usize,
    side: Option<ProjectSide>,
) -> Vec<Result<ProjectFile>> {
    let target = side.unwrap_or(ProjectSide::Both);
    let mc_versions = &lock_file.mc_versions;
    let loaders = &lock_file.loaders;

    let lookups = lock_file
        .projects
        .iter()
        .filter(|p| p.side.on(target))
        .map(|project| async move {
            let Some(input) = project.id.values().next() else {
                return vec![Err(ActionError::ProjectNotFound {
                    input: project.name.clone(),
                })];
            };

            let refreshed = provider
                .request_project_with_files(
                    mc_versions,
                    loaders,
                    input,
                    None,
                    number_of_files,
                    Some(project.project_type),
                )
                .await;

            match refreshed {
                Ok(refreshed) => {
                    match resolve(&refreshed, mc_versions, loaders, number_of_files) {
                        Ok(files) => files.into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(e)],
                    }
                }
                Err(e) => vec![Err(e)],
            }
        });

    // `buffered` keeps lock-file order, so output is deterministic.
    stream::iter(lookups)
        .buffered(RESOLVE_CONCURRENCY)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect()
}
