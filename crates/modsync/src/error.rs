//! Error taxonomy shared by every reconciliation action
//!
//! All operations return errors as values. Per-item failures are routed
//! through callbacks and never abort sibling work; only precondition
//! failures are surfaced as the batch-level return value.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reasons for every action that can fail.
///
/// `AlreadyExists` is soft: it marks an operation that was skipped because
/// the target already matches the desired state. Callers that render error
/// logs are expected to filter it with [`ActionError::is_soft`].
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("'{path}' already exists")]
    AlreadyExists { path: String },

    #[error("file not found: '{path}'")]
    FileNotFound { path: String },

    #[error("invalid URL: '{url}'")]
    InvalidUrl { url: String },

    #[error("could not install remote '{url}': a remote for this modpack already exists")]
    RemoteAlreadyExists { url: String },

    #[error(
        "could not install or update remote '{url}': \
         a remote can only be installed into an uninitialized modpack directory"
    )]
    CouldNotInstallRemote { url: String },

    #[error("failed to update git repository at '{dir}': {reason}")]
    GitUpdate { dir: PathBuf, reason: String },

    #[error("request to {provider} for '{input}' failed: {reason}")]
    Provider {
        provider: String,
        input: String,
        reason: String,
    },

    #[error("no project found for '{input}' on any provider")]
    ProjectNotFound { input: String },

    #[error("no download URL available for '{file_name}'")]
    NoUrl { file_name: String },

    #[error("download of '{url}' failed after {attempts} attempts: {reason}")]
    DownloadFailed {
        url: String,
        attempts: usize,
        reason: String,
    },

    #[error("hash mismatch for '{path}': expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("size mismatch for '{path}': expected {expected} bytes, got {actual} bytes")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("HTTP request to '{url}' failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("file operation failed on '{path}'")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{path}': {reason}")]
    InvalidFormat { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, ActionError>;

/// Severity levels for error prioritization in logs and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Fatal,
}

impl ActionError {
    /// Soft errors mark skipped no-op work, not failures.
    pub fn is_soft(&self) -> bool {
        matches!(self, ActionError::AlreadyExists { .. })
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ActionError::AlreadyExists { .. } => ErrorSeverity::Info,
            ActionError::NoUrl { .. }
            | ActionError::DownloadFailed { .. }
            | ActionError::Provider { .. }
            | ActionError::ProjectNotFound { .. }
            | ActionError::HashMismatch { .. }
            | ActionError::SizeMismatch { .. }
            | ActionError::Http { .. } => ErrorSeverity::Warning,
            ActionError::FileNotFound { .. }
            | ActionError::InvalidUrl { .. }
            | ActionError::RemoteAlreadyExists { .. }
            | ActionError::CouldNotInstallRemote { .. }
            | ActionError::GitUpdate { .. }
            | ActionError::FileSystem { .. }
            | ActionError::InvalidFormat { .. } => ErrorSeverity::Fatal,
        }
    }

    /// Short category tag for logging.
    pub fn category(&self) -> &'static str {
        match self {
            ActionError::AlreadyExists { .. } => "already_exists",
            ActionError::FileNotFound { .. } => "file_not_found",
            ActionError::InvalidUrl { .. } => "invalid_url",
            ActionError::RemoteAlreadyExists { .. } => "remote_already_exists",
            ActionError::CouldNotInstallRemote { .. } => "could_not_install_remote",
            ActionError::GitUpdate { .. } => "git_update",
            ActionError::Provider { .. } => "provider",
            ActionError::ProjectNotFound { .. } => "project_not_found",
            ActionError::NoUrl { .. } => "no_url",
            ActionError::DownloadFailed { .. } => "download_failed",
            ActionError::HashMismatch { .. } => "hash_mismatch",
            ActionError::SizeMismatch { .. } => "size_mismatch",
            ActionError::Http { .. } => "http",
            ActionError::FileSystem { .. } => "file_system",
            ActionError::InvalidFormat { .. } => "invalid_format",
        }
    }

    /// Build a `FileSystem` error with path context.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ActionError::FileSystem {
            path: path.into(),
            source,
        }
    }
}
