//! Command-line front end for the reconciliation engine.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::process::Command;
use tracing::info;

use modsync::progress::{ErrorCallback, FetchCallback, ProgressTasks, TaskProgress};
use modsync::{
    Dirs, ExportProfile, FetchEvent, GitRemote, LockFile, Multiplatform, ReconcileSummary,
};

#[derive(Parser)]
#[command(name = "modsync", version, about = "Declarative modpack reconciliation")]
struct Cli {
    /// Modpack directory to operate on.
    #[arg(long, default_value = ".")]
    dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a modpack from a git remote into an empty directory.
    Install {
        /// Git URL of the modpack repository.
        url: String,
        #[arg(long)]
        branch: Option<String>,
        /// Install server-side content only.
        #[arg(long)]
        server: bool,
        #[arg(long, default_value_t = 2)]
        retries: usize,
    },
    /// Pull the latest remote state and reconcile to it.
    Update {
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        server: bool,
        #[arg(long, default_value_t = 2)]
        retries: usize,
    },
    /// Fetch the files declared in the local lock file.
    Fetch {
        #[arg(long, default_value_t = 2)]
        retries: usize,
    },
}

/// Drives the system `git` binary.
struct GitCli;

impl GitCli {
    async fn run(args: &[&str]) -> Result<(), String> {
        let output = Command::new("git")
            .args(args)
            .output()
            .await
            .map_err(|e| format!("failed to run git: {e}"))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

#[async_trait]
impl GitRemote for GitCli {
    async fn clone_repo(
        &self,
        url: &str,
        dir: &Path,
        branch: Option<&str>,
        on_progress: &TaskProgress,
    ) -> Result<(), String> {
        let dir = dir.to_string_lossy();
        let mut args = vec!["clone", "--depth", "1"];
        if let Some(branch) = branch {
            args.extend(["--branch", branch]);
        }
        args.extend([url, dir.as_ref()]);
        Self::run(&args).await?;
        on_progress(Some("clone"), 100);
        Ok(())
    }

    async fn update_repo(
        &self,
        dir: &Path,
        branch: Option<&str>,
        on_progress: &TaskProgress,
    ) -> Result<(), String> {
        let dir = dir.to_string_lossy();
        let mut fetch_args = vec!["-C", dir.as_ref(), "fetch", "--depth", "1", "origin"];
        if let Some(branch) = branch {
            fetch_args.push(branch);
        }
        Self::run(&fetch_args).await?;
        Self::run(&["-C", dir.as_ref(), "reset", "--hard", "FETCH_HEAD"]).await?;
        on_progress(Some("update"), 100);
        Ok(())
    }
}

fn progress_printer() -> TaskProgress {
    let tasks = ProgressTasks::new();
    Arc::new(move |task, percent| {
        if let Some(task) = task {
            tasks.update(task, percent);
            info!("{task}: {percent}% (overall {}%)", tasks.overall());
        }
    })
}

fn event_printer() -> FetchCallback {
    Arc::new(|event| match event {
        FetchEvent::Progress { completed, total } => {
            eprintln!("  fetched {completed}/{total}");
        }
        FetchEvent::Retry {
            url,
            attempt,
            max_attempts,
        } => {
            eprintln!("  retrying {url} ({attempt}/{max_attempts})");
        }
    })
}

fn error_printer() -> ErrorCallback {
    Arc::new(|e| {
        if !e.is_soft() {
            eprintln!("  {e}");
        }
    })
}

fn profile(server: bool) -> ExportProfile {
    if server {
        ExportProfile::server_pack()
    } else {
        ExportProfile::full_pack()
    }
}

fn report(summary: &ReconcileSummary) -> anyhow::Result<()> {
    println!(
        "fetched {}, synced {}, skipped {}, deleted {}, shelved {}",
        summary.fetched, summary.synced, summary.skipped, summary.deleted, summary.shelved
    );
    if !summary.is_clean() {
        for e in &summary.errors {
            eprintln!("error: {e}");
        }
        bail!("{} item(s) failed", summary.errors.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let dirs = Dirs::new(&cli.dir);
    let provider = Multiplatform::of_registry();

    match cli.command {
        Commands::Install {
            url,
            branch,
            server,
            retries,
        } => {
            let summary = modsync::remote_install(
                &GitCli,
                &provider,
                &dirs,
                &url,
                branch.as_deref(),
                retries,
                &profile(server),
                &progress_printer(),
                event_printer(),
            )
            .await
            .context("install failed")?;
            report(&summary)
        }
        Commands::Update {
            branch,
            server,
            retries,
        } => {
            let summary = modsync::remote_update(
                &GitCli,
                &provider,
                &dirs,
                branch.as_deref(),
                retries,
                &profile(server),
                &progress_printer(),
                event_printer(),
            )
            .await
            .context("update failed")?;
            report(&summary)
        }
        Commands::Fetch { retries } => {
            let lock_file = LockFile::read_from(&dirs.lock_file_path())
                .await
                .context("no lock file in this directory")?;

            let mut files = Vec::new();
            let mut failed = 0usize;
            for result in
                modsync::retrieve_project_files(&lock_file, &provider, 1, None).await
            {
                match result {
                    Ok(file) => files.push(file),
                    Err(e) => {
                        eprintln!("  {e}");
                        failed += 1;
                    }
                }
            }

            let fatal = modsync::fetch(
                &files,
                &lock_file,
                None,
                &dirs,
                retries,
                event_printer(),
                Arc::new(|path, _| println!("  {}", path.display())),
                error_printer(),
            )
            .await;
            if let Some(e) = fatal {
                bail!("fetch failed: {e}");
            }
            if failed > 0 {
                bail!("{failed} project(s) failed to resolve");
            }
            Ok(())
        }
    }
}
