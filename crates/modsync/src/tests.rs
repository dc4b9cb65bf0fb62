//! End-to-end reconciliation tests against an in-memory platform, a
//! local HTTP server and a fake git transport.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::data::{Dirs, LockFile, Project, ProjectFile, ProjectSide, ProjectType};
use crate::error::{ActionError, Result};
use crate::export::ExportProfile;
use crate::integrity::Integrity;
use crate::platforms::Provider;
use crate::fetch::null_success_callback;
use crate::progress::{
    null_error_callback, null_fetch_callback, null_task_progress, FetchCallback, FetchEvent,
    TaskProgress,
};
use crate::remote::{remote_install, remote_update, GitRemote};
use crate::{overrides, LOCK_FILE_NAME};

/// Serves projects straight from memory, like a platform would.
struct MockProvider {
    projects: Vec<Project>,
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn serial_name(&self) -> &'static str {
        "modrinth"
    }

    async fn request_project(
        &self,
        input: &str,
        _project_type: Option<ProjectType>,
    ) -> Result<Project> {
        self.projects
            .iter()
            .find(|p| p.id.values().any(|id| id == input) || p.name.eq_ignore_ascii_case(input))
            .map(|p| {
                let mut found = p.clone();
                found.files.clear();
                found
            })
            .ok_or_else(|| ActionError::ProjectNotFound {
                input: input.to_string(),
            })
    }

    async fn request_project_files(
        &self,
        _mc_versions: &[String],
        _loaders: &[String],
        project_id: &str,
        _file_id: Option<&str>,
    ) -> Result<Vec<ProjectFile>> {
        Ok(self
            .projects
            .iter()
            .find(|p| p.id.values().any(|id| id == project_id))
            .map(|p| p.files.clone())
            .unwrap_or_default())
    }
}

/// Copies a seeded source tree instead of talking to a real remote.
struct FakeGit {
    source: PathBuf,
}

impl FakeGit {
    async fn mirror(&self, dir: &Path) -> std::result::Result<(), String> {
        for rel in overrides::walk_files(&self.source)
            .await
            .map_err(|e| e.to_string())?
        {
            let dest = dir.join(&rel);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            tokio::fs::copy(self.source.join(&rel), &dest)
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

#[async_trait]
impl GitRemote for FakeGit {
    async fn clone_repo(
        &self,
        _url: &str,
        dir: &Path,
        _branch: Option<&str>,
        on_progress: &TaskProgress,
    ) -> std::result::Result<(), String> {
        self.mirror(dir).await?;
        on_progress(Some("clone"), 100);
        Ok(())
    }

    async fn update_repo(
        &self,
        dir: &Path,
        _branch: Option<&str>,
        on_progress: &TaskProgress,
    ) -> std::result::Result<(), String> {
        self.mirror(dir).await?;
        on_progress(Some("update"), 100);
        Ok(())
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hosted_file(server: &MockServer, parent_id: &str, name: &str, body: &[u8]) -> ProjectFile {
    ProjectFile {
        file_name: name.to_string(),
        url: Some(format!("{}/{name}", server.uri())),
        id: None,
        provider: "modrinth".to_string(),
        parent_id: parent_id.to_string(),
        integrity: Integrity::new()
            .with_hash("sha256", sha256_hex(body))
            .with_size(body.len() as u64),
        mc_versions: vec![],
        loaders: vec![],
    }
}

async fn host(server: &MockServer, name: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Seed a remote source tree: lock file plus any override files.
async fn seed_remote(source: &Path, lock: &LockFile, overrides: &[(&str, &[u8])]) {
    tokio::fs::create_dir_all(source).await.unwrap();
    tokio::fs::write(source.join(LOCK_FILE_NAME), lock.to_json_string().unwrap())
        .await
        .unwrap();
    for (rel, bytes) in overrides {
        let dest = source.join(rel);
        tokio::fs::create_dir_all(dest.parent().unwrap()).await.unwrap();
        tokio::fs::write(&dest, bytes).await.unwrap();
    }
}

fn pack_project(server: &MockServer, id: &str, name: &str, file_name: &str, body: &[u8]) -> Project {
    let mut project = Project::new("modrinth", id, name, ProjectType::Mod);
    project.add_files([hosted_file(server, id, file_name, body)]);
    project
}

#[tokio::test]
async fn install_fetches_syncs_and_writes_back() {
    let server = MockServer::start().await;
    host(&server, "alpha.jar", b"alpha bytes").await;

    let alpha = pack_project(&server, "AAA", "Alpha", "alpha.jar", b"alpha bytes");
    let mut lock = LockFile::new("pack");
    lock.add_project(alpha.clone());

    let source = tempfile::tempdir().unwrap();
    seed_remote(
        source.path(),
        &lock,
        &[("overrides/config/common.toml", b"shared".as_slice())],
    )
    .await;

    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());
    let git = FakeGit {
        source: source.path().to_path_buf(),
    };
    let provider = MockProvider {
        projects: vec![alpha],
    };

    let summary = remote_install(
        &git,
        &provider,
        &dirs,
        "https://github.com/user/pack",
        None,
        0,
        &ExportProfile::full_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap();

    assert!(summary.is_clean(), "{:?}", summary.errors);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.synced, 1);

    let jar = tokio::fs::read(out.path().join("mods/alpha.jar")).await.unwrap();
    assert_eq!(jar, b"alpha bytes");
    assert_eq!(
        tokio::fs::read(out.path().join("config/common.toml")).await.unwrap(),
        b"shared"
    );

    // The local lock file records the selected files for the next pass.
    let written = LockFile::read_from(&dirs.lock_file_path()).await.unwrap();
    assert_eq!(written.projects[0].files[0].file_name, "alpha.jar");
}

#[tokio::test]
async fn second_pass_is_idempotent() {
    let server = MockServer::start().await;
    host(&server, "alpha.jar", b"alpha bytes").await;

    let alpha = pack_project(&server, "AAA", "Alpha", "alpha.jar", b"alpha bytes");
    let mut lock = LockFile::new("pack");
    lock.add_project(alpha.clone());

    let source = tempfile::tempdir().unwrap();
    seed_remote(source.path(), &lock, &[("overrides/a.txt", b"a".as_slice())]).await;

    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());
    let git = FakeGit {
        source: source.path().to_path_buf(),
    };
    let provider = MockProvider {
        projects: vec![alpha],
    };

    remote_install(
        &git,
        &provider,
        &dirs,
        "https://github.com/user/pack",
        None,
        0,
        &ExportProfile::full_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap();

    let summary = remote_update(
        &git,
        &provider,
        &dirs,
        None,
        0,
        &ExportProfile::full_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap();

    assert!(summary.is_clean(), "{:?}", summary.errors);
    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.synced, 0);
    assert!(summary.skipped >= 2);
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.shelved, 0);
}

#[tokio::test]
async fn one_failing_download_does_not_stop_the_batch() {
    let server = MockServer::start().await;
    host(&server, "good.jar", b"good").await;
    Mock::given(method("GET"))
        .and(path("/bad.jar"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let good = pack_project(&server, "GGG", "Good", "good.jar", b"good");
    let mut bad = Project::new("modrinth", "BBB", "Bad", ProjectType::Mod);
    bad.add_files([hosted_file(&server, "BBB", "bad.jar", b"never served")]);

    let mut lock = LockFile::new("pack");
    lock.add_project(good.clone());
    lock.add_project(bad.clone());

    let source = tempfile::tempdir().unwrap();
    seed_remote(source.path(), &lock, &[]).await;

    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());
    let git = FakeGit {
        source: source.path().to_path_buf(),
    };
    let provider = MockProvider {
        projects: vec![good, bad],
    };

    let summary = remote_install(
        &git,
        &provider,
        &dirs,
        "https://github.com/user/pack",
        None,
        0,
        &ExportProfile::full_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap();

    assert_eq!(summary.fetched, 1);
    assert!(out.path().join("mods/good.jar").is_file());
    assert!(!out.path().join("mods/bad.jar").exists());
    assert_eq!(summary.errors.len(), 1);
    assert!(matches!(
        summary.errors[0],
        ActionError::DownloadFailed { .. }
    ));
}

#[tokio::test]
async fn transient_failure_recovers_within_retry_limit() {
    let server = MockServer::start().await;
    // First request fails, every later one serves the body.
    Mock::given(method("GET"))
        .and(path("/flaky.jar"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    host(&server, "flaky.jar", b"flaky bytes").await;

    let flaky = pack_project(&server, "FFF", "Flaky", "flaky.jar", b"flaky bytes");
    let mut lock = LockFile::new("pack");
    lock.add_project(flaky);

    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());

    let retries = Arc::new(Mutex::new(Vec::new()));
    let sink = retries.clone();
    let on_event: FetchCallback = Arc::new(move |event| {
        if let FetchEvent::Retry { attempt, .. } = event {
            sink.lock().unwrap().push(attempt);
        }
    });

    let files = lock.projects[0].files.clone();
    let fatal = crate::fetch::fetch(
        &files,
        &lock,
        None,
        &dirs,
        2,
        on_event,
        null_success_callback(),
        null_error_callback(),
    )
    .await;

    assert!(fatal.is_none());
    assert_eq!(
        tokio::fs::read(out.path().join("mods/flaky.jar")).await.unwrap(),
        b"flaky bytes"
    );
    // One transient failure means exactly one retry, on attempt two.
    assert_eq!(*retries.lock().unwrap(), vec![2]);
}

#[tokio::test]
async fn update_removes_dropped_artifacts_and_shelves_user_files() {
    let server = MockServer::start().await;
    host(&server, "alpha.jar", b"alpha bytes").await;

    let alpha = pack_project(&server, "AAA", "Alpha", "alpha.jar", b"alpha bytes");
    let mut lock = LockFile::new("pack");
    lock.add_project(alpha.clone());

    let source = tempfile::tempdir().unwrap();
    seed_remote(source.path(), &lock, &[]).await;

    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());
    let git = FakeGit {
        source: source.path().to_path_buf(),
    };
    let provider = MockProvider {
        projects: vec![alpha],
    };

    remote_install(
        &git,
        &provider,
        &dirs,
        "https://github.com/user/pack",
        None,
        0,
        &ExportProfile::full_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap();

    // A mod dropped from the pack and a user's note appear on disk.
    tokio::fs::write(out.path().join("mods/dropped.jar"), b"old").await.unwrap();
    tokio::fs::write(out.path().join("mods/notes.txt"), b"mine").await.unwrap();

    let summary = remote_update(
        &git,
        &provider,
        &dirs,
        None,
        0,
        &ExportProfile::full_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap();

    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.shelved, 1);
    assert!(!out.path().join("mods/dropped.jar").exists());
    assert!(!out.path().join("mods/notes.txt").exists());
    assert_eq!(
        tokio::fs::read(dirs.shelf_dir().join("mods/notes.txt")).await.unwrap(),
        b"mine"
    );
    assert!(out.path().join("mods/alpha.jar").is_file());
}

#[tokio::test]
async fn server_profile_filters_projects_and_overrides() {
    let server = MockServer::start().await;
    host(&server, "common.jar", b"common").await;
    host(&server, "clientonly.jar", b"clientonly").await;

    let common = pack_project(&server, "CCC", "Common", "common.jar", b"common");
    let mut client_only = Project::new("modrinth", "KKK", "ClientOnly", ProjectType::Mod)
        .with_side(ProjectSide::Client);
    client_only.add_files([hosted_file(&server, "KKK", "clientonly.jar", b"clientonly")]);

    let mut lock = LockFile::new("pack");
    lock.add_project(common.clone());
    lock.add_project(client_only.clone());

    let source = tempfile::tempdir().unwrap();
    seed_remote(
        source.path(),
        &lock,
        &[
            ("server-overrides/server.properties", b"port=25565".as_slice()),
            ("client-overrides/options.txt", b"fov=90".as_slice()),
        ],
    )
    .await;

    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());
    let git = FakeGit {
        source: source.path().to_path_buf(),
    };
    let provider = MockProvider {
        projects: vec![common, client_only],
    };

    let summary = remote_install(
        &git,
        &provider,
        &dirs,
        "https://github.com/user/pack",
        None,
        0,
        &ExportProfile::server_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap();

    assert!(summary.is_clean(), "{:?}", summary.errors);
    assert!(out.path().join("mods/common.jar").is_file());
    assert!(!out.path().join("mods/clientonly.jar").exists());
    assert!(out.path().join("server.properties").is_file());
    assert!(!out.path().join("options.txt").exists());
}

#[tokio::test]
async fn client_profile_filters_projects_and_overrides() {
    let server = MockServer::start().await;
    host(&server, "common.jar", b"common").await;
    host(&server, "serveronly.jar", b"serveronly").await;

    let common = pack_project(&server, "CCC", "Common", "common.jar", b"common");
    let mut server_only = Project::new("modrinth", "SSS", "ServerOnly", ProjectType::Mod)
        .with_side(ProjectSide::Server);
    server_only.add_files([hosted_file(&server, "SSS", "serveronly.jar", b"serveronly")]);

    let mut lock = LockFile::new("pack");
    lock.add_project(common.clone());
    lock.add_project(server_only.clone());

    let source = tempfile::tempdir().unwrap();
    seed_remote(
        source.path(),
        &lock,
        &[
            ("server-overrides/server.properties", b"port=25565".as_slice()),
            ("client-overrides/options.txt", b"fov=90".as_slice()),
        ],
    )
    .await;

    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());
    let git = FakeGit {
        source: source.path().to_path_buf(),
    };
    let provider = MockProvider {
        projects: vec![common, server_only],
    };

    let summary = remote_install(
        &git,
        &provider,
        &dirs,
        "https://github.com/user/pack",
        None,
        0,
        &ExportProfile::client_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap();

    assert!(summary.is_clean(), "{:?}", summary.errors);
    assert!(out.path().join("mods/common.jar").is_file());
    assert!(!out.path().join("mods/serveronly.jar").exists());
    assert!(out.path().join("options.txt").is_file());
    assert!(!out.path().join("server.properties").exists());
}

#[tokio::test]
async fn install_preconditions_are_checked_in_order() {
    let git = FakeGit {
        source: PathBuf::from("/nonexistent"),
    };
    let provider = MockProvider { projects: vec![] };
    let bad_url = "https://example.com/not-a-remote";

    // An existing remote wins over everything else.
    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());
    tokio::fs::create_dir_all(dirs.remote_dir()).await.unwrap();
    tokio::fs::write(out.path().join("stray.txt"), b"x").await.unwrap();
    let err = remote_install(
        &git,
        &provider,
        &dirs,
        bad_url,
        None,
        0,
        &ExportProfile::full_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ActionError::RemoteAlreadyExists { .. }));

    // A non-empty directory wins over a malformed URL.
    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());
    tokio::fs::write(out.path().join("stray.txt"), b"x").await.unwrap();
    let err = remote_install(
        &git,
        &provider,
        &dirs,
        bad_url,
        None,
        0,
        &ExportProfile::full_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ActionError::CouldNotInstallRemote { .. }));

    // Only then is the URL itself rejected.
    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());
    let err = remote_install(
        &git,
        &provider,
        &dirs,
        bad_url,
        None,
        0,
        &ExportProfile::full_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ActionError::InvalidUrl { .. }));
}

#[tokio::test]
async fn clone_without_lock_file_is_rolled_back() {
    let source = tempfile::tempdir().unwrap();
    tokio::fs::write(source.path().join("readme.md"), b"no lock here")
        .await
        .unwrap();

    let out = tempfile::tempdir().unwrap();
    let dirs = Dirs::new(out.path());
    let git = FakeGit {
        source: source.path().to_path_buf(),
    };
    let provider = MockProvider { projects: vec![] };

    let err = remote_install(
        &git,
        &provider,
        &dirs,
        "https://github.com/user/pack",
        None,
        0,
        &ExportProfile::full_pack(),
        &null_task_progress(),
        null_fetch_callback(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ActionError::FileNotFound { .. }));
    // The half-made remote is removed so a retry starts clean.
    assert!(!dirs.remote_dir().exists());
}

#[test]
fn lock_file_round_trips_through_its_canonical_form() {
    let mut lock = LockFile::new("pack");
    lock.set_mc_versions(["1.20.1".to_string()]);
    lock.set_loaders(["fabric".to_string()]);
    lock.add_project(Project::new("modrinth", "AAA", "Alpha", ProjectType::Mod));

    let text = lock.to_json_string().unwrap();
    let parsed: LockFile = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, lock);
    assert_eq!(parsed.to_json_string().unwrap(), text);
}
