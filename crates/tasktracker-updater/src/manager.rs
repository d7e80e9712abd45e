//! Update orchestrator - runs the complete self-update flow.
//!
//! The [`Updater`] wires the components together:
//! - [`ReleaseClient`] for the latest release and the platform's asset
//! - [`Downloader`] for streaming the archive into a scoped temp dir
//! - [`archive::extract_executable`] for pulling the binary out
//! - [`ExecutableReplacer`] for swapping it in place of the running one
//!
//! Every stage short-circuits on the first error. [`Updater::run`] never
//! returns an error: failures are logged and reported as
//! [`UpdateOutcome::Failed`] so that the host application keeps starting.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::archive;
use crate::config::UpdateConfig;
use crate::download::{self, DownloadProgress, Downloader};
use crate::error::UpdateError;
use crate::platform::{Platform, UpdateTarget};
use crate::release::{AssetDescriptor, ReleaseClient};
use crate::replace::{self, ExecutableReplacer, Recovery};
use crate::version::DEV_VERSION;

/// Name of the extraction directory inside the scoped temp dir.
const EXTRACT_DIR: &str = "extracted";

/// An update that is ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Version of the running executable
    pub current_version: String,
    /// Tag of the newer release
    pub latest_tag: String,
    /// Asset selected for this platform
    pub asset: AssetDescriptor,
    /// Platform, capabilities and executable name resolved for this run
    pub target: UpdateTarget,
}

/// Result of [`Updater::check_for_updates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    /// The latest release is not newer than the running version
    UpToDate { current: String, latest: String },
    /// A newer release exists
    Available(UpdatePlan),
}

/// Current state of the updater.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateState {
    /// Idle, no update in progress
    #[default]
    Idle,
    /// Fetching release metadata
    Checking,
    /// Downloading the release archive
    Downloading,
    /// Extracting and replacing the executable
    Installing,
    /// Update complete, restart required
    RestartRequired,
    /// Error occurred
    Error(String),
}

/// How an update run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The run did nothing (development build or updates disabled)
    Skipped(String),
    /// Already on the latest release
    UpToDate { current: String, latest: String },
    /// The executable on disk was replaced; the running process is still old
    Updated { from: String, to: String },
    /// A stage failed; the message is the error that ended the run
    Failed(String),
}

impl UpdateOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, UpdateOutcome::Failed(_))
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Skipped(reason) => write!(f, "update skipped: {}", reason),
            UpdateOutcome::UpToDate { current, latest } => {
                write!(f, "already up to date (current {}, latest {})", current, latest)
            }
            UpdateOutcome::Updated { from, to } => write!(
                f,
                "updated from {} to {}; restart the application to use the new version",
                from, to
            ),
            UpdateOutcome::Failed(message) => write!(f, "update failed: {}", message),
        }
    }
}

/// Self-update orchestrator.
///
/// # Example
///
/// ```ignore
/// use tasktracker_updater::{UpdateConfig, Updater};
///
/// let updater = Updater::new(UpdateConfig::default(), "1.4.0")?;
/// let exe = std::env::current_exe()?;
/// let outcome = updater.run("highercomve", "tasktracker", &exe).await;
/// println!("{}", outcome);
/// ```
pub struct Updater {
    config: UpdateConfig,
    current_version: String,
    platform: Platform,
    release_client: ReleaseClient,
    downloader: Downloader,
    state: Arc<RwLock<UpdateState>>,
}

impl Updater {
    /// Create an updater for the host platform.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Config`] if the HTTP clients cannot be built
    /// from the network settings.
    pub fn new(config: UpdateConfig, current_version: impl Into<String>) -> Result<Self, UpdateError> {
        let release_client = ReleaseClient::new(config.api_base_url.clone(), config.network.clone())?;
        let downloader = Downloader::new(config.network.clone())?;

        Ok(Self {
            config,
            current_version: current_version.into(),
            platform: Platform::current(),
            release_client,
            downloader,
            state: Arc::new(RwLock::new(UpdateState::Idle)),
        })
    }

    /// Pretend to run on `platform` instead of the host.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Set a progress callback for downloads.
    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: Fn(DownloadProgress) + Send + Sync + 'static,
    {
        self.downloader.set_progress_callback(callback);
    }

    pub async fn state(&self) -> UpdateState {
        self.state.read().await.clone()
    }

    async fn set_state(&self, state: UpdateState) {
        *self.state.write().await = state;
    }

    /// Why a run would do nothing, if it would.
    fn skip_reason(&self) -> Option<String> {
        if !self.config.enabled {
            return Some("updates are disabled in the configuration".to_string());
        }
        if self.current_version == DEV_VERSION {
            return Some("development build".to_string());
        }
        None
    }

    /// Resolve what this run is replacing. Fails before any network access
    /// when the platform has no release mapping.
    pub fn resolve_target(&self, exe_path: &Path) -> Result<UpdateTarget, UpdateError> {
        let executable_name = match &self.config.executable_name {
            Some(name) => name.clone(),
            None => exe_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    UpdateError::Config(format!(
                        "cannot determine executable name from {:?}",
                        exe_path
                    ))
                })?,
        };
        UpdateTarget::resolve(self.platform.clone(), executable_name)
    }

    /// Look up the latest release of `owner/repo` and decide whether it is
    /// newer than the running version. Has no side effects on disk.
    pub async fn check_for_updates(
        &self,
        owner: &str,
        repo: &str,
        exe_path: &Path,
    ) -> Result<UpdateCheck, UpdateError> {
        let target = self.resolve_target(exe_path)?;

        info!("Checking for updates to {}/{} ({})", owner, repo, target.platform);
        self.set_state(UpdateState::Checking).await;

        let latest = self.release_client.fetch_latest(owner, repo, &target).await?;
        let ordering = self
            .config
            .version_scheme
            .compare(&self.current_version, &latest.tag);
        debug!(
            "Version comparison: current {} vs latest {} -> {:?}",
            self.current_version, latest.tag, ordering
        );

        if ordering.is_lt() {
            info!("Update available: {} -> {}", self.current_version, latest.tag);
            Ok(UpdateCheck::Available(UpdatePlan {
                current_version: self.current_version.clone(),
                latest_tag: latest.tag,
                asset: latest.asset,
                target,
            }))
        } else {
            info!(
                "No update available (current: {}, latest: {})",
                self.current_version, latest.tag
            );
            self.set_state(UpdateState::Idle).await;
            Ok(UpdateCheck::UpToDate {
                current: self.current_version.clone(),
                latest: latest.tag,
            })
        }
    }

    /// Download, extract, and install `plan` over `exe_path`.
    ///
    /// The scoped temp dir is removed when this returns, whatever the result.
    pub async fn apply(&self, plan: &UpdatePlan, exe_path: &Path) -> Result<(), UpdateError> {
        info!("Installing update to version {}", plan.latest_tag);

        let temp_dir = download::scoped_temp_dir()?;

        self.set_state(UpdateState::Downloading).await;
        let archive_path = self
            .downloader
            .download(&plan.asset.download_url, temp_dir.path())
            .await?;

        self.set_state(UpdateState::Installing).await;
        let extract_dir = temp_dir.path().join(EXTRACT_DIR);
        std::fs::create_dir(&extract_dir)?;
        let extracted = archive::extract_executable(
            &archive_path,
            &extract_dir,
            &plan.target.archived_executable_name(),
        )?;

        ExecutableReplacer::new(plan.target.capabilities).replace(exe_path, &extracted)?;

        self.set_state(UpdateState::RestartRequired).await;
        info!(
            "Update to version {} successful! Please restart the application",
            plan.latest_tag
        );
        Ok(())
    }

    /// Run a complete update of the executable at `exe_path` from the latest
    /// release of `owner/repo`.
    ///
    /// Never fails: every error is logged, recorded in [`Updater::state`],
    /// and returned as [`UpdateOutcome::Failed`].
    pub async fn run(&self, owner: &str, repo: &str, exe_path: &Path) -> UpdateOutcome {
        if let Some(reason) = self.skip_reason() {
            info!("Skipping update check: {}", reason);
            return UpdateOutcome::Skipped(reason);
        }

        match self.try_run(owner, repo, exe_path).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Update failed: {}", e);
                self.set_state(UpdateState::Error(e.to_string())).await;
                UpdateOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_run(
        &self,
        owner: &str,
        repo: &str,
        exe_path: &Path,
    ) -> Result<UpdateOutcome, UpdateError> {
        match self.check_for_updates(owner, repo, exe_path).await? {
            UpdateCheck::UpToDate { current, latest } => Ok(UpdateOutcome::UpToDate { current, latest }),
            UpdateCheck::Available(plan) => {
                self.apply(&plan, exe_path).await?;
                Ok(UpdateOutcome::Updated {
                    from: plan.current_version,
                    to: plan.latest_tag,
                })
            }
        }
    }
}

/// Launch hook: repair any leftover backup next to `exe_path`, then run one
/// update in the background.
///
/// Must be called from within a tokio runtime. The returned handle may be
/// awaited or dropped; dropping it does not cancel the update.
pub fn spawn_startup_check(
    updater: Arc<Updater>,
    owner: impl Into<String>,
    repo: impl Into<String>,
    exe_path: PathBuf,
) -> JoinHandle<UpdateOutcome> {
    match replace::recover_orphaned_backup(&exe_path) {
        Ok(Recovery::Nothing) => {}
        Ok(recovery) => info!("Start-up recovery for {:?}: {:?}", exe_path, recovery),
        Err(e) => warn!("Start-up recovery for {:?} failed: {}", exe_path, e),
    }

    let owner = owner.into();
    let repo = repo.into();
    tokio::spawn(async move { updater.run(&owner, &repo, &exe_path).await })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{write_tar_xz, write_zip};
    use crate::config::NetworkConfig;
    use crate::replace::backup_path;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RELEASE_PATH: &str = "/repos/acme/app/releases/latest";

    fn config_for(server_uri: &str) -> UpdateConfig {
        UpdateConfig {
            api_base_url: server_uri.to_string(),
            network: NetworkConfig {
                max_retries: 0,
                retry_backoff_ms: 1,
                ..NetworkConfig::default()
            },
            ..UpdateConfig::default()
        }
    }

    fn updater(server_uri: &str, version: &str, os: &str) -> Updater {
        Updater::new(config_for(server_uri), version)
            .unwrap()
            .with_platform(Platform::new(os, "amd64"))
    }

    async fn mount_release(server: &MockServer, tag: &str, asset_name: &str) {
        Mock::given(method("GET"))
            .and(path(RELEASE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": tag,
                "assets": [{
                    "name": asset_name,
                    "browser_download_url": format!("{}/download/{}", server.uri(), asset_name),
                }]
            })))
            .mount(server)
            .await;
    }

    async fn mount_archive(server: &MockServer, asset_name: &str, bytes: Vec<u8>, expected: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/download/{}", asset_name)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
            .expect(expected)
            .mount(server)
            .await;
    }

    fn tar_xz_bytes(files: &[(&str, u32, &str)]) -> Vec<u8> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tar.xz");
        write_tar_xz(&path, files);
        std::fs::read(path).unwrap()
    }

    fn installed_exe(dir: &TempDir, name: &str) -> PathBuf {
        let exe = dir.path().join(name);
        std::fs::write(&exe, b"old build").unwrap();
        exe
    }

    #[tokio::test]
    async fn test_full_update_replaces_executable() {
        let server = MockServer::start().await;
        mount_release(&server, "v1.1.0", "app-linux-amd64.tar.xz").await;
        let archive = tar_xz_bytes(&[("app", 0o755, "new build")]);
        mount_archive(&server, "app-linux-amd64.tar.xz", archive, 1).await;

        let install_dir = TempDir::new().unwrap();
        let exe = installed_exe(&install_dir, "app");
        let updater = updater(&server.uri(), "1.0.0", "linux");

        let outcome = updater.run("acme", "app", &exe).await;

        assert_eq!(
            outcome,
            UpdateOutcome::Updated {
                from: "1.0.0".to_string(),
                to: "v1.1.0".to_string()
            }
        );
        assert_eq!(std::fs::read(&exe).unwrap(), b"new build");
        assert!(!backup_path(&exe).exists());
        assert_eq!(updater.state().await, UpdateState::RestartRequired);
    }

    #[tokio::test]
    async fn test_windows_update_keeps_backup() {
        let server = MockServer::start().await;
        mount_release(&server, "v1.1.0", "app-windows-amd64.zip").await;
        let zip_dir = TempDir::new().unwrap();
        let zip_path = zip_dir.path().join("a.zip");
        write_zip(&zip_path, &[("app.exe", 0o755, "MZ new build")]);
        mount_archive(&server, "app-windows-amd64.zip", std::fs::read(zip_path).unwrap(), 1).await;

        let install_dir = TempDir::new().unwrap();
        let exe = installed_exe(&install_dir, "app.exe");
        let outcome = updater(&server.uri(), "1.0.0", "windows")
            .run("acme", "app", &exe)
            .await;

        assert!(matches!(outcome, UpdateOutcome::Updated { .. }));
        assert_eq!(std::fs::read(&exe).unwrap(), b"MZ new build");
        assert_eq!(std::fs::read(backup_path(&exe)).unwrap(), b"old build");
    }

    #[tokio::test]
    async fn test_up_to_date_downloads_nothing() {
        let server = MockServer::start().await;
        mount_release(&server, "v1.2.0", "app-linux-amd64.tar.xz").await;
        mount_archive(&server, "app-linux-amd64.tar.xz", Vec::new(), 0).await;

        let install_dir = TempDir::new().unwrap();
        let exe = installed_exe(&install_dir, "app");
        let updater = updater(&server.uri(), "1.2", "linux");

        let outcome = updater.run("acme", "app", &exe).await;

        assert_eq!(
            outcome,
            UpdateOutcome::UpToDate {
                current: "1.2".to_string(),
                latest: "v1.2.0".to_string()
            }
        );
        assert_eq!(std::fs::read(&exe).unwrap(), b"old build");
        assert_eq!(updater.state().await, UpdateState::Idle);
    }

    #[tokio::test]
    async fn test_network_failure_is_reported_not_raised() {
        let uri = crate::http::tests::closed_port_url();

        let install_dir = TempDir::new().unwrap();
        let exe = installed_exe(&install_dir, "app");
        let updater = updater(&uri, "1.0.0", "linux");

        let err = updater
            .check_for_updates("acme", "app", &exe)
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Network(_)));

        let outcome = updater.run("acme", "app", &exe).await;

        match outcome {
            UpdateOutcome::Failed(message) => assert!(message.starts_with("network error")),
            other => panic!("unexpected outcome: {other}"),
        }
        assert!(matches!(updater.state().await, UpdateState::Error(ref m) if m.starts_with("network error")));
        assert_eq!(std::fs::read(&exe).unwrap(), b"old build");
    }

    #[tokio::test]
    async fn test_unsupported_platform_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let install_dir = TempDir::new().unwrap();
        let exe = installed_exe(&install_dir, "app");
        let outcome = updater(&server.uri(), "1.0.0", "plan9")
            .run("acme", "app", &exe)
            .await;

        match outcome {
            UpdateOutcome::Failed(message) => assert!(message.contains("plan9/amd64")),
            other => panic!("unexpected outcome: {other}"),
        }
    }

    #[tokio::test]
    async fn test_development_build_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let install_dir = TempDir::new().unwrap();
        let exe = installed_exe(&install_dir, "app");
        let outcome = updater(&server.uri(), DEV_VERSION, "linux")
            .run("acme", "app", &exe)
            .await;

        assert!(matches!(outcome, UpdateOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_disabled_is_skipped() {
        let mut config = config_for("http://127.0.0.1:1");
        config.enabled = false;
        let updater = Updater::new(config, "1.0.0").unwrap();

        let outcome = updater.run("acme", "app", Path::new("/nonexistent/app")).await;
        assert!(matches!(outcome, UpdateOutcome::Skipped(ref r) if r.contains("disabled")));
    }

    #[tokio::test]
    async fn test_missing_executable_in_archive_leaves_install_untouched() {
        let server = MockServer::start().await;
        mount_release(&server, "v2.0.0", "app-linux-amd64.tar.xz").await;
        let archive = tar_xz_bytes(&[("README.md", 0o644, "docs only")]);
        mount_archive(&server, "app-linux-amd64.tar.xz", archive, 1).await;

        let install_dir = TempDir::new().unwrap();
        let exe = installed_exe(&install_dir, "app");
        let outcome = updater(&server.uri(), "1.0.0", "linux")
            .run("acme", "app", &exe)
            .await;

        assert!(matches!(outcome, UpdateOutcome::Failed(ref m) if m.contains("not found in archive")));
        assert_eq!(std::fs::read(&exe).unwrap(), b"old build");
        assert!(!backup_path(&exe).exists());
    }

    #[tokio::test]
    async fn test_check_for_updates_returns_plan() {
        let server = MockServer::start().await;
        mount_release(&server, "v1.10.0", "app-linux-amd64.tar.xz").await;

        let updater = updater(&server.uri(), "v1.9.3", "linux");
        let check = updater
            .check_for_updates("acme", "app", Path::new("/opt/app"))
            .await
            .unwrap();

        match check {
            UpdateCheck::Available(plan) => {
                assert_eq!(plan.latest_tag, "v1.10.0");
                assert_eq!(plan.asset.name, "app-linux-amd64.tar.xz");
                assert_eq!(plan.target.archived_executable_name(), "app");
            }
            other => panic!("unexpected check result: {other:?}"),
        }
    }

    #[test]
    fn test_executable_name_override() {
        let mut config = UpdateConfig::default();
        config.executable_name = Some("task-tracker".to_string());
        let updater = Updater::new(config, "1.0.0")
            .unwrap()
            .with_platform(Platform::new("windows", "amd64"));

        let target = updater.resolve_target(Path::new("C:/apps/renamed.exe")).unwrap();
        assert_eq!(target.archived_executable_name(), "task-tracker.exe");
    }

    #[tokio::test]
    async fn test_spawn_startup_check_recovers_then_runs() {
        let install_dir = TempDir::new().unwrap();
        let exe = install_dir.path().join("app");
        std::fs::write(backup_path(&exe), b"previous build").unwrap();

        let updater = Arc::new(Updater::new(UpdateConfig::default(), DEV_VERSION).unwrap());
        let outcome = spawn_startup_check(updater, "acme", "app", exe.clone())
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Skipped(_)));
        assert_eq!(std::fs::read(&exe).unwrap(), b"previous build");
    }
}
