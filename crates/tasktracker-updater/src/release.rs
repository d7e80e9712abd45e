//! Release metadata lookup.
//!
//! Queries the release host's "latest release" endpoint and picks the asset
//! built for the running platform.

use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::config::NetworkConfig;
use crate::error::UpdateError;
use crate::http;
use crate::platform::UpdateTarget;

/// A published release as returned by the release host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseDescriptor {
    /// Version tag, optionally prefixed with `v`
    #[serde(rename = "tag_name")]
    pub tag: String,
    /// Downloadable files, in the order the host listed them
    #[serde(default, deserialize_with = "null_as_empty")]
    pub assets: Vec<AssetDescriptor>,
}

/// Hosts send `"assets": null` for releases with no uploads.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<AssetDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<AssetDescriptor>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetDescriptor {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

impl ReleaseDescriptor {
    /// Parse a release metadata body.
    pub fn from_json(body: &[u8]) -> Result<Self, UpdateError> {
        serde_json::from_slice(body).map_err(|e| UpdateError::Decode(e.to_string()))
    }

    /// Pick the asset for `target`.
    ///
    /// An asset matches when its name contains both the platform suffix and
    /// the executable's base name. The first match in listing order wins.
    pub fn select_asset(&self, target: &UpdateTarget) -> Result<&AssetDescriptor, UpdateError> {
        let suffix = target.asset_suffix();
        let base_name = target.executable_base_name();

        self.assets
            .iter()
            .find(|asset| asset.name.contains(&suffix) && asset.name.contains(base_name))
            .ok_or_else(|| UpdateError::AssetNotFound {
                platform: target.platform.to_string(),
            })
    }
}

/// The newest release together with the asset chosen for this platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRelease {
    pub tag: String,
    pub asset: AssetDescriptor,
}

/// Build the latest-release endpoint URL for a project.
pub fn latest_release_url(api_base_url: &str, owner: &str, repo: &str) -> String {
    format!(
        "{}/repos/{}/{}/releases/latest",
        api_base_url.trim_end_matches('/'),
        owner,
        repo
    )
}

/// Client for the release host's API.
pub struct ReleaseClient {
    client: reqwest::Client,
    network: NetworkConfig,
    api_base_url: String,
}

impl ReleaseClient {
    /// Create a client against `api_base_url`.
    pub fn new(api_base_url: impl Into<String>, network: NetworkConfig) -> Result<Self, UpdateError> {
        Ok(Self {
            client: http::build_client(&network)?,
            network,
            api_base_url: api_base_url.into(),
        })
    }

    /// Fetch the latest release of `owner/repo`.
    pub async fn fetch_release(&self, owner: &str, repo: &str) -> Result<ReleaseDescriptor, UpdateError> {
        let url = latest_release_url(&self.api_base_url, owner, repo);
        debug!("Fetching release metadata from: {}", url);

        let body = http::with_retry(&self.network, "release lookup", || self.fetch_body(&url)).await?;
        let release = ReleaseDescriptor::from_json(&body)?;
        debug!(
            "Latest release {} lists {} assets",
            release.tag,
            release.assets.len()
        );
        Ok(release)
    }

    /// Fetch the latest release and select the asset for `target`.
    pub async fn fetch_latest(
        &self,
        owner: &str,
        repo: &str,
        target: &UpdateTarget,
    ) -> Result<LatestRelease, UpdateError> {
        let release = self.fetch_release(owner, repo).await?;
        let asset = release.select_asset(target)?.clone();
        info!("Latest release {} provides asset {}", release.tag, asset.name);
        Ok(LatestRelease {
            tag: release.tag,
            asset,
        })
    }

    async fn fetch_body(&self, url: &str) -> Result<Vec<u8>, UpdateError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Api {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn release(names: &[&str]) -> ReleaseDescriptor {
        ReleaseDescriptor {
            tag: "v1.4.0".to_string(),
            assets: names
                .iter()
                .map(|name| AssetDescriptor {
                    name: name.to_string(),
                    download_url: format!("https://example.com/{}", name),
                })
                .collect(),
        }
    }

    fn target(os: &str, arch: &str, exe: &str) -> UpdateTarget {
        UpdateTarget::resolve(Platform::new(os, arch), exe).unwrap()
    }

    fn fast_network() -> NetworkConfig {
        NetworkConfig {
            max_retries: 2,
            retry_backoff_ms: 1,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_select_asset_by_platform() {
        let release = release(&["app-linux-amd64.tar.xz", "app-windows-amd64.zip"]);

        let linux = release.select_asset(&target("linux", "amd64", "app")).unwrap();
        assert_eq!(linux.name, "app-linux-amd64.tar.xz");

        let windows = release.select_asset(&target("windows", "amd64", "app.exe")).unwrap();
        assert_eq!(windows.name, "app-windows-amd64.zip");
    }

    #[test]
    fn test_select_asset_requires_executable_name() {
        let release = release(&["other-linux-amd64.tar.xz", "app-linux-amd64.tar.xz"]);
        let asset = release.select_asset(&target("linux", "amd64", "app")).unwrap();
        assert_eq!(asset.name, "app-linux-amd64.tar.xz");
    }

    #[test]
    fn test_select_asset_first_match_wins() {
        let release = release(&["app-linux-amd64.tar.xz.sha256", "app-linux-amd64.tar.xz"]);
        let asset = release.select_asset(&target("linux", "amd64", "app")).unwrap();
        assert_eq!(asset.name, "app-linux-amd64.tar.xz.sha256");
    }

    #[test]
    fn test_select_asset_none_matches() {
        let release = release(&["app-linux-arm64.tar.xz", "app-darwin-amd64.tar.xz"]);
        let err = release.select_asset(&target("linux", "amd64", "app")).unwrap_err();
        assert!(matches!(err, UpdateError::AssetNotFound { ref platform } if platform == "linux/amd64"));
    }

    #[test]
    fn test_parse_release_json() {
        let body = br#"{
            "tag_name": "v2.1.0",
            "name": "Release 2.1.0",
            "assets": [
                {"name": "task-tracker-linux-amd64.tar.xz",
                 "browser_download_url": "https://example.com/a.tar.xz",
                 "size": 1234}
            ]
        }"#;
        let release = ReleaseDescriptor::from_json(body).unwrap();
        assert_eq!(release.tag, "v2.1.0");
        assert_eq!(release.assets[0].download_url, "https://example.com/a.tar.xz");
    }

    #[test]
    fn test_null_assets_is_asset_not_found() {
        let release = ReleaseDescriptor::from_json(br#"{"tag_name": "v1.0.0", "assets": null}"#).unwrap();
        assert!(release.assets.is_empty());

        let err = release.select_asset(&target("linux", "amd64", "app")).unwrap_err();
        assert!(matches!(err, UpdateError::AssetNotFound { .. }));
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        assert!(matches!(
            ReleaseDescriptor::from_json(b"<html>rate limited</html>"),
            Err(UpdateError::Decode(_))
        ));
        assert!(matches!(
            ReleaseDescriptor::from_json(br#"{"assets": []}"#),
            Err(UpdateError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_latest_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tracker/releases/latest"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "v1.2.0",
                "assets": [
                    {"name": "tracker-windows-amd64.zip", "browser_download_url": "https://dl/win"},
                    {"name": "tracker-linux-amd64.tar.xz", "browser_download_url": "https://dl/linux"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ReleaseClient::new(server.uri(), fast_network()).unwrap();
        let latest = client
            .fetch_latest("acme", "tracker", &target("linux", "amd64", "tracker"))
            .await
            .unwrap();
        assert_eq!(latest.tag, "v1.2.0");
        assert_eq!(latest.asset.download_url, "https://dl/linux");
    }

    #[tokio::test]
    async fn test_not_found_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = ReleaseClient::new(server.uri(), fast_network()).unwrap();
        let err = client.fetch_release("acme", "tracker").await.unwrap_err();
        assert!(matches!(err, UpdateError::Api { status: 404 }));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = ReleaseClient::new(server.uri(), fast_network()).unwrap();
        let err = client.fetch_release("acme", "tracker").await.unwrap_err();
        assert!(matches!(err, UpdateError::Api { status: 503 }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let uri = crate::http::tests::closed_port_url();

        let network = NetworkConfig {
            max_retries: 0,
            ..NetworkConfig::default()
        };
        let client = ReleaseClient::new(uri, network).unwrap();
        let err = client.fetch_release("acme", "tracker").await.unwrap_err();
        assert!(matches!(err, UpdateError::Network(_)));
    }
}
