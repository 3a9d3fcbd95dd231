//! Registry HTTP client
//!
//! Package documents are memoized per name; concurrent callers of the same
//! name share one in-flight fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use semver::Version;
use tokio::sync::OnceCell;

use crate::core::{Config, SlinkError, SlinkResult};
use crate::registry::types::RegistryInfo;
use crate::resolver::VersionConstraint;

/// Registry client
pub struct RegistryClient {
    /// HTTP client
    client: reqwest::Client,

    /// Registry base URL
    url: String,

    /// One cell per package name; the cell's single initialization is the
    /// shared fetch
    info_cells: Mutex<HashMap<String, Arc<OnceCell<Arc<RegistryInfo>>>>>,
}

impl RegistryClient {
    /// Create a new registry client
    pub fn new(config: &Config) -> SlinkResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8"
                .parse()
                .unwrap(),
        );
        headers.insert(
            reqwest::header::USER_AGENT,
            format!("slink/{}", env!("CARGO_PKG_VERSION")).parse().unwrap(),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.network.timeout))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| SlinkError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: config.registry.url.trim_end_matches('/').to_string(),
            info_cells: Mutex::new(HashMap::new()),
        })
    }

    /// Get the package document for a name, memoized for the whole run
    pub async fn info(&self, name: &str) -> SlinkResult<Arc<RegistryInfo>> {
        let cell = {
            let mut cells = self.info_cells.lock().unwrap();
            cells.entry(name.to_string()).or_default().clone()
        };

        let info = cell
            .get_or_try_init(|| async { self.fetch_info(name).await.map(Arc::new) })
            .await?;
        Ok(info.clone())
    }

    async fn fetch_info(&self, name: &str) -> SlinkResult<RegistryInfo> {
        let url = self.package_url(name);
        tracing::debug!("fetching registry document for {}", name);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SlinkError::Network(e.to_string()))?;

        if !response.status().is_success() {
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(SlinkError::PackageNotFound(name.to_string()));
            }
            return Err(SlinkError::registry(format!(
                "Failed to fetch {}: HTTP {}",
                name,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SlinkError::Network(e.to_string()))
    }

    /// Download a tarball into memory
    pub async fn download(&self, url: &str) -> SlinkResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SlinkError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SlinkError::Network(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SlinkError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// All published versions of a package, ascending
    pub async fn available_versions(&self, name: &str) -> SlinkResult<Vec<Version>> {
        let info = self.info(name).await?;
        let mut versions: Vec<Version> = info
            .versions
            .keys()
            .filter_map(|v| Version::parse(v).ok())
            .collect();
        versions.sort();
        Ok(versions)
    }

    /// The document URL for a package; scoped names keep their `@` and
    /// encode the separating slash
    fn package_url(&self, name: &str) -> String {
        let encoded = if name.starts_with('@') {
            name.replace('/', "%2f")
        } else {
            name.to_string()
        };
        format!("{}/{}", self.url, encoded)
    }
}

/// Pick the version a range resolves to against a registry document. A
/// range naming a dist-tag is substituted with the tag's version first; a
/// missing `dist-tags` map leaves `latest` to fall back to `*`.
pub fn resolve_range(info: &RegistryInfo, range: &str) -> SlinkResult<Version> {
    let range = info.dist_tags.get(range).map(String::as_str).unwrap_or(range);
    let constraint = VersionConstraint::parse(range)?;

    let candidates: Vec<Version> = info
        .versions
        .keys()
        .filter_map(|v| Version::parse(v).ok())
        .collect();

    constraint
        .max_satisfying(&candidates)
        .ok_or_else(|| SlinkError::NoMatchingVersion {
            package: info.name.clone(),
            range: range.to_string(),
        })
}

/// The tarball URL of an exact version. A version that dropped from the
/// registry after being listed, or lost its dist record, is gone.
pub fn tarball_url(info: &RegistryInfo, version: &Version) -> SlinkResult<String> {
    info.versions
        .get(&version.to_string())
        .and_then(|v| v.dist.as_ref())
        .map(|dist| dist.tarball.clone())
        .ok_or_else(|| SlinkError::VersionGone {
            package: info.name.clone(),
            version: version.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::{DistInfo, VersionInfo};

    fn info_with(versions: &[(&str, Option<&str>)], tags: &[(&str, &str)]) -> RegistryInfo {
        let mut info = RegistryInfo {
            name: "pkg".to_string(),
            ..Default::default()
        };
        for (tag, version) in tags {
            info.dist_tags.insert(tag.to_string(), version.to_string());
        }
        for (version, tarball) in versions {
            info.versions.insert(
                version.to_string(),
                VersionInfo {
                    version: version.to_string(),
                    dist: tarball.map(|t| DistInfo {
                        tarball: t.to_string(),
                    }),
                    dependencies: Default::default(),
                },
            );
        }
        info
    }

    #[test]
    fn test_resolve_range_picks_max() {
        let info = info_with(&[("1.2.0", Some("u")), ("1.3.5", Some("u")), ("2.0.0", Some("u"))], &[]);
        assert_eq!(
            resolve_range(&info, "^1.2.0").unwrap(),
            Version::new(1, 3, 5)
        );
    }

    #[test]
    fn test_resolve_dist_tag() {
        let info = info_with(
            &[("1.0.0", Some("u")), ("2.0.0-beta.1", Some("u"))],
            &[("next", "2.0.0-beta.1")],
        );
        assert_eq!(
            resolve_range(&info, "next").unwrap(),
            Version::parse("2.0.0-beta.1").unwrap()
        );
    }

    #[test]
    fn test_latest_without_dist_tags_falls_back_to_any() {
        let info = info_with(&[("1.0.0", Some("u")), ("1.5.0", Some("u"))], &[]);
        assert_eq!(
            resolve_range(&info, "latest").unwrap(),
            Version::new(1, 5, 0)
        );
    }

    #[test]
    fn test_resolve_unmatched_is_error() {
        let info = info_with(&[("1.0.0", Some("u"))], &[]);
        assert!(matches!(
            resolve_range(&info, "^2.0.0"),
            Err(SlinkError::NoMatchingVersion { .. })
        ));
    }

    #[test]
    fn test_tarball_url_and_version_gone() {
        let info = info_with(&[("1.0.0", Some("https://r/p-1.0.0.tgz")), ("2.0.0", None)], &[]);

        assert_eq!(
            tarball_url(&info, &Version::new(1, 0, 0)).unwrap(),
            "https://r/p-1.0.0.tgz"
        );
        assert!(matches!(
            tarball_url(&info, &Version::new(2, 0, 0)),
            Err(SlinkError::VersionGone { .. })
        ));
        assert!(matches!(
            tarball_url(&info, &Version::new(3, 0, 0)),
            Err(SlinkError::VersionGone { .. })
        ));
    }
}
