//! Package index client.
//!
//! The engine only ever asks one question of the index: which public
//! versions exist for a package, sorted ascending. The live
//! implementation talks to the PyPI JSON API; tests substitute an
//! in-memory impl of [`PackageIndex`].

use crate::package_name::PackageName;
use crate::version::Version;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, thiserror::Error)]
pub enum IndexError {
    #[error("package index unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for IndexError {
    fn from(value: reqwest::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

pub trait PackageIndex {
    /// All public versions of `name`, ascending. Entries the index lists
    /// with an unparseable version string are dropped, not fatal.
    fn available_versions(&self, name: &PackageName) -> Result<Vec<Version>, IndexError>;
}

/// Index backed by the PyPI JSON API.
pub struct PyPiIndex {
    base: String,
    http: reqwest::blocking::Client,
}

impl PyPiIndex {
    /// Base URL comes from `PINFIX_PYPI_BASE_URL` (default
    /// `https://pypi.org`), so tests can point at a local mock.
    pub fn from_env() -> Result<Self, IndexError> {
        let base = std::env::var("PINFIX_PYPI_BASE_URL")
            .unwrap_or_else(|_| "https://pypi.org".to_string());
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::blocking::Client::builder()
                .user_agent(concat!("pinfix/", env!("CARGO_PKG_VERSION")))
                .build()?,
        })
    }
}

impl PackageIndex for PyPiIndex {
    fn available_versions(&self, name: &PackageName) -> Result<Vec<Version>, IndexError> {
        let url = format!("{}/pypi/{}/json", self.base, name.as_str());
        let resp = self.http.get(&url).send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            // Unknown package: a valid answer, not a transport failure.
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(IndexError::Unavailable(format!(
                "GET {url} returned {}",
                resp.status()
            )));
        }
        let body: ProjectResponse = resp.json()?;
        let mut versions = Vec::new();
        for (release, files) in body.releases {
            if files.is_empty() || files.iter().all(|f| f.yanked.unwrap_or(false)) {
                continue;
            }
            match release.parse::<Version>() {
                Ok(version) => versions.push(version),
                Err(_) => warn!("dropping unparseable release '{release}' of {name}"),
            }
        }
        versions.sort();
        Ok(versions)
    }
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    releases: HashMap<String, Vec<ReleaseFile>>,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    #[serde(default)]
    yanked: Option<bool>,
}
