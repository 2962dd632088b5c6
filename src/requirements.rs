//! Requirement-manifest store.
//!
//! Operates on the configured, ordered list of plain requirement files
//! (`NAME==VERSION` per line). Lookups are case-insensitive; rewrites
//! touch only the version token of matching pin lines and leave every
//! other byte of the file alone. Missing files read as empty and are
//! never created.

use crate::package_name::PackageName;
use crate::version::Version;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot rewrite {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct RequirementsStore {
    files: Vec<PathBuf>,
}

impl RequirementsStore {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Version pinned for `name` in one manifest, if any.
    pub fn get_pin(&self, path: &Path, name: &PackageName) -> Option<Version> {
        let content = fs::read_to_string(path).ok()?;
        for line in content.lines() {
            let Some(parsed) = PinLine::parse(line) else {
                continue;
            };
            if PackageName::new(parsed.name) != *name {
                continue;
            }
            match parsed.version.parse() {
                Ok(version) => return Some(version),
                Err(_) => {
                    warn!(
                        "skipping unparseable pin '{}' in {}",
                        line.trim(),
                        path.display()
                    );
                }
            }
        }
        None
    }

    /// The numerically largest pin for `name` across every configured
    /// manifest, with the file it was found in. Earlier files win ties.
    pub fn max_pin_across(&self, name: &PackageName) -> Option<(Version, PathBuf)> {
        let mut best: Option<(Version, PathBuf)> = None;
        for file in &self.files {
            let Ok(content) = fs::read_to_string(file) else {
                continue;
            };
            for line in content.lines() {
                let Some(parsed) = PinLine::parse(line) else {
                    continue;
                };
                if PackageName::new(parsed.name) != *name {
                    continue;
                }
                let Ok(version) = parsed.version.parse::<Version>() else {
                    warn!(
                        "skipping unparseable pin '{}' in {}",
                        line.trim(),
                        file.display()
                    );
                    continue;
                };
                if best.as_ref().is_none_or(|(b, _)| version > *b) {
                    best = Some((version, file.clone()));
                }
            }
        }
        best
    }

    /// Rewrite the pin for `name` in one manifest. Returns `false` when
    /// the manifest has no pin for the name (missing files included).
    pub fn set_pin(
        &self,
        path: &Path,
        name: &PackageName,
        version: &Version,
    ) -> Result<bool, ManifestError> {
        let Ok(content) = fs::read_to_string(path) else {
            return Ok(false);
        };
        let mut updated = false;
        let rewritten: Vec<String> = content
            .split('\n')
            .map(|line| {
                let Some(parsed) = PinLine::parse(line) else {
                    return line.to_string();
                };
                if PackageName::new(parsed.name) != *name {
                    return line.to_string();
                }
                updated = true;
                info!(
                    "updating {} from {} to {version} in {}",
                    parsed.name,
                    parsed.version,
                    path.display()
                );
                format!(
                    "{}{version}{}",
                    &line[..parsed.version_start],
                    &line[parsed.version_end..]
                )
            })
            .collect();
        if !updated {
            return Ok(false);
        }
        fs::write(path, rewritten.join("\n")).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }
}

/// One `NAME==VERSION` line, with the byte span of the version token so
/// rewrites can splice in a new version without disturbing anything else.
struct PinLine<'a> {
    name: &'a str,
    version: &'a str,
    version_start: usize,
    version_end: usize,
}

impl<'a> PinLine<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        let eq = line.find("==")?;
        let name = line[..eq].trim();
        if name.is_empty() {
            return None;
        }
        let rest = &line[eq + 2..];
        let version_start = eq + 2 + (rest.len() - rest.trim_start().len());
        let version = line[version_start..]
            .split(|c: char| c.is_whitespace() || c == '#')
            .next()
            .unwrap_or("");
        if version.is_empty() || version.starts_with('=') {
            return None;
        }
        Some(Self {
            name,
            version,
            version_start,
            version_end: version_start + version.len(),
        })
    }
}
