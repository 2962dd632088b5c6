//! Upgrade history and the handoff file.
//!
//! Every package the engine touches gets a record of the installed
//! version before and after the attempt. The history is flushed to a
//! JSON handoff file at loop exit in the shape downstream tooling
//! expects: `{"name": {"previous_version": ..., "upgraded_version": ...}}`
//! with the historical sentinel strings for the non-version states.

use crate::package_name::PackageName;
use crate::version::Version;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Installed state observed before an install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Previous {
    Installed(Version),
    NotInstalled,
    /// The package was a CLI target never touched by the loop.
    DirectInstall,
}

/// Installed state observed after an install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upgraded {
    Installed(Version),
    InstallFailed,
}

impl fmt::Display for Previous {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Previous::Installed(v) => write!(f, "{v}"),
            Previous::NotInstalled => write!(f, "Not Installed"),
            Previous::DirectInstall => write!(f, "Direct installation"),
        }
    }
}

impl fmt::Display for Upgraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upgraded::Installed(v) => write!(f, "{v}"),
            Upgraded::InstallFailed => write!(f, "Installation failed"),
        }
    }
}

impl From<Option<Version>> for Previous {
    fn from(value: Option<Version>) -> Self {
        match value {
            Some(v) => Previous::Installed(v),
            None => Previous::NotInstalled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRecord {
    pub previous: Previous,
    pub upgraded: Upgraded,
}

impl UpgradeRecord {
    /// The version now installed, when the attempt produced one.
    pub fn upgraded_version(&self) -> Option<&Version> {
        match &self.upgraded {
            Upgraded::Installed(v) => Some(v),
            Upgraded::InstallFailed => None,
        }
    }

    /// Whether this record represents an actual version change worth
    /// reflecting into manifests.
    pub fn changed(&self) -> bool {
        match (&self.previous, &self.upgraded) {
            (Previous::Installed(a), Upgraded::Installed(b)) => a != b,
            (Previous::NotInstalled | Previous::DirectInstall, Upgraded::Installed(_)) => true,
            (_, Upgraded::InstallFailed) => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct UpgradeHistory {
    records: BTreeMap<PackageName, UpgradeRecord>,
}

#[derive(Serialize)]
struct HandoffEntry {
    previous_version: String,
    upgraded_version: String,
}

impl UpgradeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: PackageName, previous: Previous, upgraded: Upgraded) {
        self.records
            .insert(name, UpgradeRecord { previous, upgraded });
    }

    /// Merge a CLI target the loop never touched.
    pub fn ensure_target(&mut self, name: &PackageName, version: &Version) {
        if !self.records.contains_key(name) {
            self.records.insert(
                name.clone(),
                UpgradeRecord {
                    previous: Previous::DirectInstall,
                    upgraded: Upgraded::Installed(version.clone()),
                },
            );
        }
    }

    pub fn get(&self, name: &PackageName) -> Option<&UpgradeRecord> {
        self.records.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageName, &UpgradeRecord)> {
        self.records.iter()
    }

    /// Records that reflect an actual upgrade, with the new version.
    pub fn changed(&self) -> impl Iterator<Item = (&PackageName, &Version)> {
        self.records.iter().filter_map(|(name, record)| {
            if record.changed() {
                record.upgraded_version().map(|v| (name, v))
            } else {
                None
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let map: BTreeMap<&str, HandoffEntry> = self
            .records
            .iter()
            .map(|(name, record)| {
                (
                    name.as_source_str(),
                    HandoffEntry {
                        previous_version: record.previous.to_string(),
                        upgraded_version: record.upgraded.to_string(),
                    },
                )
            })
            .collect();
        let json = serde_json::to_string_pretty(&map).expect("string map serializes");
        std::fs::write(path, json)
    }
}
