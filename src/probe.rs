//! Local environment probe.
//!
//! Answers three questions about the running Python environment: what
//! version of a package is installed, what does a package's installed
//! release declare as dependencies, and who depends on a package. The
//! live implementation shells out to `pip show` and `pipdeptree --json`;
//! the engine only sees the [`EnvProbe`] contract.

use crate::package_name::PackageName;
use crate::version::Version;
use serde::Deserialize;
use std::process::Command;
use thiserror::Error;
use tracing::warn;

/// A dependency declared by the probed package.
#[derive(Debug, Clone)]
pub struct ForwardDep {
    pub name: PackageName,
    /// `None` when the dependency is not installed (pipdeptree's `?`).
    pub installed: Option<Version>,
    /// The specifier exactly as declared, e.g. `>=2.0,<3.0` or `Any`.
    pub required: String,
}

/// A package in the environment that depends on the probed package.
#[derive(Debug, Clone)]
pub struct ReverseDep {
    pub dependent: PackageName,
    pub installed: Option<Version>,
    /// The constraint the dependent places on the probed package.
    pub constraint: String,
}

#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("failed to run {command}: {message}")]
    Spawn { command: String, message: String },
    #[error("unreadable probe output: {0}")]
    Parse(String),
}

pub trait EnvProbe {
    fn installed_version(&self, name: &PackageName) -> Result<Option<Version>, ProbeError>;
    fn forward_dependencies(&self, name: &PackageName) -> Result<Vec<ForwardDep>, ProbeError>;
    fn reverse_dependents(&self, name: &PackageName) -> Result<Vec<ReverseDep>, ProbeError>;
}

/// Probe backed by `pip` and `pipdeptree` subprocesses.
///
/// Binaries are overridable via `PINFIX_PIP` and `PINFIX_PIPDEPTREE`,
/// which is also the seam the integration tests use to substitute stub
/// scripts.
pub struct PipProbe {
    pip: String,
    pipdeptree: String,
}

impl PipProbe {
    pub fn from_env() -> Self {
        Self {
            pip: std::env::var("PINFIX_PIP").unwrap_or_else(|_| "pip3".to_string()),
            pipdeptree: std::env::var("PINFIX_PIPDEPTREE")
                .unwrap_or_else(|_| "pipdeptree".to_string()),
        }
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<std::process::Output, ProbeError> {
        Command::new(program)
            .args(args)
            .output()
            .map_err(|e| ProbeError::Spawn {
                command: format!("{program} {}", args.join(" ")),
                message: e.to_string(),
            })
    }

    fn deptree_json(&self, name: &PackageName, reverse: bool) -> Result<Vec<DeptreeEntry>, ProbeError> {
        let mut args = vec!["-p", name.as_str()];
        if reverse {
            args.push("--reverse");
        }
        args.push("--json");
        let output = self.run(&self.pipdeptree, &args)?;
        if !output.status.success() {
            return Err(ProbeError::Spawn {
                command: format!("{} -p {}", self.pipdeptree, name.as_str()),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        serde_json::from_slice(&output.stdout).map_err(|e| ProbeError::Parse(e.to_string()))
    }
}

impl EnvProbe for PipProbe {
    fn installed_version(&self, name: &PackageName) -> Result<Option<Version>, ProbeError> {
        let output = self.run(&self.pip, &["show", name.as_str()])?;
        if !output.status.success() {
            return Ok(None);
        }
        parse_show_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn forward_dependencies(&self, name: &PackageName) -> Result<Vec<ForwardDep>, ProbeError> {
        let entries = self.deptree_json(name, false)?;
        Ok(forward_deps_of(&entries, name))
    }

    fn reverse_dependents(&self, name: &PackageName) -> Result<Vec<ReverseDep>, ProbeError> {
        let entries = self.deptree_json(name, true)?;
        Ok(reverse_deps_of(&entries, name))
    }
}

fn parse_show_output(stdout: &str) -> Result<Option<Version>, ProbeError> {
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Version:") {
            return rest
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| ProbeError::Parse(format!("pip show reported {e}")));
        }
    }
    Ok(None)
}

/// The record shape pipdeptree emits with `--json`.
#[derive(Debug, Deserialize)]
struct DeptreeEntry {
    package: DeptreePackage,
    #[serde(default)]
    dependencies: Vec<DeptreeDep>,
}

#[derive(Debug, Deserialize)]
struct DeptreePackage {
    key: String,
    #[serde(default)]
    package_name: Option<String>,
    #[serde(default)]
    installed_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeptreeDep {
    key: String,
    #[serde(default)]
    package_name: Option<String>,
    #[serde(default)]
    installed_version: Option<String>,
    #[serde(default)]
    required_version: Option<String>,
}

fn parse_installed(raw: &Option<String>, owner: &str) -> Option<Version> {
    let raw = raw.as_deref()?.trim();
    if raw.is_empty() || raw == "?" {
        return None;
    }
    match raw.parse() {
        Ok(version) => Some(version),
        Err(_) => {
            warn!("ignoring unparseable installed version '{raw}' of {owner}");
            None
        }
    }
}

fn forward_deps_of(entries: &[DeptreeEntry], target: &PackageName) -> Vec<ForwardDep> {
    let Some(entry) = entries
        .iter()
        .find(|e| PackageName::new(&e.package.key) == *target)
    else {
        return Vec::new();
    };
    entry
        .dependencies
        .iter()
        .map(|dep| {
            let spelled = dep.package_name.as_deref().unwrap_or(&dep.key);
            ForwardDep {
                name: PackageName::new(spelled),
                installed: parse_installed(&dep.installed_version, spelled),
                required: dep.required_version.clone().unwrap_or_else(|| "Any".into()),
            }
        })
        .collect()
}

fn reverse_deps_of(entries: &[DeptreeEntry], target: &PackageName) -> Vec<ReverseDep> {
    let mut out = Vec::new();
    for entry in entries {
        let dependent_name = entry
            .package
            .package_name
            .as_deref()
            .unwrap_or(&entry.package.key);
        let dependent = PackageName::new(dependent_name);
        if dependent == *target {
            continue;
        }
        for dep in &entry.dependencies {
            if PackageName::new(&dep.key) != *target {
                continue;
            }
            out.push(ReverseDep {
                dependent: dependent.clone(),
                installed: parse_installed(&entry.package.installed_version, dependent_name),
                constraint: dep.required_version.clone().unwrap_or_default(),
            });
        }
    }
    out
}
