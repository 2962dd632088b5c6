//! Reflecting recorded upgrades back into source-controlled manifests.
//!
//! Runs after the resolution loop: every requirement manifest gets its
//! pins raised to the upgraded versions (never lowered), every task
//! manifest gets its pin occurrences rewritten, and manifests that
//! changed are run through the pin compiler. Nothing in here fails the
//! run; problems land in the summary and the log.

use crate::history::UpgradeHistory;
use crate::package_name::PackageName;
use crate::requirements::RequirementsStore;
use crate::task_manifest::{self, TaskSetOutcome};
use crate::version::Version;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementUpdate {
    pub name: PackageName,
    pub previous: Version,
    pub upgraded: Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// A build-pin input (`.in`) had its compiled companion regenerated.
    Regenerated(PathBuf),
    /// A plain manifest compiled cleanly; the transient output was removed.
    Verified,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct ReflectSummary {
    /// Per configured requirement manifest, the pins that were raised.
    pub requirement_updates: Vec<(PathBuf, Vec<RequirementUpdate>)>,
    /// Compile results for the manifests that received updates.
    pub compile_results: Vec<(PathBuf, CompileOutcome)>,
    /// Per configured task manifest, the outcome for every upgraded package.
    pub task_results: Vec<(PathBuf, Vec<(PackageName, TaskSetOutcome)>)>,
    /// Manifest I/O problems, reported but never fatal.
    pub errors: Vec<(PathBuf, String)>,
}

/// How to invoke the external pin compiler. The default is
/// `python3 -m piptools compile`; `PINFIX_PIP_COMPILE` substitutes a
/// different executable wholesale.
pub struct CompileCommand {
    program: String,
    pre_args: Vec<String>,
}

impl CompileCommand {
    pub fn from_env() -> Self {
        match std::env::var("PINFIX_PIP_COMPILE") {
            Ok(program) => Self {
                program,
                pre_args: Vec::new(),
            },
            Err(_) => Self {
                program: "python3".to_string(),
                pre_args: vec!["-m".into(), "piptools".into(), "compile".into()],
            },
        }
    }

    #[cfg(test)]
    pub fn custom(program: &str) -> Self {
        Self {
            program: program.to_string(),
            pre_args: Vec::new(),
        }
    }

    /// Compile one manifest with the allow-unsafe policy. For `.in`
    /// inputs the compiled companion (`<stem>.txt`) is kept; for
    /// anything else the compile is a consistency check and its output
    /// is removed afterwards.
    fn compile(&self, manifest: &Path) -> CompileOutcome {
        let is_pin_input = manifest.extension().is_some_and(|ext| ext == "in");
        let output_path = if is_pin_input {
            manifest.with_extension("txt")
        } else {
            let compiled_name = format!(
                "compiled_{}",
                manifest
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            );
            manifest.with_file_name(compiled_name)
        };

        info!(
            "compiling {} to {}",
            manifest.display(),
            output_path.display()
        );
        let result = Command::new(&self.program)
            .args(&self.pre_args)
            .arg(manifest)
            .arg("--allow-unsafe")
            .arg("--output-file")
            .arg(&output_path)
            .output();

        match result {
            Ok(out) if out.status.success() && output_path.exists() => {
                if is_pin_input {
                    CompileOutcome::Regenerated(output_path)
                } else {
                    if let Err(e) = std::fs::remove_file(&output_path) {
                        warn!(
                            "cannot remove transient {}: {e}",
                            output_path.display()
                        );
                    }
                    CompileOutcome::Verified
                }
            }
            Ok(out) => {
                let message = String::from_utf8_lossy(&out.stderr).trim().to_string();
                error!("pin compile failed for {}: {message}", manifest.display());
                CompileOutcome::Failed(message)
            }
            Err(e) => {
                error!("cannot run {}: {e}", self.program);
                CompileOutcome::Failed(e.to_string())
            }
        }
    }
}

pub fn reflect(
    store: &RequirementsStore,
    yml_files: &[PathBuf],
    history: &UpgradeHistory,
    compiler: &CompileCommand,
) -> ReflectSummary {
    let mut summary = ReflectSummary::default();
    let changed: Vec<(&PackageName, &Version)> = history.changed().collect();

    for manifest in store.files() {
        let mut updates = Vec::new();
        for (name, upgraded) in &changed {
            let Some(current) = store.get_pin(manifest, name) else {
                continue;
            };
            if current >= **upgraded {
                continue;
            }
            match store.set_pin(manifest, name, upgraded) {
                Ok(true) => updates.push(RequirementUpdate {
                    name: (*name).clone(),
                    previous: current,
                    upgraded: (*upgraded).clone(),
                }),
                Ok(false) => {}
                Err(e) => {
                    summary.errors.push((manifest.clone(), e.to_string()));
                }
            }
        }
        if !updates.is_empty() {
            summary
                .compile_results
                .push((manifest.clone(), compiler.compile(manifest)));
        }
        summary.requirement_updates.push((manifest.clone(), updates));
    }

    for task_file in yml_files {
        let mut outcomes = Vec::new();
        for (name, upgraded) in &changed {
            let outcome = task_manifest::set_pin(task_file, name, upgraded);
            outcomes.push(((*name).clone(), outcome));
        }
        summary.task_results.push((task_file.clone(), outcomes));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{Previous, Upgraded};
    use std::fs;
    use tempfile::TempDir;

    fn name(s: &str) -> PackageName {
        PackageName::new(s)
    }

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    /// A stand-in pin compiler: copies the input to the requested
    /// output file, mirroring a successful `piptools compile`.
    fn stub_compiler(dir: &Path) -> CompileCommand {
        let script = dir.join("fake-compile.sh");
        fs::write(&script, "#!/bin/sh\ncp \"$1\" \"$4\"\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        }
        CompileCommand::custom(&script.to_string_lossy())
    }

    fn history_with(entries: &[(&str, &str, &str)]) -> UpgradeHistory {
        let mut history = UpgradeHistory::new();
        for (pkg, prev, new) in entries {
            history.record(
                name(pkg),
                Previous::Installed(v(prev)),
                Upgraded::Installed(v(new)),
            );
        }
        history
    }

    #[test]
    fn raises_lower_pins_and_leaves_higher_ones() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("requirements.txt");
        fs::write(&manifest, "flask==3.0.0\nrequests==9.9.9\n").unwrap();
        let store = RequirementsStore::new(vec![manifest.clone()]);
        let history = history_with(&[
            ("flask", "3.0.0", "3.0.2"),
            ("requests", "2.30.0", "2.31.0"),
        ]);

        let summary = reflect(&store, &[], &history, &stub_compiler(temp.path()));

        let (_, updates) = &summary.requirement_updates[0];
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].name, name("flask"));
        assert_eq!(updates[0].upgraded, v("3.0.2"));
        let content = fs::read_to_string(&manifest).unwrap();
        assert!(content.contains("flask==3.0.2"));
        assert!(content.contains("requests==9.9.9"), "never downgraded");
    }

    #[test]
    fn unchanged_history_entries_are_not_reflected() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("requirements.txt");
        fs::write(&manifest, "flask==3.0.0\n").unwrap();
        let store = RequirementsStore::new(vec![manifest.clone()]);

        let mut history = UpgradeHistory::new();
        history.record(
            name("flask"),
            Previous::Installed(v("3.0.0")),
            Upgraded::Installed(v("3.0.0")),
        );

        let summary = reflect(&store, &[], &history, &stub_compiler(temp.path()));
        assert!(summary.requirement_updates[0].1.is_empty());
        assert!(summary.compile_results.is_empty());
    }

    #[test]
    fn pin_inputs_regenerate_their_compiled_companion() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("base.in");
        fs::write(&manifest, "flask==3.0.0\n").unwrap();
        let store = RequirementsStore::new(vec![manifest.clone()]);
        let history = history_with(&[("flask", "3.0.0", "3.0.2")]);

        let summary = reflect(&store, &[], &history, &stub_compiler(temp.path()));

        let companion = temp.path().join("base.txt");
        assert_eq!(
            summary.compile_results[0].1,
            CompileOutcome::Regenerated(companion.clone())
        );
        assert!(companion.exists());
        assert!(
            fs::read_to_string(companion)
                .unwrap()
                .contains("flask==3.0.2")
        );
    }

    #[test]
    fn plain_manifests_only_get_a_transient_compile() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("requirements.txt");
        fs::write(&manifest, "flask==3.0.0\n").unwrap();
        let store = RequirementsStore::new(vec![manifest.clone()]);
        let history = history_with(&[("flask", "3.0.0", "3.0.2")]);

        let summary = reflect(&store, &[], &history, &stub_compiler(temp.path()));

        assert_eq!(summary.compile_results[0].1, CompileOutcome::Verified);
        assert!(!temp.path().join("compiled_requirements.txt").exists());
    }

    #[test]
    fn task_manifests_collect_every_outcome() {
        let temp = TempDir::new().unwrap();
        let task = temp.path().join("main.yml");
        fs::write(&task, "    - Flask==3.0.0\n    - requests==2.31.0\n").unwrap();
        let store = RequirementsStore::new(Vec::new());
        let history = history_with(&[
            ("flask", "3.0.0", "3.0.2"),
            ("requests", "2.30.0", "2.31.0"),
            ("django", "4.0.0", "5.0.0"),
        ]);

        let summary = reflect(&store, &[task.clone()], &history, &stub_compiler(temp.path()));

        let (_, outcomes) = &summary.task_results[0];
        let of = |pkg: &str| {
            outcomes
                .iter()
                .find(|(n, _)| *n == name(pkg))
                .map(|(_, o)| o.clone())
                .unwrap()
        };
        assert_eq!(
            of("flask"),
            TaskSetOutcome::Updated {
                old: "3.0.0".into()
            }
        );
        assert_eq!(of("requests"), TaskSetOutcome::Unchanged);
        assert_eq!(of("django"), TaskSetOutcome::NotFound);
    }

    #[test]
    fn failed_compiles_are_reported_not_raised() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("requirements.txt");
        fs::write(&manifest, "flask==3.0.0\n").unwrap();
        let store = RequirementsStore::new(vec![manifest.clone()]);
        let history = history_with(&[("flask", "3.0.0", "3.0.2")]);

        let compiler = CompileCommand::custom("/nonexistent/pin-compiler");
        let summary = reflect(&store, &[], &history, &compiler);
        assert!(matches!(
            summary.compile_results[0].1,
            CompileOutcome::Failed(_)
        ));
    }
}
