//! The orchestration behind the CLI: normalize targets, pre-install
//! them, run the resolution loop, hand the history off, reflect it into
//! manifests and print the final report.

use crate::cli::Cli;
use crate::config::Config;
use crate::engine::Engine;
use crate::history::UpgradeHistory;
use crate::index::PyPiIndex;
use crate::install::{Installer, PipInstaller};
use crate::pin::Pin;
use crate::probe::{EnvProbe, PipProbe};
use crate::reflect::{self, CompileCommand, CompileOutcome, ReflectSummary};
use crate::requirements::RequirementsStore;
use crate::task_manifest::TaskSetOutcome;
use color_eyre::eyre::{Result, WrapErr, eyre};
use console::style;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

pub fn execute(cli: Cli) -> Result<()> {
    let mut targets = parse_targets(&cli.pins)?;
    let config = Config::load(&cli.config)
        .wrap_err_with(|| format!("cannot load configuration from {}", cli.config.display()))?;

    let store = RequirementsStore::new(config.requirement_files.clone());
    let index = PyPiIndex::from_env().wrap_err("cannot set up the package index client")?;
    let probe = PipProbe::from_env();
    let installer = PipInstaller::from_env();

    if cli.skip_max_version_check {
        info!("skipping max version check as requested");
        println!("Skipping max version check as requested");
    } else {
        raise_targets_to_curated_max(&store, &mut targets);
    }

    println!("Installing target pins (without dependencies)...");
    for pin in &targets {
        if !installer.install(pin) {
            eprintln!("warning: failed to install target {pin}");
        }
    }

    let initial: BTreeSet<_> = targets.iter().map(|pin| pin.name().clone()).collect();
    let engine = Engine::new(&probe, &index, &installer, &store);
    let mut history = engine.run(&initial);

    for pin in &targets {
        history.ensure_target(pin.name(), pin.version());
    }

    let handoff =
        std::env::var("PINFIX_HISTORY_FILE").unwrap_or_else(|_| "upgrade_history.json".into());
    if let Err(e) = history.write(Path::new(&handoff)) {
        warn!("cannot write upgrade history to {handoff}: {e}");
        eprintln!("warning: cannot write upgrade history to {handoff}: {e}");
    }

    let compiler = CompileCommand::from_env();
    let summary = reflect::reflect(&store, &config.yml_files, &history, &compiler);

    print_report(&history, &summary);
    verify_targets(&probe, &targets);
    Ok(())
}

fn parse_targets(args: &[String]) -> Result<Vec<Pin>> {
    let mut targets = Vec::new();
    for arg in args {
        for token in arg.split_whitespace() {
            let pin: Pin = token
                .parse()
                .wrap_err("expected pins like 'cryptography==42.0.8'")?;
            targets.push(pin);
        }
    }
    if targets.is_empty() {
        return Err(eyre!(
            "no package pins provided; expected 'NAME==VERSION [NAME==VERSION ...]'"
        ));
    }
    Ok(targets)
}

/// Unless suppressed, a target never downgrades a pin curated somewhere
/// in the requirement manifests: the larger of the provided version and
/// the manifest maximum wins.
fn raise_targets_to_curated_max(store: &RequirementsStore, targets: &mut [Pin]) {
    for pin in targets {
        let Some((max_version, manifest)) = store.max_pin_across(pin.name()) else {
            continue;
        };
        if max_version > *pin.version() {
            info!(
                "raising target {} from {} to {max_version} (pinned in {})",
                pin.name(),
                pin.version(),
                manifest.display()
            );
            println!(
                "Using newer manifest version for {}: {} -> {max_version}",
                pin.name(),
                pin.version()
            );
            pin.set_version(max_version);
        }
    }
}

fn print_report(history: &UpgradeHistory, summary: &ReflectSummary) {
    println!("\n--- Summary of Package Upgrades ---");
    if history.is_empty() {
        println!("(no packages were touched)");
    }
    for (name, record) in history.iter() {
        println!("{name}: {} → {}", record.previous, record.upgraded);
    }

    for (manifest, updates) in &summary.requirement_updates {
        if updates.is_empty() {
            println!("\nNo packages to update in {}", manifest.display());
            continue;
        }
        println!("\n{}", style(manifest.display()).bold());
        for update in updates {
            println!("{} ({} → {})", update.name, update.previous, update.upgraded);
        }
    }

    for (manifest, outcome) in &summary.compile_results {
        match outcome {
            CompileOutcome::Regenerated(output) => {
                println!("Compiled {} to {}", manifest.display(), output.display());
            }
            CompileOutcome::Verified => {
                println!("Compile check passed for {}", manifest.display());
            }
            CompileOutcome::Failed(message) => {
                println!(
                    "{} {}: {message}",
                    style("Failed to compile").red(),
                    manifest.display()
                );
            }
        }
    }

    for (task_file, outcomes) in &summary.task_results {
        println!("\n{}", style(task_file.display()).bold());
        for (name, outcome) in outcomes {
            match outcome {
                TaskSetOutcome::Updated { old } => println!("{name}: updated (was {old})"),
                TaskSetOutcome::Unchanged => println!("{name}: already up to date"),
                TaskSetOutcome::NotFound => println!("{name}: not present"),
                TaskSetOutcome::Error(message) => println!("{name}: error ({message})"),
            }
        }
    }

    for (manifest, message) in &summary.errors {
        println!(
            "{} {}: {message}",
            style("Manifest error in").red(),
            manifest.display()
        );
    }
}

fn verify_targets<P: EnvProbe>(probe: &P, targets: &[Pin]) {
    println!("\nVerifying installed package versions:");
    for pin in targets {
        match probe.installed_version(pin.name()) {
            Ok(Some(version)) => println!("{}=={version}", pin.name()),
            Ok(None) => println!("{}: not installed", pin.name()),
            Err(e) => println!("{}: verification failed ({e})", pin.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_name::PackageName;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn targets_split_inside_quoted_arguments() {
        let targets =
            parse_targets(&["cryptography==42.0.8 Flask==3.0.2".into(), "rich==13.7.0".into()])
                .unwrap();
        let names: Vec<&str> = targets.iter().map(|p| p.name().as_str()).collect();
        assert_eq!(names, vec!["cryptography", "flask", "rich"]);
    }

    #[test]
    fn malformed_targets_are_fatal() {
        assert!(parse_targets(&["flask".into()]).is_err());
        assert!(parse_targets(&["flask==not a version".into()]).is_err());
        assert!(parse_targets(&["   ".into()]).is_err());
    }

    #[test]
    fn curated_max_only_raises() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("requirements.txt");
        fs::write(&manifest, "flask==3.0.9\nrequests==1.0.0\n").unwrap();
        let store = RequirementsStore::new(vec![manifest]);

        let mut targets = vec![
            "flask==3.0.2".parse::<Pin>().unwrap(),
            "requests==2.31.0".parse::<Pin>().unwrap(),
            "django==5.0".parse::<Pin>().unwrap(),
        ];
        raise_targets_to_curated_max(&store, &mut targets);

        let of = |name: &str| {
            targets
                .iter()
                .find(|p| *p.name() == PackageName::new(name))
                .unwrap()
                .version()
                .to_string()
        };
        assert_eq!(of("flask"), "3.0.9", "raised to the manifest pin");
        assert_eq!(of("requests"), "2.31.0", "manifest pin is lower, kept");
        assert_eq!(of("django"), "5.0", "not curated anywhere, kept");
    }
}
