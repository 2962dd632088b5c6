//! The bounded conflict-resolution loop.
//!
//! Each iteration probes a frontier of recently-changed packages,
//! computes forward repairs (dependencies whose installed version
//! violates a declared specifier) and reverse repairs (dependents whose
//! constraint on a frontier package broke, upgraded to their trail
//! version), installs the combined candidate set, and re-seeds the
//! frontier with the packages whose installed version actually moved.
//!
//! The loop terminates on an empty candidate set, an empty frontier, or
//! the hard iteration ceiling — all three are normal exits. Every
//! internal failure (probe, index, install) degrades to a logged skip;
//! the engine always returns a history.

use crate::history::{Previous, Upgraded, UpgradeHistory};
use crate::index::PackageIndex;
use crate::install::Installer;
use crate::package_name::PackageName;
use crate::pin::Pin;
use crate::probe::EnvProbe;
use crate::requirements::RequirementsStore;
use crate::resolve;
use crate::trail;
use std::collections::BTreeSet;
use tracing::{info, warn};

pub const MAX_ITERATIONS: usize = 10;

pub struct Engine<'a, P, I, N> {
    probe: &'a P,
    index: &'a I,
    installer: &'a N,
    store: &'a RequirementsStore,
}

impl<'a, P, I, N> Engine<'a, P, I, N>
where
    P: EnvProbe,
    I: PackageIndex,
    N: Installer,
{
    pub fn new(probe: &'a P, index: &'a I, installer: &'a N, store: &'a RequirementsStore) -> Self {
        Self {
            probe,
            index,
            installer,
            store,
        }
    }

    pub fn run(&self, initial_targets: &BTreeSet<PackageName>) -> UpgradeHistory {
        let mut history = UpgradeHistory::new();
        let mut frontier = initial_targets.clone();
        let mut iteration = 0;

        info!(
            "starting dependency resolution loop for {} target(s)",
            frontier.len()
        );

        while iteration < MAX_ITERATIONS && !frontier.is_empty() {
            iteration += 1;
            info!("--- iteration {iteration}: probing {} package(s)", frontier.len());

            // All forward repairs are computed before any reverse repair,
            // and all repairs before any install.
            let mut candidates: BTreeSet<Pin> = BTreeSet::new();
            for package in &frontier {
                candidates.extend(resolve::forward_repairs(
                    self.probe, self.index, self.store, package,
                ));
            }
            for package in &frontier {
                for dependent in resolve::reverse_conflicts(self.probe, package) {
                    if let Some(pin) = self.trail_pin(&dependent) {
                        candidates.insert(pin);
                    }
                }
            }

            if candidates.is_empty() {
                info!("no more packages to upgrade; ending resolution loop");
                break;
            }
            info!(
                "iteration {iteration}: installing {} repair candidate(s)",
                candidates.len()
            );

            let mut next_frontier = BTreeSet::new();
            for pin in candidates {
                self.install_candidate(pin, &mut history, &mut next_frontier);
            }
            frontier = next_frontier;
        }

        info!("resolution loop finished after {iteration} iteration(s)");
        history
    }

    /// Trail pin for a broken reverse dependent: the mid-index version
    /// above what it currently has. `None` skips the dependent.
    fn trail_pin(&self, dependent: &PackageName) -> Option<Pin> {
        let installed = match self.probe.installed_version(dependent) {
            Ok(Some(version)) => version,
            Ok(None) => {
                warn!("reverse dependency {dependent} is not installed; skipping");
                return None;
            }
            Err(e) => {
                warn!("cannot read installed version of {dependent}: {e}; skipping");
                return None;
            }
        };
        let available = match self.index.available_versions(dependent) {
            Ok(available) => available,
            Err(e) => {
                warn!("index lookup failed for {dependent}: {e}; skipping");
                return None;
            }
        };
        match trail::select(&available, &installed) {
            Some(versions) => Some(Pin::new(dependent.clone(), versions.trail)),
            None => {
                info!("no version above {installed} on the index for {dependent}; skipping");
                None
            }
        }
    }

    fn install_candidate(
        &self,
        pin: Pin,
        history: &mut UpgradeHistory,
        next_frontier: &mut BTreeSet<PackageName>,
    ) {
        let previous = match self.probe.installed_version(pin.name()) {
            Ok(previous) => previous,
            Err(e) => {
                warn!("cannot probe {} before install: {e}; skipping", pin.name());
                return;
            }
        };

        if !self.installer.install(&pin) {
            history.record(
                pin.name().clone(),
                Previous::from(previous),
                Upgraded::InstallFailed,
            );
            return;
        }

        let post = match self.probe.installed_version(pin.name()) {
            Ok(post) => post,
            Err(e) => {
                warn!("cannot probe {} after install: {e}", pin.name());
                None
            }
        };
        let changed = previous != post;
        info!(
            "{}: {} -> {}",
            pin.name(),
            Previous::from(previous.clone()),
            post.as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "Installation failed".into())
        );
        let upgraded = match &post {
            Some(version) => Upgraded::Installed(version.clone()),
            None => Upgraded::InstallFailed,
        };
        history.record(pin.name().clone(), Previous::from(previous), upgraded);

        // Only packages that observably moved feed the next iteration.
        if changed && post.is_some() {
            next_frontier.insert(pin.name().clone());
        }
    }
}
