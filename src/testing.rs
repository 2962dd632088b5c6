//! In-memory doubles for the engine's collaborators, used across the
//! unit tests.

use crate::index::{IndexError, PackageIndex};
use crate::install::Installer;
use crate::package_name::PackageName;
use crate::pin::Pin;
use crate::probe::{EnvProbe, ForwardDep, ProbeError, ReverseDep};
use crate::version::Version;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

pub type SharedEnv = Rc<RefCell<BTreeMap<PackageName, Version>>>;

/// Probe over a scripted environment. Installed versions live in a
/// shared map so a [`FakeInstaller`] can mutate them mid-run.
pub struct FakeProbe {
    env: SharedEnv,
    forward: BTreeMap<PackageName, Vec<ForwardDep>>,
    reverse: BTreeMap<PackageName, Vec<ReverseDep>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self {
            env: Rc::new(RefCell::new(BTreeMap::new())),
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
        }
    }

    pub fn env(&self) -> SharedEnv {
        Rc::clone(&self.env)
    }

    pub fn with_installed(self, name: &str, version: &str) -> Self {
        self.env.borrow_mut().insert(
            PackageName::new(name),
            version.parse().expect("test version"),
        );
        self
    }

    pub fn with_forward(mut self, name: &str, deps: Vec<ForwardDep>) -> Self {
        self.forward.insert(PackageName::new(name), deps);
        self
    }

    pub fn with_reverse(mut self, name: &str, deps: Vec<ReverseDep>) -> Self {
        self.reverse.insert(PackageName::new(name), deps);
        self
    }
}

impl EnvProbe for FakeProbe {
    fn installed_version(&self, name: &PackageName) -> Result<Option<Version>, ProbeError> {
        Ok(self.env.borrow().get(name).cloned())
    }

    fn forward_dependencies(&self, name: &PackageName) -> Result<Vec<ForwardDep>, ProbeError> {
        Ok(self.forward.get(name).cloned().unwrap_or_default())
    }

    fn reverse_dependents(&self, name: &PackageName) -> Result<Vec<ReverseDep>, ProbeError> {
        Ok(self.reverse.get(name).cloned().unwrap_or_default())
    }
}

/// Installer that updates the shared environment, with an optional set
/// of packages whose installs fail.
pub struct FakeInstaller {
    env: SharedEnv,
    failing: BTreeSet<PackageName>,
    pub installed: RefCell<Vec<Pin>>,
}

impl FakeInstaller {
    pub fn new(env: SharedEnv) -> Self {
        Self {
            env,
            failing: BTreeSet::new(),
            installed: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(PackageName::new(name));
        self
    }
}

impl Installer for FakeInstaller {
    fn install(&self, pin: &Pin) -> bool {
        self.installed.borrow_mut().push(pin.clone());
        if self.failing.contains(pin.name()) {
            return false;
        }
        self.env
            .borrow_mut()
            .insert(pin.name().clone(), pin.version().clone());
        true
    }
}

/// Index with scripted version lists; lookups on `with_failure` names
/// return `IndexError::Unavailable`.
pub struct FakeIndex {
    versions: BTreeMap<PackageName, Vec<Version>>,
    failing: BTreeSet<PackageName>,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self {
            versions: BTreeMap::new(),
            failing: BTreeSet::new(),
        }
    }

    pub fn with_versions(mut self, name: &str, versions: &[&str]) -> Self {
        let mut parsed: Vec<Version> = versions
            .iter()
            .map(|s| s.parse().expect("test version"))
            .collect();
        parsed.sort();
        self.versions.insert(PackageName::new(name), parsed);
        self
    }

    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.insert(PackageName::new(name));
        self
    }
}

impl PackageIndex for FakeIndex {
    fn available_versions(&self, name: &PackageName) -> Result<Vec<Version>, IndexError> {
        if self.failing.contains(name) {
            return Err(IndexError::Unavailable("scripted failure".into()));
        }
        Ok(self.versions.get(name).cloned().unwrap_or_default())
    }
}
