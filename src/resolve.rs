//! Forward- and reverse-conflict detection.
//!
//! Both resolvers look at one package at a time and are deliberately
//! forgiving: any probe, index or parse problem downgrades to a logged
//! skip of the affected entry, never an abort.

use crate::index::PackageIndex;
use crate::package_name::PackageName;
use crate::pin::Pin;
use crate::probe::EnvProbe;
use crate::requirements::RequirementsStore;
use crate::specifier::SpecifierSet;
use crate::version::Version;
use tracing::{info, warn};

/// Repair pins for the dependencies of `name` whose installed version
/// violates the declared specifier.
///
/// The repair version mixes two sources: the lowest public version that
/// satisfies the specifier, and the largest pin curated anywhere in the
/// requirement manifests. Taking the max of the two satisfies the
/// violated specifier without downgrading a curated pin.
pub fn forward_repairs<P: EnvProbe, I: PackageIndex>(
    probe: &P,
    index: &I,
    store: &RequirementsStore,
    name: &PackageName,
) -> Vec<Pin> {
    let deps = match probe.forward_dependencies(name) {
        Ok(deps) => deps,
        Err(e) => {
            warn!("cannot probe dependencies of {name}: {e}");
            return Vec::new();
        }
    };

    let mut repairs = Vec::new();
    for dep in deps {
        let Some(installed) = dep.installed else {
            warn!("dependency {} of {name} is not installed; skipping", dep.name);
            continue;
        };
        let raw = dep.required.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("any") {
            continue;
        }
        let spec: SpecifierSet = match raw.parse() {
            Ok(spec) => spec,
            Err(e) => {
                warn!("cannot parse specifier '{raw}' on {}: {e}; skipping", dep.name);
                continue;
            }
        };
        if spec.is_empty() || spec.contains(&installed) {
            continue;
        }

        let py_version = lowest_satisfying(index, &dep.name, &spec);
        let req_version = store.max_pin_across(&dep.name).map(|(v, _)| v);
        let chosen = match (py_version, req_version) {
            (Some(py), Some(req)) => Some(if req > py { req } else { py }),
            (Some(py), None) => Some(py),
            (None, Some(req)) => Some(req),
            (None, None) => {
                warn!("no index or manifest version satisfies '{raw}' for {}", dep.name);
                None
            }
        };
        if let Some(version) = chosen {
            info!(
                "{}: installed {installed} violates '{raw}' declared by {name}; repairing to {version}",
                dep.name
            );
            repairs.push(Pin::new(dep.name, version));
        }
    }
    repairs
}

fn lowest_satisfying<I: PackageIndex>(
    index: &I,
    name: &PackageName,
    spec: &SpecifierSet,
) -> Option<Version> {
    match index.available_versions(name) {
        Ok(versions) => versions.into_iter().find(|v| spec.contains(v)),
        Err(e) => {
            warn!("index lookup failed for {name}: {e}; skipping index candidate");
            None
        }
    }
}

/// Names of the installed packages whose constraint on `name` is broken
/// by its current installed version. Versions for these are chosen
/// later by the trail selector.
pub fn reverse_conflicts<P: EnvProbe>(probe: &P, name: &PackageName) -> Vec<PackageName> {
    let installed = match probe.installed_version(name) {
        Ok(Some(version)) => version,
        Ok(None) => {
            warn!("{name} is not installed; no reverse conflicts to check");
            return Vec::new();
        }
        Err(e) => {
            warn!("cannot read installed version of {name}: {e}");
            return Vec::new();
        }
    };
    let dependents = match probe.reverse_dependents(name) {
        Ok(dependents) => dependents,
        Err(e) => {
            warn!("cannot probe dependents of {name}: {e}");
            return Vec::new();
        }
    };

    let mut conflicted = Vec::new();
    for dep in dependents {
        // pipdeptree text output prefixes the constraint with the target
        // name; strip it so only the specifier remains.
        let constraint = strip_leading_name(dep.constraint.trim(), name);
        if constraint.is_empty() {
            continue;
        }
        let spec: SpecifierSet = match constraint.parse() {
            Ok(spec) => spec,
            Err(e) => {
                warn!(
                    "cannot parse constraint '{}' from {}: {e}; skipping",
                    dep.constraint, dep.dependent
                );
                continue;
            }
        };
        if spec.contains(&installed) {
            continue;
        }
        info!(
            "{} requires {name}{constraint} but {installed} is installed",
            dep.dependent
        );
        conflicted.push(dep.dependent);
    }
    conflicted
}

fn strip_leading_name<'a>(constraint: &'a str, name: &PackageName) -> &'a str {
    let head_len = constraint
        .find(|c: char| "<>=!~ ".contains(c))
        .unwrap_or(constraint.len());
    let head = &constraint[..head_len];
    if !head.is_empty() && PackageName::new(head) == *name {
        constraint[head_len..].trim_start()
    } else {
        constraint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeIndex, FakeProbe};
    use crate::probe::{ForwardDep, ReverseDep};
    use tempfile::TempDir;

    fn name(s: &str) -> PackageName {
        PackageName::new(s)
    }

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn empty_store() -> RequirementsStore {
        RequirementsStore::new(Vec::new())
    }

    fn store_with(content: &str) -> (TempDir, RequirementsStore) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("requirements.txt");
        std::fs::write(&path, content).unwrap();
        let store = RequirementsStore::new(vec![path]);
        (temp, store)
    }

    #[test]
    fn satisfied_and_missing_deps_yield_no_repairs() {
        let probe = FakeProbe::new().with_forward(
            "app",
            vec![
                ForwardDep {
                    name: name("ok"),
                    installed: Some(v("2.0.0")),
                    required: ">=1.0".into(),
                },
                ForwardDep {
                    name: name("missing"),
                    installed: None,
                    required: ">=1.0".into(),
                },
                ForwardDep {
                    name: name("unconstrained"),
                    installed: Some(v("0.1")),
                    required: "Any".into(),
                },
            ],
        );
        let index = FakeIndex::new();
        let repairs = forward_repairs(&probe, &index, &empty_store(), &name("app"));
        assert!(repairs.is_empty());
    }

    #[test]
    fn chooses_max_of_index_and_manifest_candidates() {
        let probe = FakeProbe::new().with_forward(
            "a",
            vec![ForwardDep {
                name: name("b"),
                installed: Some(v("1.5.0")),
                required: ">=2.0,<3.0".into(),
            }],
        );
        let index =
            FakeIndex::new().with_versions("b", &["1.5.0", "2.0.0", "2.1.0", "3.0.0"]);
        let (_temp, store) = store_with("b==2.2.0\n");

        let repairs = forward_repairs(&probe, &index, &store, &name("a"));
        assert_eq!(repairs, vec![Pin::new(name("b"), v("2.2.0"))]);
    }

    #[test]
    fn falls_back_to_lowest_index_version_without_a_curated_pin() {
        let probe = FakeProbe::new().with_forward(
            "a",
            vec![ForwardDep {
                name: name("b"),
                installed: Some(v("1.5.0")),
                required: ">=2.0,<3.0".into(),
            }],
        );
        let index =
            FakeIndex::new().with_versions("b", &["1.5.0", "2.0.0", "2.1.0", "3.0.0"]);
        let repairs = forward_repairs(&probe, &index, &empty_store(), &name("a"));
        assert_eq!(repairs, vec![Pin::new(name("b"), v("2.0.0"))]);
    }

    #[test]
    fn index_failure_skips_the_candidate_not_the_run() {
        let probe = FakeProbe::new().with_forward(
            "a",
            vec![ForwardDep {
                name: name("b"),
                installed: Some(v("1.5.0")),
                required: ">=2.0".into(),
            }],
        );
        let index = FakeIndex::new().with_failure("b");
        // no manifest candidate either -> nothing emitted, no panic
        let repairs = forward_repairs(&probe, &index, &empty_store(), &name("a"));
        assert!(repairs.is_empty());
    }

    #[test]
    fn reverse_conflicts_emit_broken_dependents_only() {
        let probe = FakeProbe::new()
            .with_installed("t", "10.0.0")
            .with_reverse(
                "t",
                vec![
                    ReverseDep {
                        dependent: name("broken"),
                        installed: Some(v("3.0.0")),
                        constraint: "<9.0".into(),
                    },
                    ReverseDep {
                        dependent: name("content"),
                        installed: Some(v("1.0.0")),
                        constraint: ">=9.0".into(),
                    },
                    ReverseDep {
                        dependent: name("agnostic"),
                        installed: Some(v("1.0.0")),
                        constraint: String::new(),
                    },
                ],
            );
        let conflicts = reverse_conflicts(&probe, &name("t"));
        assert_eq!(conflicts, vec![name("broken")]);
    }

    #[test]
    fn name_prefixed_constraints_are_stripped() {
        let probe = FakeProbe::new()
            .with_installed("cryptography", "42.0.0")
            .with_reverse(
                "cryptography",
                vec![ReverseDep {
                    dependent: name("pyopenssl"),
                    installed: Some(v("23.0.0")),
                    constraint: "cryptography<41".into(),
                }],
            );
        let conflicts = reverse_conflicts(&probe, &name("cryptography"));
        assert_eq!(conflicts, vec![name("pyopenssl")]);
    }

    #[test]
    fn bare_name_constraint_is_always_satisfied() {
        let probe = FakeProbe::new()
            .with_installed("t", "10.0.0")
            .with_reverse(
                "t",
                vec![ReverseDep {
                    dependent: name("loose"),
                    installed: Some(v("1.0.0")),
                    constraint: "t".into(),
                }],
            );
        assert!(reverse_conflicts(&probe, &name("t")).is_empty());
    }

    #[test]
    fn uninstalled_target_has_no_reverse_conflicts() {
        let probe = FakeProbe::new();
        assert!(reverse_conflicts(&probe, &name("ghost")).is_empty());
    }
}
