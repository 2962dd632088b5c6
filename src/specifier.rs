//! PEP 440 version specifiers.
//!
//! A `SpecifierSet` is a conjunction of clauses (`>=1.2, <2.0`). Clauses
//! are validated at parse time so that `contains` never fails; callers
//! treat a parse error as "not satisfiable" and skip the entry.

use crate::version::Version;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    Equal(Version),
    NotEqual(Version),
    /// `==X.*` — prefix match on X's release tuple.
    EqualWildcard(Version),
    NotEqualWildcard(Version),
    LessEqual(Version),
    Less(Version),
    GreaterEqual(Version),
    Greater(Version),
    Compatible(Version),
    /// `===literal` — string comparison, no version semantics.
    Arbitrary(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpecifierError {
    #[error("unrecognized specifier clause '{0}'")]
    BadClause(String),
    #[error("invalid version in specifier clause '{0}'")]
    BadVersion(String),
    #[error("'~={0}' needs at least a two-segment release")]
    ShortCompatible(String),
    #[error("wildcard is only valid with '==' and '!=': '{0}'")]
    BadWildcard(String),
}

/// A conjunction of specifier clauses. The empty set matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecifierSet(Vec<Clause>);

impl SpecifierSet {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.0.iter().all(|clause| clause.matches(version))
    }
}

impl FromStr for SpecifierSet {
    type Err = SpecifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // pipdeptree and task manifests occasionally quote specifiers.
        let s = s.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if s.is_empty() || s.eq_ignore_ascii_case("any") {
            return Ok(Self::any());
        }
        let mut clauses = Vec::new();
        for piece in s.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            clauses.push(parse_clause(piece)?);
        }
        Ok(Self(clauses))
    }
}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Equal(v) => write!(f, "=={v}"),
            Clause::NotEqual(v) => write!(f, "!={v}"),
            Clause::EqualWildcard(v) => write!(f, "=={v}.*"),
            Clause::NotEqualWildcard(v) => write!(f, "!={v}.*"),
            Clause::LessEqual(v) => write!(f, "<={v}"),
            Clause::Less(v) => write!(f, "<{v}"),
            Clause::GreaterEqual(v) => write!(f, ">={v}"),
            Clause::Greater(v) => write!(f, ">{v}"),
            Clause::Compatible(v) => write!(f, "~={v}"),
            Clause::Arbitrary(s) => write!(f, "==={s}"),
        }
    }
}

fn parse_clause(piece: &str) -> Result<Clause, SpecifierError> {
    // Longest operators first, so "==" never shadows "===".
    if let Some(rest) = piece.strip_prefix("===") {
        return Ok(Clause::Arbitrary(rest.trim().to_string()));
    }
    for (op, wildcard_ok) in [
        ("==", true),
        ("!=", true),
        ("<=", false),
        (">=", false),
        ("~=", false),
        ("<", false),
        (">", false),
    ] {
        let Some(rest) = piece.strip_prefix(op) else {
            continue;
        };
        let rest = rest.trim();
        let (literal, wildcard) = match rest.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (rest, false),
        };
        if wildcard && !wildcard_ok {
            return Err(SpecifierError::BadWildcard(piece.to_string()));
        }
        let version: Version = literal
            .parse()
            .map_err(|_| SpecifierError::BadVersion(piece.to_string()))?;
        return Ok(match (op, wildcard) {
            ("==", false) => Clause::Equal(version),
            ("==", true) => Clause::EqualWildcard(version),
            ("!=", false) => Clause::NotEqual(version),
            ("!=", true) => Clause::NotEqualWildcard(version),
            ("<=", _) => Clause::LessEqual(version),
            (">=", _) => Clause::GreaterEqual(version),
            ("<", _) => Clause::Less(version),
            (">", _) => Clause::Greater(version),
            ("~=", _) => {
                if version.0.release.len() < 2 {
                    return Err(SpecifierError::ShortCompatible(literal.to_string()));
                }
                Clause::Compatible(version)
            }
            _ => unreachable!(),
        });
    }
    Err(SpecifierError::BadClause(piece.to_string()))
}

impl Clause {
    fn matches(&self, candidate: &Version) -> bool {
        match self {
            Clause::Equal(v) => candidate == v,
            Clause::NotEqual(v) => candidate != v,
            Clause::EqualWildcard(v) => release_prefix_match(candidate, v),
            Clause::NotEqualWildcard(v) => !release_prefix_match(candidate, v),
            Clause::LessEqual(v) => candidate <= v,
            Clause::GreaterEqual(v) => candidate >= v,
            Clause::Less(v) => strictly_less(candidate, v),
            Clause::Greater(v) => strictly_greater(candidate, v),
            Clause::Compatible(v) => compatible_release(candidate, v),
            Clause::Arbitrary(s) => candidate.to_string() == *s,
        }
    }
}

fn release_at(v: &pep440::Version, i: usize) -> u32 {
    v.release.get(i).copied().unwrap_or(0)
}

fn same_release(a: &pep440::Version, b: &pep440::Version) -> bool {
    let len = a.release.len().max(b.release.len());
    (0..len).all(|i| release_at(a, i) == release_at(b, i))
}

fn release_starts_with(candidate: &pep440::Version, prefix: &[u32]) -> bool {
    prefix
        .iter()
        .enumerate()
        .all(|(i, part)| release_at(candidate, i) == *part)
}

fn release_prefix_match(candidate: &Version, prefix: &Version) -> bool {
    candidate.0.epoch == prefix.0.epoch && release_starts_with(&candidate.0, &prefix.0.release)
}

/// `~=X.Y.Z` is `>= X.Y.Z` plus `== X.Y.*`.
fn compatible_release(candidate: &Version, base: &Version) -> bool {
    candidate >= base
        && candidate.0.epoch == base.0.epoch
        && release_starts_with(
            &candidate.0,
            &base.0.release[..base.0.release.len() - 1],
        )
}

/// `<V` must not match a pre-release of V unless V is itself one.
fn strictly_less(candidate: &Version, bound: &Version) -> bool {
    if candidate >= bound {
        return false;
    }
    if bound.0.pre.is_none()
        && bound.0.dev.is_none()
        && (candidate.0.pre.is_some() || candidate.0.dev.is_some())
        && candidate.0.epoch == bound.0.epoch
        && same_release(&candidate.0, &bound.0)
    {
        return false;
    }
    true
}

/// `>V` must not match a post-release or local variant of V unless V is
/// itself one.
fn strictly_greater(candidate: &Version, bound: &Version) -> bool {
    if candidate <= bound {
        return false;
    }
    let same_base = candidate.0.epoch == bound.0.epoch && same_release(&candidate.0, &bound.0);
    if bound.0.post.is_none()
        && bound.0.dev.is_none()
        && candidate.0.post.is_some()
        && same_base
        && candidate.0.pre == bound.0.pre
    {
        return false;
    }
    if same_base
        && candidate.0.pre == bound.0.pre
        && candidate.0.post == bound.0.post
        && candidate.0.dev == bound.0.dev
        && !candidate.0.local.is_empty()
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn spec(s: &str) -> SpecifierSet {
        s.parse().unwrap()
    }

    #[test]
    fn empty_and_any_match_everything() {
        assert!(spec("").contains(&v("0.0.1")));
        assert!(spec("any").contains(&v("99.0")));
        assert!(spec("Any").is_empty());
    }

    #[test]
    fn conjunction_of_bounds() {
        let s = spec(">=2.0,<3.0");
        assert!(!s.contains(&v("1.5.0")));
        assert!(s.contains(&v("2.0.0")));
        assert!(s.contains(&v("2.2.0")));
        assert!(!s.contains(&v("3.0.0")));
    }

    #[test]
    fn equality_and_exclusion() {
        assert!(spec("==1.4").contains(&v("1.4.0")));
        assert!(!spec("!=1.4").contains(&v("1.4.0")));
        assert!(spec("!=1.4").contains(&v("1.4.1")));
    }

    #[test]
    fn wildcards_match_release_prefix() {
        let s = spec("==1.4.*");
        assert!(s.contains(&v("1.4.0")));
        assert!(s.contains(&v("1.4.9")));
        assert!(s.contains(&v("1.4.1a1")));
        assert!(!s.contains(&v("1.5.0")));
        assert!(!spec("!=1.4.*").contains(&v("1.4.2")));
    }

    #[test]
    fn compatible_release_semantics() {
        let s = spec("~=1.4.2");
        assert!(s.contains(&v("1.4.2")));
        assert!(s.contains(&v("1.4.9")));
        assert!(!s.contains(&v("1.5.0")));
        assert!(!s.contains(&v("1.4.1")));

        let s = spec("~=2.2");
        assert!(s.contains(&v("2.2.0")));
        assert!(s.contains(&v("2.9")));
        assert!(!s.contains(&v("3.0")));

        assert!("~=2".parse::<SpecifierSet>().is_err());
    }

    #[test]
    fn exclusive_bounds_skip_releases_of_the_boundary() {
        // <2.0 must not admit 2.0's own pre-releases.
        assert!(!spec("<2.0").contains(&v("2.0a1")));
        assert!(spec("<2.0").contains(&v("1.9")));
        // but a pre-release bound admits earlier pre-releases of itself.
        assert!(spec("<2.0b1").contains(&v("2.0a1")));

        // >2.0 must not admit 2.0's post-releases or local variants.
        assert!(!spec(">2.0").contains(&v("2.0.post1")));
        assert!(!spec(">2.0").contains(&v("2.0+local")));
        assert!(spec(">2.0").contains(&v("2.1")));
        assert!(spec(">2.0.post1").contains(&v("2.0.post2")));
    }

    #[test]
    fn arbitrary_equality_is_literal() {
        assert!(spec("===1.0").contains(&v("1.0")));
        assert!(!spec("===1.0").contains(&v("1.0.0")));
    }

    #[test]
    fn quoted_specifiers_are_tolerated() {
        assert!(spec("\">=1.0\"").contains(&v("1.5")));
    }

    #[test]
    fn bad_clauses_are_parse_errors() {
        assert!("@=1.0".parse::<SpecifierSet>().is_err());
        assert!(">=not.a.version".parse::<SpecifierSet>().is_err());
        assert!(">=1.*".parse::<SpecifierSet>().is_err());
    }
}
