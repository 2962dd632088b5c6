use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A Python package name that remembers how it was spelled.
///
/// Keeps the original spelling for display and file rewrites, plus the
/// PEP 503 normalized form (case-folded, `-`/`_`/`.` collapsed to `-`)
/// used for every comparison and lookup.
#[derive(Debug, Clone)]
pub struct PackageName {
    source: Box<str>,
    normalized: Box<str>,
}

impl PackageName {
    pub fn new(s: &str) -> Self {
        let source = s.trim();
        let mut normalized = source.replace(['-', '_', '.'], "-");
        normalized.make_ascii_lowercase();
        Self {
            source: source.into(),
            normalized: normalized.into(),
        }
    }

    /// The spelling this name was created from.
    pub fn as_source_str(&self) -> &str {
        &self.source
    }

    /// The normalized form used for comparisons.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for PackageName {}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.normalized
    }
}
