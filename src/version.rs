use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// The `pep440` crate does the heavy lifting of representing release
// tuples, epochs and pre/post/dev segments; the newtype pins down
// canonical equality (1.0 == 1.0.0) and gives us a home for FromStr.
#[derive(Debug, Clone)]
pub struct Version(pub pep440::Version);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version string '{0}'")]
    Invalid(String),
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        pep440::Version::parse(s.trim())
            .map(Version)
            .ok_or_else(|| VersionError::Invalid(s.to_string()))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}
