use crate::package_name::PackageName;
use crate::version::Version;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An exact-version requirement, `name==version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    name: PackageName,
    version: Version,
}

#[derive(Debug, Clone, Error)]
pub enum PinError {
    #[error("'{0}' is not of the form NAME==VERSION")]
    MissingSeparator(String),
    #[error("pin '{0}' has an empty package name")]
    EmptyName(String),
    #[error("pin '{spec}' has an invalid version: {source}")]
    BadVersion {
        spec: String,
        source: crate::version::VersionError,
    },
}

impl Pin {
    pub fn new(name: PackageName, version: Version) -> Self {
        Self { name, version }
    }

    pub fn name(&self) -> &PackageName {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

impl FromStr for Pin {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        let (name, version) = spec
            .split_once("==")
            .ok_or_else(|| PinError::MissingSeparator(spec.to_string()))?;
        let name = PackageName::new(name);
        if name.is_empty() {
            return Err(PinError::EmptyName(spec.to_string()));
        }
        let version = version.trim().parse().map_err(|source| PinError::BadVersion {
            spec: spec.to_string(),
            source,
        })?;
        Ok(Pin { name, version })
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

impl PartialOrd for Pin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pin {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.version.cmp(&other.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_version() {
        let pin: Pin = "Flask==3.0.2".parse().unwrap();
        assert_eq!(pin.name().as_str(), "flask");
        assert_eq!(pin.version().to_string(), "3.0.2");
        assert_eq!(pin.to_string(), "Flask==3.0.2");
    }

    #[test]
    fn rejects_bare_names_and_bad_versions() {
        assert!("flask".parse::<Pin>().is_err());
        assert!("flask==".parse::<Pin>().is_err());
        assert!("==1.0".parse::<Pin>().is_err());
        assert!("flask==not.a.version!".parse::<Pin>().is_err());
    }
}
