use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// A package in the form `group:artifact:version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl FromStr for PackageCoordinate {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [group, artifact, version]
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                Ok(Self {
                    group: group.to_string(),
                    artifact: artifact.to_string(),
                    version: version.to_string(),
                })
            }
            _ => Err(SessionError::invalid(format!(
                "invalid package coordinate '{s}', expected group:artifact:version"
            ))),
        }
    }
}

impl fmt::Display for PackageCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}
