//! Capability coordinates and module identity

use serde::Serialize;
use std::fmt;

/// A (group, name, version) coordinate a variant claims to provide
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Capability {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl Capability {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// The identity used for conflict grouping; the version is not part of it
    pub fn coordinates(&self) -> (&str, &str) {
        (&self.group, &self.name)
    }

    /// Whether both capabilities name the same (group, name), at any version
    pub fn same_coordinates(&self, other: &Capability) -> bool {
        self.coordinates() == other.coordinates()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}

/// Identity of the module that owns a set of variants
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ModuleId {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl ModuleId {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// The capability every variant of this module carries unless it declares its own
    pub fn default_capability(&self) -> Capability {
        Capability::new(&self.group, &self.name, &self.version)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}
