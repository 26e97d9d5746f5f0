//! Resolution configuration (variants.toml)
//!
//! Settings are loaded from a TOML file, then environment variables are
//! applied on top:
//! - `ATLAS_VARIANT_PARALLEL`: resolve edges in parallel (`true`/`false`/`1`/`0`)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name
pub const CONFIG_FILE: &str = "variants.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ResolutionConfig {
    #[serde(default)]
    pub schema: SchemaSection,

    #[serde(default)]
    pub resolution: ResolutionSection,

    #[serde(default)]
    pub capabilities: CapabilitySection,
}

/// `[schema]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SchemaSection {
    /// Explicit disambiguation order; unlisted attributes follow in registration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precedence: Vec<String>,
}

/// `[resolution]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResolutionSection {
    /// Match independent edges on the rayon thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

impl Default for ResolutionSection {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
        }
    }
}

/// `[capabilities]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CapabilitySection {
    /// `"group:name" = "version"` entries sanctioning a capability conflict
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, String>,
}

impl ResolutionConfig {
    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        Self::parse(content, Path::new("<string>"))
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Load `variants.toml` from a directory, or defaults when it is absent,
    /// then apply environment overrides
    pub fn load_from_directory(dir: &Path) -> ConfigResult<Self> {
        Self::load_from_directory_with(dir, |key| env::var(key).ok())
    }

    /// Like [`load_from_directory`](Self::load_from_directory), with overrides
    /// read from `lookup` instead of the process environment
    pub fn load_from_directory_with<F>(dir: &Path, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = dir.join(CONFIG_FILE);
        let config = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides_from(lookup)
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Apply `ATLAS_VARIANT_*` environment variables
    pub fn apply_env_overrides(self) -> ConfigResult<Self> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(parallel) = lookup("ATLAS_VARIANT_PARALLEL") {
            self.resolution.parallel = match parallel.to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "ATLAS_VARIANT_PARALLEL".to_string(),
                        reason: format!("expected a boolean, found '{}'", other),
                    })
                }
            };
        }

        Ok(self)
    }

    fn parse(content: &str, file: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|error| ConfigError::TomlParseError {
            file: file.to_path_buf(),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ResolutionConfig::default();
        assert!(config.resolution.parallel);
        assert!(config.schema.precedence.is_empty());
        assert!(config.capabilities.overrides.is_empty());
    }

    #[test]
    fn test_parse_all_sections() {
        let config = ResolutionConfig::from_str(
            r#"
[schema]
precedence = ["bundling", "usage"]

[resolution]
parallel = false

[capabilities.overrides]
"com.foo:bar" = "2.0"
"#,
        )
        .unwrap();

        assert_eq!(config.schema.precedence, vec!["bundling", "usage"]);
        assert!(!config.resolution.parallel);
        assert_eq!(
            config.capabilities.overrides.get("com.foo:bar"),
            Some(&"2.0".to_string())
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ResolutionConfig::from_str("[resolution]\nthreads = 4\n");
        assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
    }

    #[test]
    fn test_env_override() {
        let config = ResolutionConfig::default()
            .apply_overrides_from(|key| {
                (key == "ATLAS_VARIANT_PARALLEL").then(|| "0".to_string())
            })
            .unwrap();
        assert!(!config.resolution.parallel);

        let result = ResolutionConfig::default()
            .apply_overrides_from(|_| Some("sometimes".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_load_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "[schema]\nprecedence = [\"usage\"]\n",
        )
        .unwrap();

        let config =
            ResolutionConfig::load_from_directory_with(temp_dir.path(), |_| None).unwrap();
        assert_eq!(config.schema.precedence, vec!["usage"]);
        assert!(config.resolution.parallel);
    }

    #[test]
    fn test_load_from_directory_applies_overrides() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "[resolution]\nparallel = true\n",
        )
        .unwrap();

        let config = ResolutionConfig::load_from_directory_with(temp_dir.path(), |key| {
            (key == "ATLAS_VARIANT_PARALLEL").then(|| "no".to_string())
        })
        .unwrap();
        assert!(!config.resolution.parallel);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            ResolutionConfig::load_from_directory_with(temp_dir.path(), |_| None).unwrap();
        assert!(config.schema.precedence.is_empty());
        assert!(config.capabilities.overrides.is_empty());
    }
}
