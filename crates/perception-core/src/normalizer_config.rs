//! Optional YAML overrides for the competitor/citation normalizer.
//!
//! The built-in alias table, noise list, and non-competitor list cover the
//! common cases; deployments can extend them without a rebuild:
//!
//! ```yaml
//! aliases:
//!   "amazon web services": AWS
//!   "alphabet inc": Google
//! noise:
//!   - tbd
//! non_competitors:
//!   - builtin
//! display_suffixes:
//!   - .dev
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerOverrides {
    /// Lowercase raw name -> canonical display name.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// Extra tokens rejected as noise (case-insensitive).
    #[serde(default)]
    pub noise: Vec<String>,
    /// Extra names excluded from competitor extraction.
    #[serde(default)]
    pub non_competitors: Vec<String>,
    /// Extra TLD suffixes stripped when building citation display names.
    #[serde(default)]
    pub display_suffixes: Vec<String>,
}

/// Load and validate normalizer overrides from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_normalizer_overrides(path: &Path) -> Result<NormalizerOverrides, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::OverridesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_normalizer_overrides(&content)
}

/// Parse and validate normalizer overrides from a YAML string.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_normalizer_overrides(content: &str) -> Result<NormalizerOverrides, ConfigError> {
    let overrides: NormalizerOverrides = serde_yaml::from_str(content)?;
    validate_overrides(&overrides)?;
    Ok(overrides)
}

fn validate_overrides(overrides: &NormalizerOverrides) -> Result<(), ConfigError> {
    let mut seen_keys = HashSet::new();

    for (raw, canonical) in &overrides.aliases {
        if raw.trim().is_empty() {
            return Err(ConfigError::Validation(
                "alias key must be non-empty".to_string(),
            ));
        }
        if canonical.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "alias '{raw}' maps to an empty name"
            )));
        }
        if !seen_keys.insert(raw.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate alias key (case-insensitive): '{raw}'"
            )));
        }
    }

    for suffix in &overrides.display_suffixes {
        if !suffix.starts_with('.') || suffix.len() < 2 {
            return Err(ConfigError::Validation(format!(
                "display suffix '{suffix}' must start with '.' and name a TLD"
            )));
        }
    }

    Ok(())
}
