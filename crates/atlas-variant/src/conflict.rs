//! Capability conflict detection across a resolved graph

use crate::capability::{Capability, ModuleId};
use crate::config::CapabilitySection;
use crate::error::{VariantError, VariantResult};
use crate::registry::ResolvedVariant;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A selected variant claiming a conflicting capability
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ConflictingVariant {
    pub module: ModuleId,
    pub variant: String,
    pub version: String,
}

/// Conflict information for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityConflict {
    pub group: String,
    pub name: String,
    /// Offenders, ordered by version then module
    pub variants: Vec<ConflictingVariant>,
}

impl CapabilityConflict {
    /// Distinct versions involved, lowest first; equivalent spellings count once
    pub fn versions(&self) -> Vec<&str> {
        let mut versions: Vec<&str> = self.variants.iter().map(|v| v.version.as_str()).collect();
        versions.dedup_by(|a, b| compare_versions(a, b) == Ordering::Equal);
        versions
    }

    /// Generate human-readable conflict report
    pub fn report(&self) -> String {
        let mut report = format!(
            "Capability {}:{} is provided at different versions:\n",
            self.group, self.name
        );

        for variant in &self.variants {
            report.push_str(&format!(
                "  {} variant '{}' provides version {}\n",
                variant.module, variant.variant, variant.version
            ));
        }

        report
    }
}

/// Externally chosen winners for contested capabilities
///
/// When an override exists for a (group, name), the conflict is sanctioned
/// and not reported; picking the winner is the caller's policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityOverrides {
    chosen: BTreeMap<(String, String), String>,
}

impl CapabilityOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) {
        self.chosen
            .insert((group.into(), name.into()), version.into());
    }

    /// Build from the `[capabilities]` config section; keys are `group:name`
    pub fn from_config(section: &CapabilitySection) -> VariantResult<Self> {
        let mut overrides = Self::new();
        for (key, version) in &section.overrides {
            match key.split_once(':') {
                Some((group, name)) if !group.is_empty() && !name.is_empty() => {
                    overrides.insert(group, name, version.clone());
                }
                _ => {
                    return Err(VariantError::configuration(
                        key.clone(),
                        "capability override keys must be written as 'group:name'",
                    ))
                }
            }
        }
        Ok(overrides)
    }

    pub fn chosen_version(&self, group: &str, name: &str) -> Option<&str> {
        self.chosen
            .get(&(group.to_string(), name.to_string()))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }
}

/// Whole-graph capability conflict detector
pub struct CapabilityConflictResolver<'a> {
    overrides: &'a CapabilityOverrides,
}

impl<'a> CapabilityConflictResolver<'a> {
    pub fn new(overrides: &'a CapabilityOverrides) -> Self {
        Self { overrides }
    }

    /// Detect conflicts among the selected variants
    ///
    /// The same variant selected through several edges counts once. A
    /// capability claimed at a single version by several variants is not a
    /// conflict; divergent versions are, unless overridden. Versions are
    /// compared with [`compare_versions`], so `1.0` and `1.0.0` agree.
    pub fn detect_conflicts<'v, I>(&self, selected: I) -> Vec<CapabilityConflict>
    where
        I: IntoIterator<Item = &'v ResolvedVariant>,
    {
        let mut groups: BTreeMap<(String, String), BTreeSet<ConflictingVariant>> = BTreeMap::new();

        for variant in selected {
            for capability in variant.capabilities() {
                let Capability {
                    group,
                    name,
                    version,
                } = capability;
                groups
                    .entry((group, name))
                    .or_default()
                    .insert(ConflictingVariant {
                        module: variant.owner().clone(),
                        variant: variant.name().to_string(),
                        version,
                    });
            }
        }

        groups
            .into_iter()
            .filter(|((group, name), _)| self.overrides.chosen_version(group, name).is_none())
            .filter_map(|((group, name), members)| {
                let mut variants: Vec<ConflictingVariant> = members.into_iter().collect();
                variants.sort_by(|a, b| {
                    compare_versions(&a.version, &b.version).then_with(|| a.cmp(b))
                });

                let divergent = variants
                    .windows(2)
                    .any(|pair| compare_versions(&pair[0].version, &pair[1].version) != Ordering::Equal);
                if !divergent {
                    return None;
                }

                debug!(group = %group, name = %name, offenders = variants.len(), "capability conflict");
                Some(CapabilityConflict {
                    group,
                    name,
                    variants,
                })
            })
            .collect()
    }

    /// Fail with every conflict found
    pub fn check<'v, I>(&self, selected: I) -> VariantResult<()>
    where
        I: IntoIterator<Item = &'v ResolvedVariant>,
    {
        let conflicts = self.detect_conflicts(selected);
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(VariantError::CapabilityConflict(conflicts))
        }
    }

    /// Suggest resolution strategies for a conflict
    pub fn suggest_resolutions(&self, conflict: &CapabilityConflict) -> Vec<String> {
        let mut suggestions = Vec::new();

        if let Some(highest) = conflict.versions().last() {
            suggestions.push(format!(
                "Declare an override for '{}:{}', for example selecting version {}",
                conflict.group, conflict.name, highest
            ));
        }

        let modules: BTreeSet<String> = conflict
            .variants
            .iter()
            .map(|v| v.module.to_string())
            .collect();
        if modules.len() == 2 {
            let modules: Vec<&String> = modules.iter().collect();
            suggestions.push(format!(
                "Check whether {} and {} really need to provide the same capability",
                modules[0], modules[1]
            ));
        }

        suggestions.push(
            "Exclude one of the providers from the dependency graph".to_string(),
        );

        suggestions
    }
}

/// Order versions semantically where possible
///
/// `1.0` reads as `1.0.0`. Versions that still do not parse sort after all
/// parsable ones, lexically.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (lenient_version(a), lenient_version(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn lenient_version(version: &str) -> Option<semver::Version> {
    if let Ok(parsed) = semver::Version::parse(version) {
        return Some(parsed);
    }

    let parts = version.split('.').count();
    let padded = match parts {
        1 => format!("{}.0.0", version),
        2 => format!("{}.0", version),
        _ => return None,
    };
    semver::Version::parse(&padded).ok()
}
