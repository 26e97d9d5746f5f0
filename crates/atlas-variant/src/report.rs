//! Structured diagnostics for failed variant selection
//!
//! A [`MatchReport`] explains a failure without re-running the match: every
//! candidate with its effective attributes, and for each requested attribute
//! what was asked, what the candidate had, and why it mattered. Candidates are
//! listed by name (then owner), never in input order.

use crate::attribute::AttributeValue;
use crate::capability::{Capability, ModuleId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Which failure the report describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    NoCompatibleVariant,
    AmbiguousVariant,
}

/// Why an attribute check is listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    /// Value satisfied the request
    Matched,
    /// Value failed the compatibility rule, or was missing
    Incompatible,
    /// Compatible, but another candidate's value was preferred
    DisambiguatedOut,
    /// Compatible and still tied with other candidates
    Tied,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched => write!(f, "matched"),
            Self::Incompatible => write!(f, "incompatible"),
            Self::DisambiguatedOut => write!(f, "disambiguated-out"),
            Self::Tied => write!(f, "tied"),
        }
    }
}

/// Final standing of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateStatus {
    Incompatible,
    DisambiguatedOut,
    Tied,
}

/// One attribute of one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeCheck {
    pub attribute: String,
    pub requested: Option<AttributeValue>,
    pub candidate: Option<AttributeValue>,
    pub reason: Reason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateReport {
    pub name: String,
    pub owner: ModuleId,
    pub status: CandidateStatus,
    /// Full effective attribute set
    pub attributes: BTreeMap<String, AttributeValue>,
    pub capabilities: Vec<Capability>,
    pub checks: Vec<AttributeCheck>,
}

impl CandidateReport {
    /// Attributes this candidate failed on
    pub fn failed_attributes(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|check| check.reason == Reason::Incompatible)
            .map(|check| check.attribute.as_str())
            .collect()
    }

    pub fn check(&self, attribute: &str) -> Option<&AttributeCheck> {
        self.checks.iter().find(|check| check.attribute == attribute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub kind: FailureKind,
    pub requested: BTreeMap<String, AttributeValue>,
    pub capability: Option<Capability>,
    pub candidates: Vec<CandidateReport>,
    /// For ambiguity: attribute → (tied candidate → value), for attributes
    /// whose values differ among the tied candidates
    pub differing: BTreeMap<String, BTreeMap<String, Option<AttributeValue>>>,
}

impl MatchReport {
    pub fn candidate(&self, name: &str) -> Option<&CandidateReport> {
        self.candidates.iter().find(|candidate| candidate.name == name)
    }

    /// Names of the tied candidates
    pub fn tied(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .filter(|candidate| candidate.status == CandidateStatus::Tied)
            .map(|candidate| candidate.name.as_str())
            .collect()
    }

    /// Render as JSON for tooling
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn render_value(value: &Option<AttributeValue>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "<absent>".to_string(),
    }
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requested: Vec<String> = self
            .requested
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        writeln!(f, "Requested attributes: {{{}}}", requested.join(", "))?;
        if let Some(capability) = &self.capability {
            writeln!(f, "Requested capability: {}", capability)?;
        }

        writeln!(f, "Candidates:")?;
        for candidate in &self.candidates {
            let status = match candidate.status {
                CandidateStatus::Incompatible => "incompatible",
                CandidateStatus::DisambiguatedOut => "disambiguated-out",
                CandidateStatus::Tied => "tied",
            };
            writeln!(f, "  - {} ({}) [{}]", candidate.name, candidate.owner, status)?;
            for check in &candidate.checks {
                writeln!(
                    f,
                    "      {}: requested {}, found {} ({})",
                    check.attribute,
                    render_value(&check.requested),
                    render_value(&check.candidate),
                    check.reason
                )?;
            }
        }

        if !self.differing.is_empty() {
            writeln!(f, "Differing attributes:")?;
            for (attribute, values) in &self.differing {
                let values: Vec<String> = values
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, render_value(value)))
                    .collect();
                writeln!(f, "  {}: {}", attribute, values.join(", "))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MatchReport {
        MatchReport {
            kind: FailureKind::NoCompatibleVariant,
            requested: BTreeMap::from([("usage".to_string(), AttributeValue::from("api"))]),
            capability: None,
            candidates: vec![CandidateReport {
                name: "runtimeElements".to_string(),
                owner: ModuleId::new("com.foo", "bar", "1.0"),
                status: CandidateStatus::Incompatible,
                attributes: BTreeMap::from([(
                    "usage".to_string(),
                    AttributeValue::from("runtime"),
                )]),
                capabilities: vec![Capability::new("com.foo", "bar", "1.0")],
                checks: vec![AttributeCheck {
                    attribute: "usage".to_string(),
                    requested: Some(AttributeValue::from("api")),
                    candidate: Some(AttributeValue::from("runtime")),
                    reason: Reason::Incompatible,
                }],
            }],
            differing: BTreeMap::new(),
        }
    }

    #[test]
    fn test_text_rendering_names_failed_attribute() {
        let text = sample().to_string();
        assert!(text.contains("Requested attributes: {usage=api}"));
        assert!(text.contains("runtimeElements (com.foo:bar:1.0) [incompatible]"));
        assert!(text.contains("usage: requested api, found runtime (incompatible)"));
    }

    #[test]
    fn test_json_rendering_uses_reason_tags() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"no-compatible-variant\""));
        assert!(json.contains("\"incompatible\""));
        assert!(json.contains("\"runtime\""));
    }

    #[test]
    fn test_failed_attributes() {
        let report = sample();
        assert_eq!(
            report.candidate("runtimeElements").unwrap().failed_attributes(),
            vec!["usage"]
        );
        assert!(report.tied().is_empty());
    }
}
