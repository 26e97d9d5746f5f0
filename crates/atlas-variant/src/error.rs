/// Variant selection error types
use crate::conflict::CapabilityConflict;
use crate::report::MatchReport;
use thiserror::Error;

pub type VariantResult<T> = Result<T, VariantError>;

/// Where a failure originates.
///
/// Construction errors point at the producer's setup, resolution errors at the
/// consumer's request or the shape of the resolved graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    Construction,
    Resolution,
    Internal,
}

#[derive(Debug, Clone, Error)]
pub enum VariantError {
    #[error("Attribute '{name}' is already registered with domain {existing}, cannot register it as {requested}")]
    DuplicateAttribute {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("Invalid configuration of '{subject}': {reason}")]
    ConfigurationError { subject: String, reason: String },

    #[error("No compatible variant found\n{0}")]
    NoCompatibleVariant(Box<MatchReport>),

    #[error("Ambiguous variant selection\n{0}")]
    AmbiguousVariant(Box<MatchReport>),

    #[error("Capability conflict:\n{}", render_conflicts(.0))]
    CapabilityConflict(Vec<CapabilityConflict>),

    #[error("Module not found: {module}")]
    ModuleNotFound { module: String },

    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl VariantError {
    /// Create a configuration error
    pub fn configuration(subject: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConfigurationError {
            subject: subject.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a module not found error
    pub fn module_not_found(module: impl ToString) -> Self {
        Self::ModuleNotFound {
            module: module.to_string(),
        }
    }

    pub fn phase(&self) -> ErrorPhase {
        match self {
            Self::DuplicateAttribute { .. } | Self::ConfigurationError { .. } => {
                ErrorPhase::Construction
            }
            Self::NoCompatibleVariant(_)
            | Self::AmbiguousVariant(_)
            | Self::CapabilityConflict(_)
            | Self::ModuleNotFound { .. } => ErrorPhase::Resolution,
            Self::InvariantViolation(_) => ErrorPhase::Internal,
        }
    }

    /// Get the matching diagnostic, if this error carries one
    pub fn report(&self) -> Option<&MatchReport> {
        match self {
            Self::NoCompatibleVariant(report) | Self::AmbiguousVariant(report) => Some(report),
            _ => None,
        }
    }
}

fn render_conflicts(conflicts: &[CapabilityConflict]) -> String {
    conflicts
        .iter()
        .map(CapabilityConflict::report)
        .collect::<Vec<_>>()
        .join("\n")
}
