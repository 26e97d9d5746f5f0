//! Atlas variant-aware dependency selection
//!
//! Provides attribute-based variant matching for Atlas modules including:
//! - Typed attributes and lockable attribute containers
//! - An attribute schema with pluggable compatibility and disambiguation rules
//! - Variant definitions with inheritance, artifacts and capabilities
//! - Producer-side outgoing variant construction
//! - Consumer-side matching with structured failure reports
//! - Whole-graph resolution with capability conflict detection

pub mod attribute;
pub mod builder;
pub mod capability;
pub mod config;
pub mod conflict;
pub mod ecosystem;
pub mod error;
pub mod graph;
pub mod matching;
pub mod registry;
pub mod report;
pub mod schema;
pub mod variant;

// Re-export main types
pub use attribute::{Attribute, AttributeContainer, AttributeValue, AttributeValueType, ValueKind};
pub use builder::{ElementsBuilder, Role, SourceUnit};
pub use capability::{Capability, ModuleId};
pub use config::{ConfigError, ConfigResult, ResolutionConfig};
pub use conflict::{
    CapabilityConflict, CapabilityConflictResolver, CapabilityOverrides, ConflictingVariant,
};
pub use ecosystem::{standard_schema, EcosystemAttributes};
pub use error::{ErrorPhase, VariantError, VariantResult};
pub use graph::{DependencyEdge, EdgeSelection, GraphResolution, GraphResolver};
pub use matching::{ConsumerRequest, MatchingEngine};
pub use registry::{ModuleVariants, ResolvedVariant};
pub use report::{CandidateReport, CandidateStatus, FailureKind, MatchReport, Reason};
pub use schema::{
    AttributeSchema, Compatibility, CompatibilityRule, DisambiguationRule, SchemaBuilder,
};
pub use variant::{ArtifactDescriptor, ArtifactProducer, FixedArtifact, Variant, VariantBuilder};
