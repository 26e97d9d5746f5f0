//! Variants and their artifacts

use crate::attribute::{Attribute, AttributeContainer, AttributeValueType};
use crate::capability::{Capability, ModuleId};
use crate::error::{VariantError, VariantResult};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Lazy producer of an artifact file, owned by the external task system
///
/// The matching core stores and forwards producers; it never asks them for
/// their file.
pub trait ArtifactProducer: Send + Sync + fmt::Debug {
    /// Name of the producing task
    fn name(&self) -> &str;

    /// Location of the produced file, computed on demand
    fn file(&self) -> PathBuf;
}

/// An artifact whose location is already known, such as an output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedArtifact {
    name: String,
    path: PathBuf,
}

impl FixedArtifact {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl ArtifactProducer for FixedArtifact {
    fn name(&self) -> &str {
        &self.name
    }

    fn file(&self) -> PathBuf {
        self.path.clone()
    }
}

/// One artifact published by a variant
#[derive(Debug, Clone)]
pub struct ArtifactDescriptor {
    /// Artifact type, e.g. `jar` or `classes-directory`
    pub artifact_type: String,
    pub producer: Arc<dyn ArtifactProducer>,
}

impl ArtifactDescriptor {
    pub fn new(artifact_type: impl Into<String>, producer: Arc<dyn ArtifactProducer>) -> Self {
        Self {
            artifact_type: artifact_type.into(),
            producer,
        }
    }

    pub fn producer_name(&self) -> &str {
        self.producer.name()
    }
}

/// An immutable, attribute-tagged bundle of artifacts published by a module
#[derive(Debug)]
pub struct Variant {
    name: String,
    owner: ModuleId,
    description: Option<String>,
    attributes: AttributeContainer,
    capabilities: Vec<Capability>,
    artifacts: Vec<ArtifactDescriptor>,
    can_be_consumed: bool,
    can_be_resolved: bool,
    extends_from: Vec<String>,
    secondary: Vec<Arc<Variant>>,
}

impl Variant {
    pub fn builder(name: impl Into<String>, owner: ModuleId) -> VariantBuilder {
        VariantBuilder::new(name, owner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &ModuleId {
        &self.owner
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The variant's own attributes, without inherited ones
    pub fn attributes(&self) -> &AttributeContainer {
        &self.attributes
    }

    /// Explicitly declared capabilities, sorted
    pub fn declared_capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Declared capabilities, or the owner's default capability when none are declared
    pub fn capabilities(&self) -> Vec<Capability> {
        if self.capabilities.is_empty() {
            vec![self.owner.default_capability()]
        } else {
            self.capabilities.clone()
        }
    }

    /// Whether the variant provides the given (group, name), at any version
    pub fn provides(&self, capability: &Capability) -> bool {
        self.capabilities()
            .iter()
            .any(|provided| provided.same_coordinates(capability))
    }

    pub fn artifacts(&self) -> &[ArtifactDescriptor] {
        &self.artifacts
    }

    pub fn can_be_consumed(&self) -> bool {
        self.can_be_consumed
    }

    pub fn can_be_resolved(&self) -> bool {
        self.can_be_resolved
    }

    /// Names of the parent variants, in declaration order
    pub fn extends_from(&self) -> &[String] {
        &self.extends_from
    }

    /// Secondary variants published alongside this one
    pub fn secondary_variants(&self) -> &[Arc<Variant>] {
        &self.secondary
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.owner)
    }
}

/// Transient, mutable accumulator for a [`Variant`]
///
/// Attribute writes that fail are remembered and reported by
/// [`build`](Self::build), so the builder stays chainable.
#[derive(Debug)]
pub struct VariantBuilder {
    name: String,
    owner: ModuleId,
    description: Option<String>,
    attributes: AttributeContainer,
    capabilities: Vec<Capability>,
    artifacts: Vec<ArtifactDescriptor>,
    can_be_consumed: bool,
    can_be_resolved: bool,
    extends_from: Vec<String>,
    secondary: Vec<Arc<Variant>>,
    error: Option<VariantError>,
}

impl VariantBuilder {
    pub fn new(name: impl Into<String>, owner: ModuleId) -> Self {
        Self {
            name: name.into(),
            owner,
            description: None,
            attributes: AttributeContainer::new(),
            capabilities: Vec::new(),
            artifacts: Vec::new(),
            can_be_consumed: true,
            can_be_resolved: false,
            extends_from: Vec::new(),
            secondary: Vec::new(),
            error: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set a typed attribute
    pub fn attribute<T: AttributeValueType>(
        mut self,
        attribute: &Attribute<T>,
        value: impl Into<T>,
    ) -> Self {
        if let Err(err) = self.attributes.insert(attribute, value) {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Replace all attributes
    pub fn attributes(mut self, attributes: AttributeContainer) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    pub fn artifact(mut self, artifact: ArtifactDescriptor) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn consumable(mut self, consumable: bool) -> Self {
        self.can_be_consumed = consumable;
        self
    }

    pub fn resolvable(mut self, resolvable: bool) -> Self {
        self.can_be_resolved = resolvable;
        self
    }

    pub fn extends_from<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extends_from.extend(parents.into_iter().map(Into::into));
        self
    }

    pub fn secondary(mut self, variant: Arc<Variant>) -> Self {
        self.secondary.push(variant);
        self
    }

    /// Validate and freeze the variant
    pub fn build(self) -> VariantResult<Arc<Variant>> {
        if let Some(err) = self.error {
            return Err(err);
        }

        if self.name.is_empty() {
            return Err(VariantError::configuration(
                self.owner.to_string(),
                "variant name cannot be empty",
            ));
        }

        if self.extends_from.iter().any(|parent| parent == &self.name) {
            return Err(VariantError::configuration(
                self.name,
                "a variant cannot extend from itself",
            ));
        }

        let mut capabilities = self.capabilities;
        capabilities.sort();
        capabilities.dedup();

        Ok(Arc::new(Variant {
            name: self.name,
            owner: self.owner,
            description: self.description,
            attributes: self.attributes.lock(),
            capabilities,
            artifacts: self.artifacts,
            can_be_consumed: self.can_be_consumed,
            can_be_resolved: self.can_be_resolved,
            extends_from: self.extends_from,
            secondary: self.secondary,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USAGE: Attribute<String> = Attribute::new("usage");

    fn module() -> ModuleId {
        ModuleId::new("com.foo", "bar", "1.0")
    }

    #[test]
    fn test_built_variant_is_locked() {
        let variant = Variant::builder("apiElements", module())
            .attribute(&USAGE, "api")
            .build()
            .unwrap();

        assert!(variant.attributes().is_locked());
        assert_eq!(variant.attributes().get(&USAGE), Some("api".to_string()));
        assert!(variant.can_be_consumed());
        assert!(!variant.can_be_resolved());
    }

    #[test]
    fn test_default_capability_when_none_declared() {
        let variant = Variant::builder("apiElements", module()).build().unwrap();
        assert!(variant.declared_capabilities().is_empty());
        assert_eq!(variant.capabilities(), vec![module().default_capability()]);
        assert!(variant.provides(&Capability::new("com.foo", "bar", "9.9")));
    }

    #[test]
    fn test_declared_capabilities_replace_default() {
        let variant = Variant::builder("fixtures", module())
            .capability(Capability::new("com.foo", "bar-fixtures", "1.0"))
            .capability(Capability::new("com.foo", "bar-fixtures", "1.0"))
            .build()
            .unwrap();

        assert_eq!(variant.capabilities().len(), 1);
        assert!(!variant.provides(&module().default_capability()));
    }

    #[test]
    fn test_attribute_error_surfaces_at_build() {
        let clash: Attribute<i64> = Attribute::new("usage");
        let result = Variant::builder("apiElements", module())
            .attribute(&USAGE, "api")
            .attribute(&clash, 3)
            .build();
        assert!(matches!(result, Err(VariantError::ConfigurationError { .. })));
    }

    #[test]
    fn test_self_extension_rejected() {
        let result = Variant::builder("apiElements", module())
            .extends_from(["apiElements"])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_artifacts_keep_order() {
        let variant = Variant::builder("runtimeElements", module())
            .artifact(ArtifactDescriptor::new(
                "jar",
                Arc::new(FixedArtifact::new("jar", "build/libs/bar.jar")),
            ))
            .artifact(ArtifactDescriptor::new(
                "jar",
                Arc::new(FixedArtifact::new("sourcesJar", "build/libs/bar-sources.jar")),
            ))
            .build()
            .unwrap();

        let names: Vec<_> = variant.artifacts().iter().map(|a| a.producer_name()).collect();
        assert_eq!(names, vec!["jar", "sourcesJar"]);
    }
}
