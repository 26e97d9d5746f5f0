//! Producer-side construction of outgoing variants
//!
//! [`ElementsBuilder`] accumulates a variant definition and freezes it in one
//! step. Role defaults are applied first (library, jar, external dependencies,
//! plus api or runtime usage), then the caller's refiner, which may override
//! any of them.

use crate::capability::{Capability, ModuleId};
use crate::ecosystem::{library_elements, EcosystemAttributes, LIBRARY_ELEMENTS};
use crate::error::{VariantError, VariantResult};
use crate::variant::{ArtifactDescriptor, ArtifactProducer, FixedArtifact, Variant};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Artifact type of class output directories
pub const CLASSES_DIRECTORY: &str = "classes-directory";

/// Name of the secondary variant exposing class directories
pub const CLASSES_VARIANT: &str = "classes";

/// A unit of sources whose compiled output a variant can expose
///
/// Only the name and output locations are visible to variant construction.
pub trait SourceUnit: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Directories the compiled classes end up in
    fn output_locations(&self) -> Vec<PathBuf>;
}

/// Intended use of an outgoing variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Api,
    #[default]
    Runtime,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api => write!(f, "api"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

type Refiner = Box<dyn FnOnce(&mut EcosystemAttributes)>;

/// Fluent builder for a consumable variant
pub struct ElementsBuilder {
    name: String,
    owner: ModuleId,
    description: Option<String>,
    role: Role,
    extends_from: Vec<String>,
    source_unit: Option<Arc<dyn SourceUnit>>,
    artifacts: Vec<ArtifactDescriptor>,
    refiner: Option<Refiner>,
    capabilities: Vec<Capability>,
    class_directory: bool,
    secondary: Vec<Arc<Variant>>,
}

impl ElementsBuilder {
    pub fn new(name: impl Into<String>, owner: ModuleId) -> Self {
        Self {
            name: name.into(),
            owner,
            description: None,
            role: Role::default(),
            extends_from: Vec::new(),
            source_unit: None,
            artifacts: Vec::new(),
            refiner: None,
            capabilities: Vec::new(),
            class_directory: false,
            secondary: Vec::new(),
        }
    }

    /// Start from an existing definition so a new call can update it
    ///
    /// The description, parents, artifacts, declared capabilities and
    /// secondary variants carry over. Attributes are derived again from the
    /// role and refiner of the new call.
    pub fn from_existing(variant: &Variant) -> Self {
        Self {
            description: variant.description().map(str::to_string),
            extends_from: variant.extends_from().to_vec(),
            artifacts: variant.artifacts().to_vec(),
            capabilities: variant.declared_capabilities().to_vec(),
            secondary: variant.secondary_variants().to_vec(),
            ..Self::new(variant.name(), variant.owner().clone())
        }
    }

    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn for_api(&mut self) -> &mut Self {
        self.role = Role::Api;
        self
    }

    pub fn for_runtime(&mut self) -> &mut Self {
        self.role = Role::Runtime;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Add parent variants; a parent already present is not repeated
    pub fn extends_from<I, S>(&mut self, parents: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for parent in parents.into_iter().map(Into::into) {
            if !self.extends_from.contains(&parent) {
                self.extends_from.push(parent);
            }
        }
        self
    }

    pub fn from_source_unit(&mut self, unit: Arc<dyn SourceUnit>) -> &mut Self {
        self.source_unit = Some(unit);
        self
    }

    /// Publish a `jar` artifact produced by the given task
    pub fn add_artifact(&mut self, producer: Arc<dyn ArtifactProducer>) -> &mut Self {
        self.artifacts.push(ArtifactDescriptor::new("jar", producer));
        self
    }

    pub fn add_typed_artifact(&mut self, artifact: ArtifactDescriptor) -> &mut Self {
        self.artifacts.push(artifact);
        self
    }

    /// Adjust the attributes after role defaults are applied
    pub fn attributes<F>(&mut self, refiner: F) -> &mut Self
    where
        F: FnOnce(&mut EcosystemAttributes) + 'static,
    {
        self.refiner = Some(Box::new(refiner));
        self
    }

    /// Declare capabilities in addition to any declared earlier
    pub fn with_capabilities(&mut self, capabilities: Vec<Capability>) -> &mut Self {
        self.capabilities.extend(capabilities);
        self
    }

    /// Also publish the source unit's class directories as a secondary variant
    pub fn with_class_directory_variant(&mut self) -> &mut Self {
        self.class_directory = true;
        self
    }

    /// Validate and freeze the variant
    pub fn build(self) -> VariantResult<Arc<Variant>> {
        if self.class_directory {
            if self.role != Role::Api {
                return Err(VariantError::configuration(
                    &self.name,
                    format!(
                        "a class directory variant requires the api role, found {}",
                        self.role
                    ),
                ));
            }
            if self.source_unit.is_none() {
                return Err(VariantError::configuration(
                    &self.name,
                    "a class directory variant requires a source unit",
                ));
            }
        }

        let mut details = EcosystemAttributes::new();
        details.library().as_jar().with_external_dependencies();
        match self.role {
            Role::Api => details.providing_api(),
            Role::Runtime => details.providing_runtime(),
        };
        if let Some(refiner) = self.refiner {
            refiner(&mut details);
        }
        let attributes = details.into_container()?;

        let mut builder = Variant::builder(&self.name, self.owner.clone())
            .attributes(attributes)
            .consumable(true)
            .resolvable(false)
            .extends_from(self.extends_from)
            .capabilities(self.capabilities.iter().cloned());

        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        for artifact in self.artifacts {
            builder = builder.artifact(artifact);
        }

        let mut secondary = self.secondary;
        if self.class_directory {
            if let Some(unit) = &self.source_unit {
                secondary.retain(|variant| variant.name() != CLASSES_VARIANT);
                secondary.push(classes_variant(
                    &self.owner,
                    &self.capabilities,
                    unit.as_ref(),
                )?);
            }
        }
        for variant in secondary {
            builder = builder.secondary(variant);
        }

        let variant = builder.build()?;
        debug!(
            variant = variant.name(),
            module = %variant.owner(),
            role = %self.role,
            "built outgoing variant"
        );
        Ok(variant)
    }
}

/// The secondary variant shares the capabilities of the variant it belongs to
fn classes_variant(
    owner: &ModuleId,
    capabilities: &[Capability],
    unit: &dyn SourceUnit,
) -> VariantResult<Arc<Variant>> {
    unit.output_locations()
        .into_iter()
        .fold(
            Variant::builder(CLASSES_VARIANT, owner.clone())
                .attribute(&LIBRARY_ELEMENTS, library_elements::CLASSES)
                .capabilities(capabilities.iter().cloned()),
            |builder, location| {
                builder.artifact(ArtifactDescriptor::new(
                    CLASSES_DIRECTORY,
                    Arc::new(FixedArtifact::new(unit.name(), location)),
                ))
            },
        )
        .build()
}
