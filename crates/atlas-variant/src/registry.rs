//! Per-module variant registry and `extendsFrom` flattening
//!
//! Parents are referenced by name inside one module. Flattening walks the
//! parent graph depth-first in declaration order and merges ancestors before
//! descendants, so for `a extends [b, c]` with both `b` and `c` extending `d`
//! the merge order is `d, b, c, a`: `d` is visited once, `c` overrides `b`,
//! and `a` overrides everything.

use crate::attribute::AttributeContainer;
use crate::builder::ElementsBuilder;
use crate::capability::{Capability, ModuleId};
use crate::error::{VariantError, VariantResult};
use crate::variant::{ArtifactDescriptor, Variant};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// A variant together with its effective (inherited + own) attributes
#[derive(Debug, Clone)]
pub struct ResolvedVariant {
    variant: Arc<Variant>,
    name: String,
    attributes: AttributeContainer,
    artifacts: Vec<ArtifactDescriptor>,
}

impl ResolvedVariant {
    /// Wrap a variant that has no parents
    pub fn standalone(variant: Arc<Variant>) -> Self {
        Self {
            name: variant.name().to_string(),
            attributes: AttributeContainer::new().merged_with(variant.attributes()),
            artifacts: variant.artifacts().to_vec(),
            variant,
        }
    }

    /// Name used for identification and stable ordering
    ///
    /// Secondary variants are qualified by their parent: `apiElements-classes`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &ModuleId {
        self.variant.owner()
    }

    pub fn variant(&self) -> &Arc<Variant> {
        &self.variant
    }

    /// Effective, locked attributes
    pub fn attributes(&self) -> &AttributeContainer {
        &self.attributes
    }

    /// Effective artifacts: ancestors' first, in merge order
    pub fn artifacts(&self) -> &[ArtifactDescriptor] {
        &self.artifacts
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.variant.capabilities()
    }

    pub fn provides(&self, capability: &Capability) -> bool {
        self.variant.provides(capability)
    }

    /// Key for deterministic ordering
    pub(crate) fn sort_key(&self) -> (&str, &ModuleId) {
        (&self.name, self.variant.owner())
    }
}

/// The variants published by one module
#[derive(Debug, Clone)]
pub struct ModuleVariants {
    module: ModuleId,
    variants: BTreeMap<String, Arc<Variant>>,
}

impl ModuleVariants {
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            variants: BTreeMap::new(),
        }
    }

    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Add a variant, replacing any existing variant of the same name
    pub fn insert(&mut self, variant: Arc<Variant>) -> VariantResult<()> {
        if variant.owner() != &self.module {
            return Err(VariantError::configuration(
                variant.name(),
                format!(
                    "variant belongs to {} and cannot be registered on {}",
                    variant.owner(),
                    self.module
                ),
            ));
        }

        if self.variants.contains_key(variant.name()) {
            debug!(module = %self.module, variant = variant.name(), "replacing variant definition");
        }
        self.variants.insert(variant.name().to_string(), variant);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Variant>> {
        self.variants.get(name)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Variant names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    /// Create or update an outgoing variant through an [`ElementsBuilder`]
    ///
    /// Calling this again with the same name starts from the earlier
    /// definition: parents, artifacts and capabilities accumulate, and the
    /// description is kept unless the new call sets one.
    pub fn create_outgoing_elements<F>(
        &mut self,
        name: impl Into<String>,
        configure: F,
    ) -> VariantResult<Arc<Variant>>
    where
        F: FnOnce(&mut ElementsBuilder),
    {
        let name = name.into();
        let mut builder = match self.variants.get(&name) {
            Some(existing) => ElementsBuilder::from_existing(existing),
            None => ElementsBuilder::new(name, self.module.clone()),
        };
        configure(&mut builder);
        let variant = builder.build()?;
        self.insert(Arc::clone(&variant))?;
        Ok(variant)
    }

    /// Flatten one variant through its `extendsFrom` ancestors
    pub fn resolve(&self, name: &str) -> VariantResult<ResolvedVariant> {
        let variant = self
            .variants
            .get(name)
            .ok_or_else(|| VariantError::configuration(name, "no such variant in module"))?;

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        self.visit(variant, &mut visited, &mut path, &mut order)?;

        let mut attributes = AttributeContainer::new();
        let mut artifacts = Vec::new();
        for ancestor in &order {
            attributes = attributes.merged_with(ancestor.attributes());
            artifacts.extend(ancestor.artifacts().iter().cloned());
        }

        Ok(ResolvedVariant {
            variant: Arc::clone(variant),
            name: variant.name().to_string(),
            attributes,
            artifacts,
        })
    }

    /// Every consumable variant and its secondary variants, flattened and
    /// sorted by name
    pub fn candidates(&self) -> VariantResult<Vec<ResolvedVariant>> {
        let mut candidates = Vec::new();

        for variant in self.variants.values().filter(|v| v.can_be_consumed()) {
            let resolved = self.resolve(variant.name())?;

            for secondary in variant.secondary_variants() {
                candidates.push(ResolvedVariant {
                    name: format!("{}-{}", resolved.name, secondary.name()),
                    attributes: resolved.attributes.merged_with(secondary.attributes()),
                    artifacts: secondary.artifacts().to_vec(),
                    variant: Arc::clone(secondary),
                });
            }

            candidates.push(resolved);
        }

        candidates.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(candidates)
    }

    fn visit<'a>(
        &'a self,
        variant: &'a Arc<Variant>,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        order: &mut Vec<&'a Arc<Variant>>,
    ) -> VariantResult<()> {
        let name = variant.name();

        if path.contains(&name) {
            let mut cycle: Vec<&str> = path.clone();
            cycle.push(name);
            return Err(VariantError::configuration(
                name,
                format!("inheritance cycle: {}", cycle.join(" -> ")),
            ));
        }
        if visited.contains(name) {
            return Ok(());
        }

        path.push(name);
        for parent_name in variant.extends_from() {
            let parent = self.variants.get(parent_name).ok_or_else(|| {
                VariantError::configuration(
                    name,
                    format!("extends from unknown variant '{}'", parent_name),
                )
            })?;
            self.visit(parent, visited, path, order)?;
        }
        path.pop();

        visited.insert(name);
        order.push(variant);
        Ok(())
    }
}
