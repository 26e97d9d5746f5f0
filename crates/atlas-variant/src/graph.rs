//! Whole-graph variant resolution
//!
//! Resolves every dependency edge of a graph to one variant, then checks the
//! aggregate selection for capability conflicts.

use crate::capability::ModuleId;
use crate::config::ResolutionConfig;
use crate::conflict::{CapabilityConflictResolver, CapabilityOverrides};
use crate::error::{VariantError, VariantResult};
use crate::matching::{ConsumerRequest, MatchingEngine};
use crate::registry::{ModuleVariants, ResolvedVariant};
use crate::schema::AttributeSchema;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// One consumer → producer dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub consumer: ModuleId,
    pub producer: ModuleId,
    pub request: ConsumerRequest,
}

impl DependencyEdge {
    pub fn new(consumer: ModuleId, producer: ModuleId, request: ConsumerRequest) -> Self {
        Self {
            consumer,
            producer,
            request,
        }
    }
}

/// The variant chosen for one edge
#[derive(Debug, Clone)]
pub struct EdgeSelection {
    pub consumer: ModuleId,
    pub producer: ModuleId,
    pub selected: ResolvedVariant,
}

/// Resolved graph: one selection per edge, in edge order
#[derive(Debug, Clone, Default)]
pub struct GraphResolution {
    pub selections: Vec<EdgeSelection>,
}

impl GraphResolution {
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Selections made for a producer module
    pub fn selections_for<'a>(
        &'a self,
        producer: &'a ModuleId,
    ) -> impl Iterator<Item = &'a EdgeSelection> + 'a {
        self.selections
            .iter()
            .filter(move |selection| &selection.producer == producer)
    }
}

/// Resolves dependency edges against registered modules
pub struct GraphResolver<'a> {
    schema: &'a AttributeSchema,
    modules: BTreeMap<ModuleId, &'a ModuleVariants>,
    overrides: CapabilityOverrides,
    parallel: bool,
}

impl<'a> GraphResolver<'a> {
    pub fn new(schema: &'a AttributeSchema) -> Self {
        Self {
            schema,
            modules: BTreeMap::new(),
            overrides: CapabilityOverrides::new(),
            parallel: true,
        }
    }

    /// Apply `[resolution]` and `[capabilities]` settings
    pub fn with_config(mut self, config: &ResolutionConfig) -> VariantResult<Self> {
        self.parallel = config.resolution.parallel;
        self.overrides = CapabilityOverrides::from_config(&config.capabilities)?;
        Ok(self)
    }

    pub fn with_overrides(mut self, overrides: CapabilityOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Register a producer module's variants
    pub fn add_module(mut self, module: &'a ModuleVariants) -> Self {
        self.modules.insert(module.module().clone(), module);
        self
    }

    /// Resolve every edge, then check capabilities across the selection
    ///
    /// Each producer is flattened once. When several edges fail, the error of
    /// the first failing edge in input order is returned, whether or not the
    /// edges ran in parallel.
    pub fn resolve(&self, edges: &[DependencyEdge]) -> VariantResult<GraphResolution> {
        let mut candidates: BTreeMap<&ModuleId, VariantResult<Vec<ResolvedVariant>>> =
            BTreeMap::new();
        for edge in edges {
            candidates.entry(&edge.producer).or_insert_with(|| {
                self.modules
                    .get(&edge.producer)
                    .ok_or_else(|| VariantError::module_not_found(&edge.producer))
                    .and_then(|module| module.candidates())
            });
        }

        let engine = MatchingEngine::new(self.schema);
        let select = |edge: &DependencyEdge| -> VariantResult<EdgeSelection> {
            let module_candidates = match candidates.get(&edge.producer) {
                Some(Ok(module_candidates)) => module_candidates,
                Some(Err(err)) => return Err(err.clone()),
                None => return Err(VariantError::module_not_found(&edge.producer)),
            };
            let selected = engine.select(&edge.request, module_candidates)?;
            Ok(EdgeSelection {
                consumer: edge.consumer.clone(),
                producer: edge.producer.clone(),
                selected: selected.clone(),
            })
        };

        let results: Vec<VariantResult<EdgeSelection>> = if self.parallel {
            edges.par_iter().map(select).collect()
        } else {
            edges.iter().map(select).collect()
        };
        let selections = results.into_iter().collect::<VariantResult<Vec<_>>>()?;

        CapabilityConflictResolver::new(&self.overrides)
            .check(selections.iter().map(|selection| &selection.selected))?;

        debug!(edges = edges.len(), "resolved dependency graph");
        Ok(GraphResolution { selections })
    }
}
