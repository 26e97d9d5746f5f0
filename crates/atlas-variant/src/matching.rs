//! Variant selection
//!
//! Given a consumer request and a module's flattened candidates, the engine
//! picks exactly one variant or fails. Selection runs in four passes:
//! 1. Compatibility: drop candidates failing any requested attribute
//! 2. Disambiguation: narrow per attribute, requested attributes first, then
//!    attributes only the candidates carry, each group in schema precedence
//! 3. Capability: among remaining ties, prefer the single candidate providing
//!    the requested capability (or the owning module's default one)
//! 4. Anything still tied is an ambiguity error
//!
//! Candidates are sorted by name before any pass runs, so the outcome never
//! depends on input order.

use crate::attribute::{AttributeContainer, AttributeValue};
use crate::capability::Capability;
use crate::error::{VariantError, VariantResult};
use crate::registry::{ModuleVariants, ResolvedVariant};
use crate::report::{
    AttributeCheck, CandidateReport, CandidateStatus, FailureKind, MatchReport, Reason,
};
use crate::schema::{AttributeSchema, Compatibility};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// What a consumer asks for on one dependency edge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerRequest {
    attributes: AttributeContainer,
    capability: Option<Capability>,
}

impl ConsumerRequest {
    /// Create a request; only attributes present in the container constrain matching
    pub fn new(attributes: AttributeContainer) -> Self {
        Self {
            attributes: attributes.lock(),
            capability: None,
        }
    }

    /// A request that constrains nothing
    pub fn empty() -> Self {
        Self::new(AttributeContainer::new())
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn attributes(&self) -> &AttributeContainer {
        &self.attributes
    }

    pub fn capability(&self) -> Option<&Capability> {
        self.capability.as_ref()
    }
}

/// Per-candidate bookkeeping while a match runs
struct Evaluation<'c> {
    candidate: &'c ResolvedVariant,
    checks: Vec<AttributeCheck>,
    compatible: bool,
    eliminated_by: Option<(String, Option<AttributeValue>)>,
}

/// Selects one variant per request
///
/// Holds only a shared reference to the frozen schema, so engines are cheap to
/// create and safe to use from many threads at once.
#[derive(Debug, Clone, Copy)]
pub struct MatchingEngine<'s> {
    schema: &'s AttributeSchema,
}

impl<'s> MatchingEngine<'s> {
    pub fn new(schema: &'s AttributeSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'s AttributeSchema {
        self.schema
    }

    /// Flatten a module's consumable variants and select among them
    pub fn select_from(
        &self,
        request: &ConsumerRequest,
        module: &ModuleVariants,
    ) -> VariantResult<ResolvedVariant> {
        let candidates = module.candidates()?;
        self.select(request, &candidates).cloned()
    }

    /// Select the single best candidate
    pub fn select<'c>(
        &self,
        request: &ConsumerRequest,
        candidates: &'c [ResolvedVariant],
    ) -> VariantResult<&'c ResolvedVariant> {
        let mut ordered: Vec<&ResolvedVariant> = candidates.iter().collect();
        ordered.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let requested = self.schema.order(request.attributes().names());

        let mut evaluations: Vec<Evaluation<'c>> = ordered
            .into_iter()
            .map(|candidate| self.evaluate(request, &requested, candidate))
            .collect();

        let mut survivors: Vec<usize> = evaluations
            .iter()
            .enumerate()
            .filter(|(_, evaluation)| evaluation.compatible)
            .map(|(index, _)| index)
            .collect();

        if survivors.is_empty() {
            debug!(
                candidates = evaluations.len(),
                "no compatible variant for request"
            );
            return Err(VariantError::NoCompatibleVariant(Box::new(self.report(
                FailureKind::NoCompatibleVariant,
                request,
                &evaluations,
                &[],
            ))));
        }

        let extra: BTreeSet<&str> = survivors
            .iter()
            .flat_map(|&index| evaluations[index].candidate.attributes().names())
            .filter(|name| !request.attributes().contains(name))
            .collect();
        let extra = self.schema.order(extra);

        for attribute in requested.iter().chain(extra.iter()) {
            if survivors.len() <= 1 {
                break;
            }
            self.narrow(request, attribute, &mut survivors, &mut evaluations);
        }

        if survivors.len() > 1 {
            let providing: Vec<usize> = survivors
                .iter()
                .copied()
                .filter(|&index| {
                    let candidate = evaluations[index].candidate;
                    let desired = request
                        .capability()
                        .cloned()
                        .unwrap_or_else(|| candidate.owner().default_capability());
                    candidate.provides(&desired)
                })
                .collect();

            if providing.len() == 1 {
                trace!(
                    variant = evaluations[providing[0]].candidate.name(),
                    "capability narrowed tie"
                );
                survivors = providing;
            }
        }

        match survivors.as_slice() {
            [index] => {
                let selected = evaluations[*index].candidate;
                debug!(
                    variant = selected.name(),
                    module = %selected.owner(),
                    "selected variant"
                );
                Ok(selected)
            }
            [] => Err(VariantError::InvariantViolation(
                "disambiguation eliminated every compatible candidate".to_string(),
            )),
            tied => {
                debug!(tied = tied.len(), "ambiguous variant selection");
                Err(VariantError::AmbiguousVariant(Box::new(self.report(
                    FailureKind::AmbiguousVariant,
                    request,
                    &evaluations,
                    tied,
                ))))
            }
        }
    }

    fn evaluate<'c>(
        &self,
        request: &ConsumerRequest,
        requested: &[String],
        candidate: &'c ResolvedVariant,
    ) -> Evaluation<'c> {
        let mut compatible = true;
        let checks = requested
            .iter()
            .filter_map(|attribute| {
                let wanted = request.attributes().get_value(attribute)?;
                let found = candidate.attributes().get_value(attribute);
                let reason = match self.schema.compatibility(attribute, wanted, found) {
                    Compatibility::Compatible => Reason::Matched,
                    Compatibility::Incompatible => {
                        compatible = false;
                        Reason::Incompatible
                    }
                };
                Some(AttributeCheck {
                    attribute: attribute.clone(),
                    requested: Some(wanted.clone()),
                    candidate: found.cloned(),
                    reason,
                })
            })
            .collect();

        Evaluation {
            candidate,
            checks,
            compatible,
            eliminated_by: None,
        }
    }

    /// Narrow the survivors on one attribute
    ///
    /// A requested value carried exactly by some survivors is preferred over
    /// other compatible values; otherwise the schema's rule decides. Survivors
    /// without a value for the attribute are never dropped here.
    fn narrow(
        &self,
        request: &ConsumerRequest,
        attribute: &str,
        survivors: &mut Vec<usize>,
        evaluations: &mut [Evaluation<'_>],
    ) {
        let values: BTreeSet<AttributeValue> = survivors
            .iter()
            .filter_map(|&index| evaluations[index].candidate.attributes().get_value(attribute))
            .cloned()
            .collect();

        if values.len() < 2 {
            return;
        }

        let preferred = match request.attributes().get_value(attribute) {
            Some(wanted) if values.contains(wanted) => BTreeSet::from([wanted.clone()]),
            _ => self.schema.disambiguate(attribute, &values),
        };

        if preferred.len() == values.len() {
            return;
        }

        survivors.retain(|&index| {
            let candidate = evaluations[index].candidate;
            match candidate.attributes().get_value(attribute) {
                Some(value) if !preferred.contains(value) => {
                    evaluations[index].eliminated_by =
                        Some((attribute.to_string(), Some(value.clone())));
                    false
                }
                _ => true,
            }
        });

        trace!(attribute, remaining = survivors.len(), "disambiguated");
    }

    fn report(
        &self,
        kind: FailureKind,
        request: &ConsumerRequest,
        evaluations: &[Evaluation<'_>],
        tied: &[usize],
    ) -> MatchReport {
        let candidates = evaluations
            .iter()
            .enumerate()
            .map(|(index, evaluation)| {
                let is_tied = tied.contains(&index);
                let status = if !evaluation.compatible {
                    CandidateStatus::Incompatible
                } else if is_tied {
                    CandidateStatus::Tied
                } else {
                    CandidateStatus::DisambiguatedOut
                };

                let mut checks: Vec<AttributeCheck> = evaluation
                    .checks
                    .iter()
                    .cloned()
                    .map(|mut check| {
                        if is_tied && check.reason == Reason::Matched {
                            check.reason = Reason::Tied;
                        }
                        check
                    })
                    .collect();

                if let Some((attribute, value)) = &evaluation.eliminated_by {
                    match checks.iter_mut().find(|check| &check.attribute == attribute) {
                        Some(check) => check.reason = Reason::DisambiguatedOut,
                        None => checks.push(AttributeCheck {
                            attribute: attribute.clone(),
                            requested: None,
                            candidate: value.clone(),
                            reason: Reason::DisambiguatedOut,
                        }),
                    }
                }

                CandidateReport {
                    name: evaluation.candidate.name().to_string(),
                    owner: evaluation.candidate.owner().clone(),
                    status,
                    attributes: evaluation.candidate.attributes().to_map(),
                    capabilities: evaluation.candidate.capabilities(),
                    checks,
                }
            })
            .collect();

        MatchReport {
            kind,
            requested: request.attributes().to_map(),
            capability: request.capability().cloned(),
            candidates,
            differing: differing_attributes(evaluations, tied),
        }
    }
}

/// Attributes whose values are not the same across all tied candidates
fn differing_attributes(
    evaluations: &[Evaluation<'_>],
    tied: &[usize],
) -> BTreeMap<String, BTreeMap<String, Option<AttributeValue>>> {
    let names: BTreeSet<&str> = tied
        .iter()
        .flat_map(|&index| evaluations[index].candidate.attributes().names())
        .collect();

    names
        .into_iter()
        .filter_map(|attribute| {
            let values: BTreeMap<String, Option<AttributeValue>> = tied
                .iter()
                .map(|&index| {
                    let candidate = evaluations[index].candidate;
                    (
                        candidate.name().to_string(),
                        candidate.attributes().get_value(attribute).cloned(),
                    )
                })
                .collect();

            let distinct: BTreeSet<&Option<AttributeValue>> = values.values().collect();
            (distinct.len() > 1).then(|| (attribute.to_string(), values))
        })
        .collect()
}
