//! Attribute schema: registered attributes and their matching rules
//!
//! The schema is assembled once through [`SchemaBuilder`] and frozen into an
//! [`AttributeSchema`]. Nothing mutates it afterwards, so one instance can be
//! shared by reference across every matching call and thread of a session.

use crate::attribute::{Attribute, AttributeValue, AttributeValueType, ValueKind};
use crate::config::SchemaSection;
use crate::error::{VariantError, VariantResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Decides whether a candidate's value satisfies a requested value
pub trait CompatibilityRule: Send + Sync {
    fn is_compatible(&self, requested: &AttributeValue, candidate: &AttributeValue) -> bool;

    /// Whether a candidate without any value for the attribute is compatible
    fn absent_is_compatible(&self) -> bool {
        false
    }
}

impl<F> CompatibilityRule for F
where
    F: Fn(&AttributeValue, &AttributeValue) -> bool + Send + Sync,
{
    fn is_compatible(&self, requested: &AttributeValue, candidate: &AttributeValue) -> bool {
        self(requested, candidate)
    }
}

/// Narrows a set of compatible candidate values to the preferred subset
///
/// Must be a pure function of its input. Returning the whole input means
/// "no preference".
pub trait DisambiguationRule: Send + Sync {
    fn preferred(&self, candidates: &BTreeSet<AttributeValue>) -> BTreeSet<AttributeValue>;
}

impl<F> DisambiguationRule for F
where
    F: Fn(&BTreeSet<AttributeValue>) -> BTreeSet<AttributeValue> + Send + Sync,
{
    fn preferred(&self, candidates: &BTreeSet<AttributeValue>) -> BTreeSet<AttributeValue> {
        self(candidates)
    }
}

/// Compatible only when the values are equal
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl CompatibilityRule for ExactMatch {
    fn is_compatible(&self, requested: &AttributeValue, candidate: &AttributeValue) -> bool {
        requested == candidate
    }
}

/// Exact match, plus extra candidate values accepted for given requested values
#[derive(Debug, Clone, Default)]
pub struct AcceptValues {
    accepted: BTreeMap<AttributeValue, BTreeSet<AttributeValue>>,
}

impl AcceptValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `requested` is asked for, also accept each of `candidates`
    pub fn accept(
        mut self,
        requested: impl Into<AttributeValue>,
        candidates: impl IntoIterator<Item = impl Into<AttributeValue>>,
    ) -> Self {
        self.accepted
            .entry(requested.into())
            .or_default()
            .extend(candidates.into_iter().map(Into::into));
        self
    }
}

impl CompatibilityRule for AcceptValues {
    fn is_compatible(&self, requested: &AttributeValue, candidate: &AttributeValue) -> bool {
        requested == candidate
            || self
                .accepted
                .get(requested)
                .is_some_and(|accepted| accepted.contains(candidate))
    }
}

/// Integer candidate values up to and including the requested value
#[derive(Debug, Clone, Copy, Default)]
pub struct AtMost;

impl CompatibilityRule for AtMost {
    fn is_compatible(&self, requested: &AttributeValue, candidate: &AttributeValue) -> bool {
        match (requested.as_integer(), candidate.as_integer()) {
            (Some(requested), Some(candidate)) => candidate <= requested,
            _ => requested == candidate,
        }
    }
}

/// Wraps a rule so that candidates lacking the attribute are compatible
pub struct AbsentCompatible<R>(pub R);

impl<R: CompatibilityRule> CompatibilityRule for AbsentCompatible<R> {
    fn is_compatible(&self, requested: &AttributeValue, candidate: &AttributeValue) -> bool {
        self.0.is_compatible(requested, candidate)
    }

    fn absent_is_compatible(&self) -> bool {
        true
    }
}

/// Prefers the first value of a fixed list that is present among the candidates
#[derive(Debug, Clone, Default)]
pub struct PreferOrder {
    order: Vec<AttributeValue>,
}

impl PreferOrder {
    pub fn new(order: impl IntoIterator<Item = impl Into<AttributeValue>>) -> Self {
        Self {
            order: order.into_iter().map(Into::into).collect(),
        }
    }
}

impl DisambiguationRule for PreferOrder {
    fn preferred(&self, candidates: &BTreeSet<AttributeValue>) -> BTreeSet<AttributeValue> {
        self.order
            .iter()
            .find(|value| candidates.contains(value))
            .map(|value| BTreeSet::from([value.clone()]))
            .unwrap_or_else(|| candidates.clone())
    }
}

/// Prefers the greatest value
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferHighest;

impl DisambiguationRule for PreferHighest {
    fn preferred(&self, candidates: &BTreeSet<AttributeValue>) -> BTreeSet<AttributeValue> {
        candidates.last().cloned().into_iter().collect()
    }
}

/// Prefers the smallest value
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferLowest;

impl DisambiguationRule for PreferLowest {
    fn preferred(&self, candidates: &BTreeSet<AttributeValue>) -> BTreeSet<AttributeValue> {
        candidates.first().cloned().into_iter().collect()
    }
}

/// A registered attribute with its rules
#[derive(Clone)]
pub struct AttributeDefinition {
    name: String,
    kind: ValueKind,
    compatibility: Option<Arc<dyn CompatibilityRule>>,
    disambiguation: Option<Arc<dyn DisambiguationRule>>,
}

impl AttributeDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn has_compatibility_rule(&self) -> bool {
        self.compatibility.is_some()
    }

    pub fn has_disambiguation_rule(&self) -> bool {
        self.disambiguation.is_some()
    }
}

impl fmt::Debug for AttributeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("compatibility", &self.compatibility.is_some())
            .field("disambiguation", &self.disambiguation.is_some())
            .finish()
    }
}

/// Outcome of checking one attribute of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Incompatible,
}

/// Mutable accumulator for an [`AttributeSchema`]
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    definitions: Vec<AttributeDefinition>,
    index: HashMap<String, usize>,
    precedence: Option<Vec<String>>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attribute with optional rules
    ///
    /// Registering a name again with the same domain keeps its position in the
    /// precedence order and replaces whichever rules are supplied. A different
    /// domain is a [`VariantError::DuplicateAttribute`].
    pub fn register<T: AttributeValueType>(
        &mut self,
        attribute: &Attribute<T>,
        compatibility: Option<Arc<dyn CompatibilityRule>>,
        disambiguation: Option<Arc<dyn DisambiguationRule>>,
    ) -> VariantResult<&mut Self> {
        let name = attribute.name();

        if let Some(&position) = self.index.get(name) {
            let existing = &mut self.definitions[position];
            if existing.kind != T::KIND {
                return Err(VariantError::DuplicateAttribute {
                    name: name.to_string(),
                    existing: existing.kind.to_string(),
                    requested: T::KIND.to_string(),
                });
            }
            if compatibility.is_some() {
                existing.compatibility = compatibility;
            }
            if disambiguation.is_some() {
                existing.disambiguation = disambiguation;
            }
            return Ok(self);
        }

        self.index.insert(name.to_string(), self.definitions.len());
        self.definitions.push(AttributeDefinition {
            name: name.to_string(),
            kind: T::KIND,
            compatibility,
            disambiguation,
        });
        Ok(self)
    }

    /// Register an attribute using only the default rules
    pub fn attribute<T: AttributeValueType>(
        &mut self,
        attribute: &Attribute<T>,
    ) -> VariantResult<&mut Self> {
        self.register(attribute, None, None)
    }

    /// Register an attribute with a compatibility rule
    pub fn with_compatibility<T: AttributeValueType>(
        &mut self,
        attribute: &Attribute<T>,
        rule: impl CompatibilityRule + 'static,
    ) -> VariantResult<&mut Self> {
        self.register(attribute, Some(Arc::new(rule)), None)
    }

    /// Register an attribute with a disambiguation rule
    pub fn with_disambiguation<T: AttributeValueType>(
        &mut self,
        attribute: &Attribute<T>,
        rule: impl DisambiguationRule + 'static,
    ) -> VariantResult<&mut Self> {
        self.register(attribute, None, Some(Arc::new(rule)))
    }

    /// Override the disambiguation precedence
    ///
    /// Listed attributes go first in the given order; the rest follow in
    /// registration order. Every name must be registered by the time
    /// [`build`](Self::build) runs.
    pub fn precedence<I, S>(&mut self, order: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precedence = Some(order.into_iter().map(Into::into).collect());
        self
    }

    /// Apply the `[schema]` section of a resolution config
    pub fn apply_config(&mut self, section: &SchemaSection) -> &mut Self {
        if !section.precedence.is_empty() {
            self.precedence(section.precedence.iter().cloned());
        }
        self
    }

    /// Freeze the schema
    pub fn build(&self) -> VariantResult<AttributeSchema> {
        let mut order: Vec<String> = Vec::with_capacity(self.definitions.len());

        if let Some(explicit) = &self.precedence {
            for name in explicit {
                if !self.index.contains_key(name) {
                    return Err(VariantError::configuration(
                        name.clone(),
                        "precedence names an attribute that is not registered in the schema",
                    ));
                }
                if order.contains(name) {
                    return Err(VariantError::configuration(
                        name.clone(),
                        "attribute is listed twice in the precedence order",
                    ));
                }
                order.push(name.clone());
            }
        }

        for definition in &self.definitions {
            if !order.contains(&definition.name) {
                order.push(definition.name.clone());
            }
        }

        let definitions = self
            .definitions
            .iter()
            .map(|definition| (definition.name.clone(), definition.clone()))
            .collect();

        Ok(AttributeSchema {
            definitions,
            precedence: order,
        })
    }
}

/// Frozen registry of attributes and rules
#[derive(Clone, Default)]
pub struct AttributeSchema {
    definitions: HashMap<String, AttributeDefinition>,
    precedence: Vec<String>,
}

impl AttributeSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// An empty schema: every attribute uses the default rules
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn definition(&self, name: &str) -> Option<&AttributeDefinition> {
        self.definitions.get(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Registered attribute names in disambiguation order
    pub fn precedence(&self) -> &[String] {
        &self.precedence
    }

    /// Check a candidate value against a requested value
    ///
    /// `candidate` is `None` when the candidate carries no value for the
    /// attribute; that is incompatible unless the rule declares otherwise.
    pub fn compatibility(
        &self,
        attribute: &str,
        requested: &AttributeValue,
        candidate: Option<&AttributeValue>,
    ) -> Compatibility {
        let rule = self
            .definitions
            .get(attribute)
            .and_then(|definition| definition.compatibility.as_deref());

        let compatible = match (candidate, rule) {
            (None, Some(rule)) => rule.absent_is_compatible(),
            (None, None) => false,
            (Some(candidate), _) if candidate.kind() != requested.kind() => false,
            (Some(candidate), Some(rule)) => rule.is_compatible(requested, candidate),
            (Some(candidate), None) => ExactMatch.is_compatible(requested, candidate),
        };

        if compatible {
            Compatibility::Compatible
        } else {
            Compatibility::Incompatible
        }
    }

    /// Ask the attribute's disambiguation rule for the preferred values
    ///
    /// Without a rule, or when the rule's answer does not narrow the input to a
    /// non-empty subset, the whole input comes back.
    pub fn disambiguate(
        &self,
        attribute: &str,
        candidates: &BTreeSet<AttributeValue>,
    ) -> BTreeSet<AttributeValue> {
        let Some(rule) = self
            .definitions
            .get(attribute)
            .and_then(|definition| definition.disambiguation.as_deref())
        else {
            return candidates.clone();
        };

        let preferred: BTreeSet<AttributeValue> = rule
            .preferred(candidates)
            .intersection(candidates)
            .cloned()
            .collect();

        if preferred.is_empty() {
            candidates.clone()
        } else {
            preferred
        }
    }

    /// Order a set of attribute names for disambiguation
    ///
    /// Registered names follow the schema precedence; unregistered names come
    /// after them, sorted by name.
    pub fn order<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let names: BTreeSet<&str> = names.into_iter().collect();

        let mut ordered: Vec<String> = self
            .precedence
            .iter()
            .filter(|name| names.contains(name.as_str()))
            .cloned()
            .collect();

        ordered.extend(
            names
                .into_iter()
                .filter(|name| !self.definitions.contains_key(*name))
                .map(str::to_string),
        );

        ordered
    }
}

impl fmt::Debug for AttributeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeSchema")
            .field("precedence", &self.precedence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USAGE: Attribute<String> = Attribute::new("usage");
    const BUNDLING: Attribute<String> = Attribute::new("bundling");
    const VERSION: Attribute<i64> = Attribute::new("target.version");

    fn named(value: &str) -> AttributeValue {
        AttributeValue::from(value)
    }

    #[test]
    fn test_duplicate_attribute_with_different_domain() {
        let mut builder = AttributeSchema::builder();
        builder.attribute(&USAGE).unwrap();

        let clash: Attribute<i64> = Attribute::new("usage");
        let err = builder.attribute(&clash).unwrap_err();
        assert!(matches!(err, VariantError::DuplicateAttribute { ref name, .. } if name == "usage"));
    }

    #[test]
    fn test_reregistering_same_domain_keeps_position() {
        let mut builder = AttributeSchema::builder();
        builder.attribute(&USAGE).unwrap();
        builder.attribute(&BUNDLING).unwrap();
        builder
            .with_disambiguation(&USAGE, PreferOrder::new(["api"]))
            .unwrap();

        let schema = builder.build().unwrap();
        assert_eq!(schema.precedence(), &["usage", "bundling"]);
        assert!(schema.definition("usage").unwrap().has_disambiguation_rule());
    }

    #[test]
    fn test_default_compatibility_is_exact_match() {
        let schema = AttributeSchema::empty();
        assert_eq!(
            schema.compatibility("usage", &named("api"), Some(&named("api"))),
            Compatibility::Compatible
        );
        assert_eq!(
            schema.compatibility("usage", &named("api"), Some(&named("runtime"))),
            Compatibility::Incompatible
        );
    }

    #[test]
    fn test_absent_value_is_incompatible_by_default() {
        let mut builder = AttributeSchema::builder();
        builder.with_compatibility(&USAGE, ExactMatch).unwrap();
        builder
            .with_compatibility(&BUNDLING, AbsentCompatible(ExactMatch))
            .unwrap();
        let schema = builder.build().unwrap();

        assert_eq!(
            schema.compatibility("usage", &named("api"), None),
            Compatibility::Incompatible
        );
        assert_eq!(
            schema.compatibility("bundling", &named("external"), None),
            Compatibility::Compatible
        );
    }

    #[test]
    fn test_at_most_compatibility() {
        let mut builder = AttributeSchema::builder();
        builder.with_compatibility(&VERSION, AtMost).unwrap();
        let schema = builder.build().unwrap();

        let requested = AttributeValue::Integer(11);
        assert_eq!(
            schema.compatibility("target.version", &requested, Some(&AttributeValue::Integer(8))),
            Compatibility::Compatible
        );
        assert_eq!(
            schema.compatibility("target.version", &requested, Some(&AttributeValue::Integer(17))),
            Compatibility::Incompatible
        );
    }

    #[test]
    fn test_closure_rules() {
        let mut builder = AttributeSchema::builder();
        builder
            .with_compatibility(&USAGE, |_: &AttributeValue, _: &AttributeValue| true)
            .unwrap();
        let schema = builder.build().unwrap();
        assert_eq!(
            schema.compatibility("usage", &named("api"), Some(&named("anything"))),
            Compatibility::Compatible
        );
    }

    #[test]
    fn test_disambiguation_without_preference_returns_input() {
        let schema = AttributeSchema::empty();
        let values = BTreeSet::from([named("embedded"), named("external")]);
        assert_eq!(schema.disambiguate("bundling", &values), values);
    }

    #[test]
    fn test_prefer_order_disambiguation() {
        let mut builder = AttributeSchema::builder();
        builder
            .with_disambiguation(&BUNDLING, PreferOrder::new(["external", "embedded"]))
            .unwrap();
        let schema = builder.build().unwrap();

        let values = BTreeSet::from([named("embedded"), named("external")]);
        assert_eq!(
            schema.disambiguate("bundling", &values),
            BTreeSet::from([named("external")])
        );
    }

    #[test]
    fn test_rule_answer_outside_input_is_ignored() {
        let mut builder = AttributeSchema::builder();
        builder
            .with_disambiguation(&BUNDLING, |_: &BTreeSet<AttributeValue>| {
                BTreeSet::from([AttributeValue::from("shadowed")])
            })
            .unwrap();
        let schema = builder.build().unwrap();

        let values = BTreeSet::from([named("embedded"), named("external")]);
        assert_eq!(schema.disambiguate("bundling", &values), values);
    }

    #[test]
    fn test_explicit_precedence_override() {
        let mut builder = AttributeSchema::builder();
        builder.attribute(&USAGE).unwrap();
        builder.attribute(&BUNDLING).unwrap();
        builder.attribute(&VERSION).unwrap();
        builder.precedence(["target.version"]);

        let schema = builder.build().unwrap();
        assert_eq!(
            schema.precedence(),
            &["target.version", "usage", "bundling"]
        );
    }

    #[test]
    fn test_precedence_rejects_unknown_attribute() {
        let mut builder = AttributeSchema::builder();
        builder.attribute(&USAGE).unwrap();
        builder.precedence(["packaging"]);
        assert!(matches!(
            builder.build(),
            Err(VariantError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_order_puts_unregistered_names_last() {
        let mut builder = AttributeSchema::builder();
        builder.attribute(&BUNDLING).unwrap();
        builder.attribute(&USAGE).unwrap();
        let schema = builder.build().unwrap();

        let order = schema.order(["zeta", "usage", "alpha", "bundling"]);
        assert_eq!(order, vec!["bundling", "usage", "alpha", "zeta"]);
    }
}
