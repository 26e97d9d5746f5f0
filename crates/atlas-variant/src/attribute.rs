//! Typed attributes and attribute containers
//!
//! An [`Attribute<T>`] is a typed key. Containers store values uniformly as
//! [`AttributeValue`] keyed by attribute name, so the same container can hold
//! attributes of different value domains while the public API stays typed.

use crate::error::{VariantError, VariantResult};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// Value domain of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Named,
    Integer,
    Boolean,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named => write!(f, "named"),
            Self::Integer => write!(f, "integer"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// An attribute value in its type-erased form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Named(String),
    Integer(i64),
    Boolean(bool),
}

impl AttributeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Named(_) => ValueKind::Named,
            Self::Integer(_) => ValueKind::Integer,
            Self::Boolean(_) => ValueKind::Boolean,
        }
    }

    pub fn as_named(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{}", name),
            Self::Integer(value) => write!(f, "{}", value),
            Self::Boolean(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Named(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Rust types usable as an attribute value domain
pub trait AttributeValueType: Sized + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> AttributeValue;

    fn from_value(value: &AttributeValue) -> Option<Self>;
}

impl AttributeValueType for String {
    const KIND: ValueKind = ValueKind::Named;

    fn into_value(self) -> AttributeValue {
        AttributeValue::Named(self)
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        value.as_named().map(str::to_string)
    }
}

impl AttributeValueType for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn into_value(self) -> AttributeValue {
        AttributeValue::Integer(self)
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        value.as_integer()
    }
}

impl AttributeValueType for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn into_value(self) -> AttributeValue {
        AttributeValue::Boolean(self)
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// A typed attribute key
///
/// The name is the identity: two attributes with the same name are the same
/// attribute, and the schema rejects registering one name under two domains.
pub struct Attribute<T> {
    name: Cow<'static, str>,
    _domain: PhantomData<fn() -> T>,
}

impl<T: AttributeValueType> Attribute<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _domain: PhantomData,
        }
    }

    /// Create an attribute with a runtime-computed name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            _domain: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        T::KIND
    }
}

impl<T> Clone for Attribute<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _domain: PhantomData,
        }
    }
}

impl<T: AttributeValueType> fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attribute({}: {})", self.name, T::KIND)
    }
}

/// Mapping from attribute name to value
///
/// Writable while being assembled; [`lock`](Self::lock) freezes it and every
/// later write fails with a configuration error. Iteration is ordered by
/// attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeContainer {
    entries: BTreeMap<String, AttributeValue>,
    locked: bool,
}

impl AttributeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a typed attribute value
    pub fn insert<T: AttributeValueType>(
        &mut self,
        attribute: &Attribute<T>,
        value: impl Into<T>,
    ) -> VariantResult<()> {
        self.insert_value(attribute.name(), value.into().into_value())
    }

    /// Set a value by attribute name
    pub fn insert_value(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> VariantResult<()> {
        let name = name.into();
        if self.locked {
            return Err(VariantError::configuration(
                name,
                "attribute container is locked and can no longer be modified",
            ));
        }

        let value = value.into();
        if let Some(existing) = self.entries.get(&name) {
            if existing.kind() != value.kind() {
                return Err(VariantError::configuration(
                    name,
                    format!(
                        "value '{}' is {}, attribute already holds a {} value",
                        value,
                        value.kind(),
                        existing.kind()
                    ),
                ));
            }
        }

        self.entries.insert(name, value);
        Ok(())
    }

    /// Builder-style insert for request and test construction
    pub fn with<T: AttributeValueType>(
        mut self,
        attribute: &Attribute<T>,
        value: impl Into<T>,
    ) -> VariantResult<Self> {
        self.insert(attribute, value)?;
        Ok(self)
    }

    pub fn get<T: AttributeValueType>(&self, attribute: &Attribute<T>) -> Option<T> {
        self.entries.get(attribute.name()).and_then(T::from_value)
    }

    pub fn get_value(&self, name: &str) -> Option<&AttributeValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Freeze the container
    pub fn lock(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Overlay `other` on top of this container; `other` wins on collisions.
    ///
    /// Produces a fresh, locked container; neither input is modified.
    pub fn merged_with(&self, other: &AttributeContainer) -> Self {
        let mut entries = self.entries.clone();
        for (name, value) in &other.entries {
            entries.insert(name.clone(), value.clone());
        }
        Self {
            entries,
            locked: true,
        }
    }

    pub(crate) fn to_map(&self) -> BTreeMap<String, AttributeValue> {
        self.entries.clone()
    }
}
