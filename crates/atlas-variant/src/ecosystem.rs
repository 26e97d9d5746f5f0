//! Standard library-ecosystem attributes
//!
//! Provides the attribute catalogue shared by producers and consumers:
//! - `usage`: what the variant is for (api / runtime)
//! - `category`: library or platform
//! - `bundling`: how dependencies are packaged
//! - `library.elements`: packaging form of the artifacts
//! - `target.version`: minimum platform version the artifacts need

use crate::attribute::{Attribute, AttributeContainer, AttributeValueType};
use crate::error::{VariantError, VariantResult};
use crate::matching::ConsumerRequest;
use crate::schema::{AcceptValues, AtMost, AttributeSchema, PreferHighest, PreferOrder};
use std::sync::Arc;

pub const USAGE: Attribute<String> = Attribute::new("usage");
pub const CATEGORY: Attribute<String> = Attribute::new("category");
pub const BUNDLING: Attribute<String> = Attribute::new("bundling");
pub const LIBRARY_ELEMENTS: Attribute<String> = Attribute::new("library.elements");
pub const TARGET_VERSION: Attribute<i64> = Attribute::new("target.version");

pub mod usage {
    pub const API: &str = "api";
    pub const RUNTIME: &str = "runtime";
}

pub mod category {
    pub const LIBRARY: &str = "library";
    pub const PLATFORM: &str = "platform";
    pub const ENFORCED_PLATFORM: &str = "enforced-platform";
}

pub mod bundling {
    pub const EXTERNAL: &str = "external";
    pub const EMBEDDED: &str = "embedded";
    pub const SHADOWED: &str = "shadowed";
}

pub mod library_elements {
    pub const JAR: &str = "jar";
    pub const CLASSES: &str = "classes";
    pub const RESOURCES: &str = "resources";
}

/// The schema for the standard attributes
///
/// Precedence follows registration order: usage, category, library elements,
/// bundling, target version.
pub fn standard_schema() -> VariantResult<AttributeSchema> {
    let mut builder = AttributeSchema::builder();

    builder.register(
        &USAGE,
        Some(Arc::new(AcceptValues::new().accept(usage::API, [usage::RUNTIME]))),
        None,
    )?;
    builder.register(
        &CATEGORY,
        None,
        Some(Arc::new(PreferOrder::new([category::LIBRARY]))),
    )?;
    builder.register(
        &LIBRARY_ELEMENTS,
        Some(Arc::new(
            AcceptValues::new()
                .accept(library_elements::CLASSES, [library_elements::JAR])
                .accept(library_elements::RESOURCES, [library_elements::JAR]),
        )),
        Some(Arc::new(PreferOrder::new([
            library_elements::JAR,
            library_elements::CLASSES,
            library_elements::RESOURCES,
        ]))),
    )?;
    builder.register(
        &BUNDLING,
        Some(Arc::new(
            AcceptValues::new()
                .accept(bundling::EXTERNAL, [bundling::EMBEDDED, bundling::SHADOWED])
                .accept(bundling::EMBEDDED, [bundling::SHADOWED]),
        )),
        Some(Arc::new(PreferOrder::new([
            bundling::EXTERNAL,
            bundling::EMBEDDED,
            bundling::SHADOWED,
        ]))),
    )?;
    builder.register(
        &TARGET_VERSION,
        Some(Arc::new(AtMost)),
        Some(Arc::new(PreferHighest)),
    )?;

    builder.build()
}

/// Fluent view over an attribute container, used by builder refiners
///
/// A failed write is remembered and reported when the container is taken out.
#[derive(Debug, Default)]
pub struct EcosystemAttributes {
    container: AttributeContainer,
    error: Option<VariantError>,
}

impl EcosystemAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_container(container: AttributeContainer) -> Self {
        Self {
            container,
            error: None,
        }
    }

    /// Set any attribute
    pub fn attribute<T: AttributeValueType>(
        &mut self,
        attribute: &Attribute<T>,
        value: impl Into<T>,
    ) -> &mut Self {
        if let Err(err) = self.container.insert(attribute, value) {
            self.error.get_or_insert(err);
        }
        self
    }

    pub fn providing_api(&mut self) -> &mut Self {
        self.attribute(&USAGE, usage::API)
    }

    pub fn providing_runtime(&mut self) -> &mut Self {
        self.attribute(&USAGE, usage::RUNTIME)
    }

    pub fn library(&mut self) -> &mut Self {
        self.attribute(&CATEGORY, category::LIBRARY)
    }

    pub fn platform(&mut self) -> &mut Self {
        self.attribute(&CATEGORY, category::PLATFORM)
    }

    pub fn enforced_platform(&mut self) -> &mut Self {
        self.attribute(&CATEGORY, category::ENFORCED_PLATFORM)
    }

    pub fn with_external_dependencies(&mut self) -> &mut Self {
        self.attribute(&BUNDLING, bundling::EXTERNAL)
    }

    pub fn with_embedded_dependencies(&mut self) -> &mut Self {
        self.attribute(&BUNDLING, bundling::EMBEDDED)
    }

    pub fn with_shadowed_dependencies(&mut self) -> &mut Self {
        self.attribute(&BUNDLING, bundling::SHADOWED)
    }

    pub fn as_jar(&mut self) -> &mut Self {
        self.attribute(&LIBRARY_ELEMENTS, library_elements::JAR)
    }

    pub fn as_classes(&mut self) -> &mut Self {
        self.attribute(&LIBRARY_ELEMENTS, library_elements::CLASSES)
    }

    pub fn target_version(&mut self, version: i64) -> &mut Self {
        self.attribute(&TARGET_VERSION, version)
    }

    pub fn container(&self) -> &AttributeContainer {
        &self.container
    }

    pub fn into_container(self) -> VariantResult<AttributeContainer> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.container),
        }
    }
}

impl ConsumerRequest {
    /// Request for compiling against a library's API
    pub fn compile_classpath() -> Self {
        let mut details = EcosystemAttributes::new();
        details
            .library()
            .providing_api()
            .with_external_dependencies();
        Self::new(details.container)
    }

    /// Request for running against a library
    pub fn runtime_classpath() -> Self {
        let mut details = EcosystemAttributes::new();
        details
            .library()
            .providing_runtime()
            .as_jar()
            .with_external_dependencies();
        Self::new(details.container)
    }
}
