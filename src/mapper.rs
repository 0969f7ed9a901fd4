//! Entry point: map a JSON document onto a registered class.
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::decode::{Decoder, Decoding};
use crate::descriptor::TypeDescriptor;
use crate::error::{MapperError, Result};
use crate::path_de::{self, PathError};
use crate::schema::{MemoizingProvider, ParameterDescriptor, Registry, SchemaProvider};
use crate::value::{Decoded, Instance};

// ------------------------------- Config ----------------------------------- //

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    /// Declared class → class actually constructed.
    pub class_mapping: HashMap<String, String>,
    /// Class → parameter → source field name.
    pub parameter_name_mapping: HashMap<String, HashMap<String, String>>,
}

impl MapperConfig {
    pub fn from_json(src: &str) -> std::result::Result<Self, PathError> {
        path_de::from_str_with_path(src)
    }
}

// ------------------------------- Builder ---------------------------------- //

#[derive(Default)]
pub struct MapperBuilder {
    config: MapperConfig,
    provider: Option<Box<dyn SchemaProvider>>,
}

impl MapperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_mapping<I, K, V>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config.class_mapping.extend(mapping.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Read parameter `parameter` of `class` from JSON field `field`.
    pub fn with_parameter_mapping(
        mut self,
        class: impl Into<String>,
        parameter: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.config
            .parameter_name_mapping
            .entry(class.into())
            .or_default()
            .insert(parameter.into(), field.into());
        self
    }

    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default provider (a memoizing wrapper around the registry).
    pub fn with_parameters_provider(mut self, provider: impl SchemaProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    pub fn build(self, registry: Arc<Registry>) -> Mapper {
        let provider = match self.provider {
            Some(provider) => provider,
            None => Box::new(MemoizingProvider::new(registry.clone())),
        };
        Mapper { registry, provider, config: self.config }
    }
}

// -------------------------------- Mapper ---------------------------------- //

pub struct Mapper {
    registry: Arc<Registry>,
    provider: Box<dyn SchemaProvider>,
    config: MapperConfig,
}

impl Mapper {
    pub fn new(registry: Arc<Registry>) -> Self {
        MapperBuilder::new().build(registry)
    }

    pub fn builder() -> MapperBuilder {
        MapperBuilder::new()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Parse `json` and construct an instance of `class` from it.
    pub fn map(&self, class: &str, json: &str) -> Result<Instance> {
        let raw: Value = serde_json::from_str(json)?;
        self.map_value(class, &raw)
    }

    pub fn map_value(&self, class: &str, raw: &Value) -> Result<Instance> {
        if !raw.is_object() {
            return Err(MapperError::NotAnObject(raw.to_string()));
        }
        debug!(%class, "mapping document");
        match self.decode(raw, &TypeDescriptor::class(class))?.value {
            Decoded::Object(instance) => {
                debug_assert_eq!(instance.class(), self.resolve(class));
                Ok(instance)
            }
            other => unreachable!("class descriptor decoded to {}", other.kind()),
        }
    }

    /// Map and take the constructed value out as `T`.
    pub fn map_into<T: Any>(&self, class: &str, json: &str) -> Result<T> {
        self.map(class, json)?.downcast::<T>().map_err(|instance| MapperError::InstanceType {
            class: instance.class().to_owned(),
            expected: type_name::<T>(),
        })
    }

    /// Decode any raw value against any descriptor.
    pub fn decode(&self, raw: &Value, expected: &TypeDescriptor) -> Result<Decoding> {
        Decoder::new(&self.registry, self.provider.as_ref(), &self.config).decode(raw, expected)
    }

    pub fn parameters(&self, class: &str, expected: &TypeDescriptor) -> Result<Arc<[ParameterDescriptor]>> {
        self.provider.parameters(class, expected)
    }

    fn resolve<'c>(&'c self, class: &'c str) -> &'c str {
        self.config.class_mapping.get(class).map(String::as_str).unwrap_or(class)
    }
}
