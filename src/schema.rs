//! Schema provider: constructor parameter lists for named classes.
//!
//! The decoder only ever asks one question: "which parameters does class `C`
//! take, given that `C` is expected as `expected`?". `Registry` answers it from
//! registered class schemas; `MemoizingProvider` caches the answers.
pub mod document;
pub mod memo;
pub mod registry;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::descriptor::{Literal, TypeDescriptor};
use crate::error::Result;

pub use document::{DocumentError, SchemaDocument};
pub use memo::MemoizingProvider;
pub use registry::{ClassSchema, EnumCase, EnumSchema, Registry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self { name: name.into(), ty, default: None }
    }

    pub fn with_default(mut self, default: impl Into<Literal>) -> Self {
        self.default = Some(default.into());
        self
    }
}

pub trait SchemaProvider: Send + Sync {
    /// Parameters of the single public constructor of `class`, with generic
    /// arguments carried by `expected` already substituted.
    fn parameters(&self, class: &str, expected: &TypeDescriptor) -> Result<Arc<[ParameterDescriptor]>>;
}

impl<P: SchemaProvider + ?Sized> SchemaProvider for Arc<P> {
    fn parameters(&self, class: &str, expected: &TypeDescriptor) -> Result<Arc<[ParameterDescriptor]>> {
        (**self).parameters(class, expected)
    }
}

impl<P: SchemaProvider + ?Sized> SchemaProvider for Box<P> {
    fn parameters(&self, class: &str, expected: &TypeDescriptor) -> Result<Arc<[ParameterDescriptor]>> {
        (**self).parameters(class, expected)
    }
}
