//! Schema-directed decoding.
//!
//! Walks a raw JSON value and an expected [`TypeDescriptor`] together and
//! produces the decoded value plus its *inferred* descriptor, the most specific
//! description of what was actually decoded.
//!
//! Design goals:
//! - Dispatch on `(raw, expected)` only; the decoder holds no state beyond the
//!   schema provider's cache.
//! - Every acceptance check happens at the position that owns it (constructor
//!   parameter, array key/element, union alternative) so errors name that position.
//! - Nothing is constructed until all of its arguments decoded and were accepted.
mod array;
mod object;
mod union;

use serde_json::Value;
use tracing::trace;

use crate::descriptor::{integral, Literal, ScalarKind, TypeDescriptor};
use crate::error::{MapperError, Result};
use crate::mapper::MapperConfig;
use crate::schema::{Registry, SchemaProvider};
use crate::value::{Decoded, EnumValue};

/// A decoded value together with its inferred descriptor.
#[derive(Debug)]
pub struct Decoding {
    pub value: Decoded,
    pub inferred: TypeDescriptor,
}

impl Decoding {
    pub fn null() -> Self {
        Self { value: Decoded::Null, inferred: TypeDescriptor::Null }
    }

    pub fn literal(lit: &Literal) -> Self {
        Self { value: Decoded::from_literal(lit), inferred: TypeDescriptor::Literal(lit.clone()) }
    }
}

pub struct Decoder<'a> {
    registry: &'a Registry,
    provider: &'a dyn SchemaProvider,
    config: &'a MapperConfig,
}

impl<'a> Decoder<'a> {
    pub fn new(registry: &'a Registry, provider: &'a dyn SchemaProvider, config: &'a MapperConfig) -> Self {
        Self { registry, provider, config }
    }

    pub fn decode(&self, raw: &Value, expected: &TypeDescriptor) -> Result<Decoding> {
        match raw {
            Value::Null => Ok(Decoding::null()),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => self.scalar(raw, expected),
            Value::Array(_) | Value::Object(_) => self.structure(raw, expected),
        }
    }

    fn scalar(&self, raw: &Value, expected: &TypeDescriptor) -> Result<Decoding> {
        match expected {
            TypeDescriptor::Enum(name) if raw.is_string() || raw.is_i64() => self.enumeration(name, raw, expected),
            TypeDescriptor::Union(arms) if arms.iter().any(|a| matches!(a, TypeDescriptor::Enum(_))) => {
                self.union(raw, arms)
            }
            _ => {
                let lit = Literal::from_json(raw).ok_or_else(|| MapperError::InvalidValue(raw.clone()))?;
                Ok(Decoding::literal(&lit))
            }
        }
    }

    fn structure(&self, raw: &Value, expected: &TypeDescriptor) -> Result<Decoding> {
        use TypeDescriptor as T;
        match (raw, expected) {
            (Value::Object(map), T::ObjectAny | T::Mixed) => {
                Ok(Decoding { value: Decoded::Opaque(map.clone()), inferred: T::ObjectAny })
            }
            (_, T::ArrayOf { key, value }) => self.array(raw, key, value),
            (_, T::ArrayShape(elements)) => self.shape(raw, elements, expected),
            (Value::Array(_), T::Mixed) => self.array(raw, &T::array_key(), &T::Mixed),
            (Value::Object(map), T::Class { name, args }) => self.object(map, name, args, expected),
            (_, T::Union(arms)) => self.union(raw, arms),
            _ => Err(MapperError::InvalidValue(raw.clone())),
        }
    }

    fn enumeration(&self, name: &str, raw: &Value, expected: &TypeDescriptor) -> Result<Decoding> {
        let schema = self.registry.enum_schema(name)?;
        let rejected = || MapperError::EnumRejected { expected: expected.clone(), value: raw.clone() };
        let lit = Literal::from_json(raw).ok_or_else(rejected)?;
        let case = schema.case_for(&lit).ok_or_else(rejected)?;
        trace!(enum_ = name, case = %case.name, "resolved enum case");
        Ok(Decoding {
            value: Decoded::Enum(EnumValue { class: name.to_owned(), case: case.name.clone(), value: lit }),
            inferred: TypeDescriptor::EnumCase { name: name.to_owned(), case: case.name.clone() },
        })
    }

    /// Convert an accepted value to the representation of `expected`:
    /// ints stored as floats widen, integral floats stored as ints narrow.
    /// For unions the first accepting alternative decides.
    pub(crate) fn coerce(&self, decoding: Decoding, expected: &TypeDescriptor) -> Decoding {
        use TypeDescriptor as T;
        if let T::Union(arms) = expected {
            return match arms.iter().find(|a| a.accepts(&decoding.inferred, self.registry)) {
                Some(arm) => self.coerce(decoding, arm),
                None => decoding,
            };
        }
        let coerced = match (&decoding.value, expected) {
            (Decoded::Int(i), T::Scalar(ScalarKind::Float) | T::Literal(Literal::Float(_))) => {
                Some(Literal::from(*i as f64))
            }
            (Decoded::Float(f), T::Scalar(ScalarKind::Int) | T::IntRange { .. }) => integral(*f).map(Literal::Int),
            _ => None,
        };
        match coerced {
            Some(lit) => Decoding::literal(&lit),
            None => decoding,
        }
    }
}
