//! Type descriptor algebra.
//!
//! A `TypeDescriptor` says what shape of value a position in the target schema
//! expects. The same algebra doubles as the *inferred* descriptor of a decoded
//! value, where it is always the most specific variant (a decoded string is
//! `Literal('foo')`, never `string`).
//!
//! - Unions are flattened + de-duplicated on construction; the empty union is `never`.
//! - `Display` renders the textual form (`array<int|string, Pair>`), `FromStr` parses it.
//! - The textual form doubles as the memoization key for parameter lists.
pub mod accepts;
pub mod parse;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexSet;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

pub use accepts::ClassHierarchy;
pub use parse::ParseError;

// ------------------------------- Scalars --------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Int,
    Float,
    String,
    Bool,
}

impl ScalarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::String => "string",
            ScalarKind::Bool => "bool",
        }
    }
}

/// Exact scalar value. Floats are wrapped so literals can be hashed and used as
/// cache/union keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
    Bool(bool),
}

impl Literal {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Literal::Int(_) => ScalarKind::Int,
            Literal::Float(_) => ScalarKind::Float,
            Literal::String(_) => ScalarKind::String,
            Literal::Bool(_) => ScalarKind::Bool,
        }
    }

    /// Classify a raw JSON scalar. Integers beyond `i64` become floats.
    pub fn from_json(raw: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match raw {
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::String(s) => Some(Literal::String(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Literal::Int(i)),
                None => n.as_f64().map(|f| Literal::Float(OrderedFloat(f))),
            },
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Literal::Int(i) => Value::from(*i),
            Literal::Float(f) => Value::from(f.0),
            Literal::String(s) => Value::from(s.clone()),
            Literal::Bool(b) => Value::from(*b),
        }
    }

    /// The integer this literal denotes, if any (integral floats count).
    pub fn as_integral(&self) -> Option<i64> {
        match self {
            Literal::Int(i) => Some(*i),
            Literal::Float(f) => integral(f.0),
            Literal::String(_) | Literal::Bool(_) => None,
        }
    }
}

/// `Some(n)` when `f` is finite, has no fractional part and fits in `i64`.
pub(crate) fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) if integral(x.0).is_some() => write!(f, "{:.1}", x.0),
            Literal::Float(x) => write!(f, "{}", x.0),
            Literal::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

// ------------------------------ Descriptor -------------------------------- //

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeDescriptor {
    Null,
    Mixed,
    Literal(Literal),
    Scalar(ScalarKind),
    IntRange { min: Option<i64>, max: Option<i64> },
    ClassString { bound: Option<String> },
    ArrayOf { key: Box<TypeDescriptor>, value: Box<TypeDescriptor> },
    ArrayShape(Vec<TypeDescriptor>),
    ObjectAny,
    Class { name: String, args: Vec<TypeDescriptor> },
    Enum(String),
    /// Inferred only: the exact case an enum value decoded to.
    EnumCase { name: String, case: String },
    /// Template parameter; the schema provider substitutes it.
    TypeParam(String),
    Union(Vec<TypeDescriptor>),
}

impl TypeDescriptor {
    pub fn int() -> Self { TypeDescriptor::Scalar(ScalarKind::Int) }
    pub fn float() -> Self { TypeDescriptor::Scalar(ScalarKind::Float) }
    pub fn string() -> Self { TypeDescriptor::Scalar(ScalarKind::String) }
    pub fn bool() -> Self { TypeDescriptor::Scalar(ScalarKind::Bool) }

    pub fn literal(value: impl Into<Literal>) -> Self {
        TypeDescriptor::Literal(value.into())
    }

    pub fn class(name: impl Into<String>) -> Self {
        TypeDescriptor::Class { name: name.into(), args: Vec::new() }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Class { name: name.into(), args }
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        TypeDescriptor::Enum(name.into())
    }

    pub fn array_of(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::ArrayOf { key: Box::new(key), value: Box::new(value) }
    }

    /// `array<V>`: keyed by `int|string`.
    pub fn list_of(value: TypeDescriptor) -> Self {
        Self::array_of(Self::array_key(), value)
    }

    pub fn shape(elements: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::ArrayShape(elements)
    }

    /// The key type of an unconstrained array: `int|string`.
    pub fn array_key() -> Self {
        TypeDescriptor::Union(vec![Self::int(), Self::string()])
    }

    pub fn nullable(inner: TypeDescriptor) -> Self {
        Self::union(vec![inner, TypeDescriptor::Null])
    }

    /// The bottom type: an empty union. Accepted by everything.
    pub fn never() -> Self {
        TypeDescriptor::Union(Vec::new())
    }

    pub fn is_never(&self) -> bool {
        matches!(self, TypeDescriptor::Union(xs) if xs.is_empty())
    }

    /// Build a union: nested unions are flattened, duplicates dropped
    /// (first occurrence wins), a single member collapses to itself.
    pub fn union<I>(members: I) -> Self
    where
        I: IntoIterator<Item = TypeDescriptor>,
    {
        let mut set = IndexSet::new();
        for m in members {
            match m {
                TypeDescriptor::Union(inner) => set.extend(inner),
                other => {
                    set.insert(other);
                }
            }
        }
        let mut arms: Vec<TypeDescriptor> = set.into_iter().collect();
        match arms.len() {
            1 => arms.remove(0),
            _ => TypeDescriptor::Union(arms),
        }
    }

    /// Replace template parameters by the given bindings. Unbound parameters
    /// are left untouched.
    pub fn substitute(&self, bindings: &HashMap<String, TypeDescriptor>) -> TypeDescriptor {
        match self {
            TypeDescriptor::TypeParam(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            TypeDescriptor::ArrayOf { key, value } => {
                Self::array_of(key.substitute(bindings), value.substitute(bindings))
            }
            TypeDescriptor::ArrayShape(elements) => {
                TypeDescriptor::ArrayShape(elements.iter().map(|e| e.substitute(bindings)).collect())
            }
            TypeDescriptor::Class { name, args } => TypeDescriptor::Class {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            TypeDescriptor::Union(arms) => Self::union(arms.iter().map(|a| a.substitute(bindings))),
            TypeDescriptor::Null
            | TypeDescriptor::Mixed
            | TypeDescriptor::Literal(_)
            | TypeDescriptor::Scalar(_)
            | TypeDescriptor::IntRange { .. }
            | TypeDescriptor::ClassString { .. }
            | TypeDescriptor::ObjectAny
            | TypeDescriptor::Enum(_)
            | TypeDescriptor::EnumCase { .. } => self.clone(),
        }
    }

    /// Reinterpret bare names: names in `templates` become `TypeParam`, names
    /// in `enums` become `Enum`. The parser cannot tell these apart from classes.
    pub fn resolve_names(&self, templates: &[String], enums: &dyn Fn(&str) -> bool) -> TypeDescriptor {
        match self {
            TypeDescriptor::Class { name, args } if args.is_empty() && templates.iter().any(|t| t == name) => {
                TypeDescriptor::TypeParam(name.clone())
            }
            TypeDescriptor::Class { name, args } if args.is_empty() && enums(name) => {
                TypeDescriptor::Enum(name.clone())
            }
            TypeDescriptor::Class { name, args } => TypeDescriptor::Class {
                name: name.clone(),
                args: args.iter().map(|a| a.resolve_names(templates, enums)).collect(),
            },
            TypeDescriptor::ArrayOf { key, value } => Self::array_of(
                key.resolve_names(templates, enums),
                value.resolve_names(templates, enums),
            ),
            TypeDescriptor::ArrayShape(elements) => TypeDescriptor::ArrayShape(
                elements.iter().map(|e| e.resolve_names(templates, enums)).collect(),
            ),
            TypeDescriptor::Union(arms) => {
                Self::union(arms.iter().map(|a| a.resolve_names(templates, enums)))
            }
            _ => self.clone(),
        }
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self { Literal::Int(v) }
}
impl From<i32> for Literal {
    fn from(v: i32) -> Self { Literal::Int(v.into()) }
}
impl From<f64> for Literal {
    fn from(v: f64) -> Self { Literal::Float(OrderedFloat(v)) }
}
impl From<&str> for Literal {
    fn from(v: &str) -> Self { Literal::String(v.to_owned()) }
}
impl From<String> for Literal {
    fn from(v: String) -> Self { Literal::String(v) }
}
impl From<bool> for Literal {
    fn from(v: bool) -> Self { Literal::Bool(v) }
}

// ------------------------------- Describe --------------------------------- //

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Null => f.write_str("null"),
            TypeDescriptor::Mixed => f.write_str("mixed"),
            TypeDescriptor::Literal(lit) => write!(f, "{lit}"),
            TypeDescriptor::Scalar(kind) => f.write_str(kind.as_str()),
            TypeDescriptor::IntRange { min, max } => {
                f.write_str("int<")?;
                match min {
                    Some(m) => write!(f, "{m}")?,
                    None => f.write_str("min")?,
                }
                f.write_str(", ")?;
                match max {
                    Some(m) => write!(f, "{m}")?,
                    None => f.write_str("max")?,
                }
                f.write_str(">")
            }
            TypeDescriptor::ClassString { bound: None } => f.write_str("class-string"),
            TypeDescriptor::ClassString { bound: Some(b) } => write!(f, "class-string<{b}>"),
            TypeDescriptor::ArrayOf { key, value } => write!(f, "array<{key}, {value}>"),
            TypeDescriptor::ArrayShape(elements) => {
                f.write_str("array{")?;
                write_joined(f, elements, ", ")?;
                f.write_str("}")
            }
            TypeDescriptor::ObjectAny => f.write_str("object"),
            TypeDescriptor::Class { name, args } if args.is_empty() => f.write_str(name),
            TypeDescriptor::Class { name, args } => {
                write!(f, "{name}<")?;
                write_joined(f, args, ", ")?;
                f.write_str(">")
            }
            TypeDescriptor::Enum(name) => f.write_str(name),
            TypeDescriptor::EnumCase { name, case } => write!(f, "{name}::{case}"),
            TypeDescriptor::TypeParam(name) => f.write_str(name),
            TypeDescriptor::Union(arms) if arms.is_empty() => f.write_str("never"),
            TypeDescriptor::Union(arms) => write_joined(f, arms, "|"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, xs: &[TypeDescriptor], sep: &str) -> fmt::Result {
    for (i, x) in xs.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{x}")?;
    }
    Ok(())
}

impl From<TypeDescriptor> for String {
    fn from(t: TypeDescriptor) -> Self {
        t.to_string()
    }
}

impl TryFrom<String> for TypeDescriptor {
    type Error = ParseError;
    fn try_from(src: String) -> Result<Self, Self::Error> {
        src.parse()
    }
}

// ------------------------------- Tests ------------------------------------ //
