//! Decoded values: the native tree the decoder builds bottom-up.
use std::any::{Any, type_name};
use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::descriptor::Literal;
use crate::error::MapperError;

// ------------------------------- Keys ------------------------------------- //

/// Key of a decoded array. List positions are `Int`; object keys that are
/// canonical decimal integers (`"0"`, `"-7"`, not `"007"`) are `Int` too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArrayKey {
    Int(i64),
    String(String),
}

impl ArrayKey {
    pub fn from_field(name: &str) -> Self {
        match name.parse::<i64>() {
            Ok(i) if i.to_string() == name => ArrayKey::Int(i),
            _ => ArrayKey::String(name.to_owned()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ArrayKey::Int(i) => Value::from(*i),
            ArrayKey::String(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{i}"),
            ArrayKey::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(i: i64) -> Self { ArrayKey::Int(i) }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self { ArrayKey::from_field(s) }
}

// ------------------------------ Values ------------------------------------ //

#[derive(Debug)]
pub enum Decoded {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(IndexMap<ArrayKey, Decoded>),
    /// Untyped object bag, passed through verbatim.
    Opaque(Map<String, Value>),
    Enum(EnumValue),
    Object(Instance),
}

impl Decoded {
    pub fn from_literal(lit: &Literal) -> Self {
        match lit {
            Literal::Int(i) => Decoded::Int(*i),
            Literal::Float(f) => Decoded::Float(f.0),
            Literal::String(s) => Decoded::String(s.clone()),
            Literal::Bool(b) => Decoded::Bool(*b),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Decoded::Null => "null",
            Decoded::Bool(_) => "bool",
            Decoded::Int(_) => "int",
            Decoded::Float(_) => "float",
            Decoded::String(_) => "string",
            Decoded::Array(_) => "array",
            Decoded::Opaque(_) => "object",
            Decoded::Enum(_) => "enum",
            Decoded::Object(_) => "instance",
        }
    }

    /// JSON view of the decoded tree. Arrays keyed `0..n` render as lists,
    /// enums as their backing value, records as their fields.
    pub fn to_json(&self) -> Value {
        match self {
            Decoded::Null => Value::Null,
            Decoded::Bool(b) => Value::from(*b),
            Decoded::Int(i) => Value::from(*i),
            Decoded::Float(f) => Value::from(*f),
            Decoded::String(s) => Value::from(s.clone()),
            Decoded::Array(items) => {
                let is_list = items
                    .keys()
                    .enumerate()
                    .all(|(i, k)| *k == ArrayKey::Int(i as i64));
                if is_list {
                    Value::Array(items.values().map(Decoded::to_json).collect())
                } else {
                    Value::Object(items.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect())
                }
            }
            Decoded::Opaque(map) => Value::Object(map.clone()),
            Decoded::Enum(e) => e.value.to_json(),
            Decoded::Object(instance) => instance.to_json(),
        }
    }
}

/// A decoded enum case.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub class: String,
    pub case: String,
    pub value: Literal,
}

// ------------------------------ Instances --------------------------------- //

/// A constructed object, type-erased. The class name is the concrete class
/// the registry constructed.
pub struct Instance {
    class: String,
    value: Box<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(class: impl Into<String>, value: T) -> Self {
        Self { class: class.into(), value: Box::new(value) }
    }

    pub(crate) fn from_boxed(class: impl Into<String>, value: Box<dyn Any + Send + Sync>) -> Self {
        Self { class: class.into(), value }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the value out; gives the instance back when `T` is wrong.
    pub fn downcast<T: Any>(self) -> Result<T, Instance> {
        let Instance { class, value } = self;
        match value.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(value) => Err(Instance { class, value }),
        }
    }

    pub fn to_json(&self) -> Value {
        match self.downcast_ref::<Record>() {
            Some(record) => record.to_json(),
            None => serde_json::json!({ "$class": self.class }),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.downcast_ref::<Record>() {
            Some(record) => record.fmt(f),
            None => f.debug_struct("Instance").field("class", &self.class).finish_non_exhaustive(),
        }
    }
}

/// Object of a class that has no Rust type behind it (schema-document classes).
#[derive(Debug)]
pub struct Record {
    pub class: String,
    pub fields: IndexMap<String, Decoded>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Decoded> {
        self.fields.get(field)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
    }
}

// ----------------------------- Arguments ---------------------------------- //

/// Decoded constructor arguments, in declared parameter order.
#[derive(Debug)]
pub struct Arguments {
    class: String,
    values: IndexMap<String, Decoded>,
}

impl Arguments {
    pub fn new(class: impl Into<String>) -> Self {
        Self { class: class.into(), values: IndexMap::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Decoded) {
        self.values.insert(name.into(), value);
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Remove the argument `name` and convert it.
    pub fn take<T: FromDecoded>(&mut self, name: &str) -> Result<T, MapperError> {
        let value = self.values.shift_remove(name).ok_or_else(|| MapperError::MissingArgument {
            class: self.class.clone(),
            parameter: name.to_owned(),
        })?;
        T::from_decoded(value).map_err(|got| MapperError::ArgumentType {
            class: self.class.clone(),
            parameter: name.to_owned(),
            expected: type_name::<T>(),
            found: got.kind(),
        })
    }

    pub fn into_record(self) -> Record {
        Record { class: self.class, fields: self.values }
    }
}

// ----------------------------- Extraction --------------------------------- //

/// Conversion out of the decoded tree; hands the value back on mismatch.
pub trait FromDecoded: Sized {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded>;
}

/// Implement [`FromDecoded`] for types registered as class constructors, by
/// downcasting the constructed [`Instance`].
#[macro_export]
macro_rules! impl_from_decoded {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::value::FromDecoded for $ty {
                fn from_decoded(value: $crate::value::Decoded) -> ::std::result::Result<Self, $crate::value::Decoded> {
                    match value {
                        $crate::value::Decoded::Object(instance) => {
                            instance.downcast::<$ty>().map_err($crate::value::Decoded::Object)
                        }
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

impl FromDecoded for Decoded {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> { Ok(value) }
}

impl FromDecoded for bool {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> {
        match value {
            Decoded::Bool(b) => Ok(b),
            other => Err(other),
        }
    }
}

impl FromDecoded for i64 {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> {
        match value {
            Decoded::Int(i) => Ok(i),
            other => Err(other),
        }
    }
}

impl FromDecoded for f64 {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> {
        match value {
            Decoded::Float(f) => Ok(f),
            Decoded::Int(i) => Ok(i as f64),
            other => Err(other),
        }
    }
}

impl FromDecoded for String {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> {
        match value {
            Decoded::String(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl FromDecoded for EnumValue {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> {
        match value {
            Decoded::Enum(e) => Ok(e),
            other => Err(other),
        }
    }
}

impl FromDecoded for Instance {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> {
        match value {
            Decoded::Object(instance) => Ok(instance),
            other => Err(other),
        }
    }
}

impl FromDecoded for Map<String, Value> {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> {
        match value {
            Decoded::Opaque(map) => Ok(map),
            other => Err(other),
        }
    }
}

impl<T: FromDecoded> FromDecoded for Option<T> {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> {
        match value {
            Decoded::Null => Ok(None),
            other => T::from_decoded(other).map(Some),
        }
    }
}

impl<T: FromDecoded> FromDecoded for Vec<T> {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> {
        match value {
            Decoded::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                let mut rest = items.into_iter();
                while let Some((key, item)) = rest.next() {
                    match T::from_decoded(item) {
                        Ok(v) => out.push(v),
                        Err(bad) => {
                            // rebuild what we can so the caller sees the array kind
                            let mut back = IndexMap::new();
                            back.insert(key, bad);
                            back.extend(rest);
                            return Err(Decoded::Array(back));
                        }
                    }
                }
                Ok(out)
            }
            other => Err(other),
        }
    }
}

impl<T: FromDecoded> FromDecoded for IndexMap<ArrayKey, T> {
    fn from_decoded(value: Decoded) -> Result<Self, Decoded> {
        match value {
            Decoded::Array(items) => {
                let mut out = IndexMap::with_capacity(items.len());
                let mut rest = items.into_iter();
                while let Some((key, item)) = rest.next() {
                    match T::from_decoded(item) {
                        Ok(v) => {
                            out.insert(key, v);
                        }
                        Err(bad) => {
                            let mut back = IndexMap::new();
                            back.insert(key, bad);
                            back.extend(rest);
                            return Err(Decoded::Array(back));
                        }
                    }
                }
                Ok(out)
            }
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_keys_canonicalise_integers() {
        assert_eq!(ArrayKey::from_field("0"), ArrayKey::Int(0));
        assert_eq!(ArrayKey::from_field("-7"), ArrayKey::Int(-7));
        assert_eq!(ArrayKey::from_field("007"), ArrayKey::String("007".into()));
        assert_eq!(ArrayKey::from_field("1.5"), ArrayKey::String("1.5".into()));
        assert_eq!(ArrayKey::from_field("foo"), ArrayKey::String("foo".into()));
    }

    #[test]
    fn arguments_take_by_name() {
        let mut args = Arguments::new("Pair");
        args.push("a", Decoded::String("x".into()));
        args.push("b", Decoded::Int(1));
        args.push("c", Decoded::Null);

        let b: f64 = args.take("b").unwrap();
        assert_eq!(b, 1.0);
        let c: Option<String> = args.take("c").unwrap();
        assert_eq!(c, None);
        let err = args.take::<i64>("a").unwrap_err();
        assert!(matches!(err, MapperError::ArgumentType { ref parameter, found: "string", .. } if parameter == "a"));
        let err = args.take::<i64>("zzz").unwrap_err();
        assert!(matches!(err, MapperError::MissingArgument { .. }));
    }

    #[test]
    fn lists_render_as_json_arrays() {
        let mut items = IndexMap::new();
        items.insert(ArrayKey::Int(0), Decoded::String("a".into()));
        items.insert(ArrayKey::Int(1), Decoded::Float(1.5));
        assert_eq!(Decoded::Array(items).to_json(), serde_json::json!(["a", 1.5]));

        let mut keyed = IndexMap::new();
        keyed.insert(ArrayKey::String("foo".into()), Decoded::String("bar".into()));
        keyed.insert(ArrayKey::Int(2), Decoded::String("baz".into()));
        assert_eq!(Decoded::Array(keyed).to_json(), serde_json::json!({"foo": "bar", "2": "baz"}));
    }

    #[test]
    fn vec_extraction_is_ordered() {
        let mut items = IndexMap::new();
        items.insert(ArrayKey::String("x".into()), Decoded::Int(2));
        items.insert(ArrayKey::Int(0), Decoded::Int(1));
        let v = Vec::<i64>::from_decoded(Decoded::Array(items)).unwrap();
        assert_eq!(v, vec![2, 1]);
    }

    #[test]
    fn instances_downcast() {
        let instance = Instance::new("Pair", (String::from("x"), 1_i64));
        assert_eq!(instance.class(), "Pair");
        let back = instance.downcast::<String>().unwrap_err();
        assert_eq!(back.downcast::<(String, i64)>().unwrap(), ("x".to_string(), 1));
    }
}
