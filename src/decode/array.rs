use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use super::{Decoder, Decoding};
use crate::descriptor::accepts::key_accepts;
use crate::descriptor::{Literal, TypeDescriptor};
use crate::error::{MapperError, Result};
use crate::value::{ArrayKey, Decoded};

/// One entry of a list or an object: the canonical key, the key as written
/// in the source, and the element.
struct Entry<'v> {
    key: ArrayKey,
    source_key: Value,
    item: &'v Value,
}

/// Entries of a list (synthetic positions) or an object (canonical keys), in
/// source order.
fn entries(raw: &Value) -> Option<Vec<Entry<'_>>> {
    match raw {
        Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| Entry { key: ArrayKey::Int(i as i64), source_key: Value::from(i), item })
                .collect(),
        ),
        Value::Object(map) => Some(
            map.iter()
                .map(|(k, item)| Entry { key: ArrayKey::from_field(k), source_key: Value::from(k.as_str()), item })
                .collect(),
        ),
        _ => None,
    }
}

fn key_literal(key: &ArrayKey) -> TypeDescriptor {
    match key {
        ArrayKey::Int(i) => TypeDescriptor::Literal(Literal::Int(*i)),
        ArrayKey::String(s) => TypeDescriptor::Literal(Literal::String(s.clone())),
    }
}

impl Decoder<'_> {
    /// `array<K, V>`: every key accepted by `K`, every element by `V`.
    pub(super) fn array(&self, raw: &Value, key: &TypeDescriptor, value: &TypeDescriptor) -> Result<Decoding> {
        let entries = entries(raw).ok_or_else(|| MapperError::InvalidValue(raw.clone()))?;
        let mut items = IndexMap::with_capacity(entries.len());
        let mut key_types = IndexSet::new();
        let mut value_types = IndexSet::new();

        for Entry { key: k, source_key, item } in entries {
            let key_inferred = key_literal(&k);
            if !key_accepts(key, &key_inferred, self.registry) {
                return Err(MapperError::ArrayRejected { expected: key.clone(), value: source_key });
            }
            let element = self.element(item, value)?;
            key_types.insert(key_inferred);
            value_types.insert(element.inferred);
            items.insert(k, element.value);
        }

        Ok(Decoding {
            value: Decoded::Array(items),
            inferred: TypeDescriptor::array_of(TypeDescriptor::union(key_types), TypeDescriptor::union(value_types)),
        })
    }

    /// `array{A, B, ..}`: position `i` must carry key `i` and an element accepted by `E[i]`.
    pub(super) fn shape(&self, raw: &Value, elements: &[TypeDescriptor], expected: &TypeDescriptor) -> Result<Decoding> {
        let entries = entries(raw).ok_or_else(|| MapperError::InvalidValue(raw.clone()))?;
        let mut items = IndexMap::with_capacity(entries.len());
        let mut inferred = Vec::with_capacity(entries.len());

        for (i, Entry { key: k, source_key, item }) in entries.into_iter().enumerate() {
            let Some(element_type) = elements.get(i) else {
                return Err(MapperError::ArrayRejected { expected: expected.clone(), value: item.clone() });
            };
            let position = TypeDescriptor::Literal(Literal::Int(i as i64));
            if !key_accepts(&position, &key_literal(&k), self.registry) {
                return Err(MapperError::ArrayRejected { expected: position, value: source_key });
            }
            let element = self.element(item, element_type)?;
            inferred.push(element.inferred);
            items.insert(k, element.value);
        }

        Ok(Decoding { value: Decoded::Array(items), inferred: TypeDescriptor::ArrayShape(inferred) })
    }

    fn element(&self, item: &Value, expected: &TypeDescriptor) -> Result<Decoding> {
        let decoding = self.decode(item, expected)?;
        if !expected.accepts(&decoding.inferred, self.registry) {
            return Err(MapperError::ArrayRejected { expected: expected.clone(), value: item.clone() });
        }
        Ok(self.coerce(decoding, expected))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mapper::MapperConfig;
    use crate::schema::Registry;

    fn decode(raw: Value, expected: &str) -> Result<Decoding> {
        let registry = Registry::new();
        let config = MapperConfig::default();
        Decoder::new(&registry, &registry, &config).decode(&raw, &expected.parse().unwrap())
    }

    #[test]
    fn lists_and_integer_keyed_objects_decode_alike() {
        for raw in [json!(["a", "b"]), json!({"0": "a", "1": "b"})] {
            let d = decode(raw, "array<string, string>").unwrap();
            assert_eq!(d.value.to_json(), json!(["a", "b"]));
            assert_eq!(d.inferred.to_string(), "array<0|1, 'a'|'b'>");
        }
    }

    #[test]
    fn source_order_is_kept() {
        let d = decode(json!({"z": 1, "a": 2, "5": 3}), "array<int>").unwrap();
        let Decoded::Array(items) = d.value else { panic!("not an array") };
        let keys: Vec<_> = items.keys().cloned().collect();
        assert_eq!(keys, vec![ArrayKey::from("z"), ArrayKey::from("a"), ArrayKey::Int(5)]);
    }

    #[test]
    fn rejected_keys_and_elements_are_reported() {
        let err = decode(json!({"foo": 1}), "array<int, int>").unwrap_err();
        assert_eq!(err.to_string(), r#"Array of type int does not accept "foo""#);

        let err = decode(json!({"5": 1}), "array<'a'|'b', int>").unwrap_err();
        assert_eq!(err.to_string(), r#"Array of type 'a'|'b' does not accept "5""#);
        let err = decode(json!([1]), "array<'a', int>").unwrap_err();
        assert_eq!(err.to_string(), "Array of type 'a' does not accept 0");

        let err = decode(json!([1, "x"]), "int[]").unwrap_err();
        assert_eq!(err.to_string(), r#"Array of type int does not accept "x""#);
    }

    #[test]
    fn elements_are_coerced() {
        let d = decode(json!([1, 2.5]), "float[]").unwrap();
        assert_eq!(d.value.to_json(), json!([1.0, 2.5]));
        let d = decode(json!([1.0]), "list<int>").unwrap();
        assert_eq!(d.value.to_json(), json!([1]));
        assert!(decode(json!([1.5]), "list<int>").is_err());
    }

    #[test]
    fn empty_arrays_infer_never() {
        let d = decode(json!([]), "array<string>").unwrap();
        assert_eq!(d.inferred.to_string(), "array<never, never>");
    }

    #[test]
    fn shapes_check_positions() {
        let d = decode(json!(["a", 1]), "array{string, int}").unwrap();
        assert_eq!(d.inferred.to_string(), "array{'a', 1}");

        let err = decode(json!(["a", 1, true]), "array{string, int}").unwrap_err();
        assert_eq!(err.to_string(), "Array of type array{string, int} does not accept true");

        let err = decode(json!({"1": "a"}), "array{string}").unwrap_err();
        assert!(matches!(err, MapperError::ArrayRejected { expected: TypeDescriptor::Literal(Literal::Int(0)), .. }));
        assert_eq!(err.to_string(), r#"Array of type 0 does not accept "1""#);
    }

    #[test]
    fn nested_arrays_keep_their_own_errors() {
        let err = decode(json!([[1], ["x"]]), "int[][]").unwrap_err();
        assert_eq!(err.to_string(), r#"Array of type int does not accept "x""#);
    }
}
