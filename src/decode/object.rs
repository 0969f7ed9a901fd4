use serde_json::{Map, Value};
use tracing::debug;

use super::{Decoder, Decoding};
use crate::descriptor::TypeDescriptor;
use crate::error::{MapperError, Result};
use crate::value::{Arguments, Decoded};

impl Decoder<'_> {
    /// Decode every constructor parameter of `name` from `map`, then construct.
    pub(super) fn object(
        &self,
        map: &Map<String, Value>,
        name: &str,
        args: &[TypeDescriptor],
        expected: &TypeDescriptor,
    ) -> Result<Decoding> {
        let class = self.config.class_mapping.get(name).map(String::as_str).unwrap_or(name);
        let concrete = TypeDescriptor::generic(class, args.to_vec());
        let parameters = self.provider.parameters(class, &concrete)?;

        let mut arguments = Arguments::new(class);
        for parameter in parameters.iter() {
            let field = self.source_field(class, name, &parameter.name);
            let (decoding, shown) = match (map.get(field), &parameter.default) {
                (Some(raw), _) => (self.decode(raw, &parameter.ty)?, raw.clone()),
                (None, Some(default)) => (Decoding::literal(default), default.to_json()),
                (None, None) => (Decoding::null(), Value::Null),
            };
            if !parameter.ty.accepts(&decoding.inferred, self.registry) {
                return Err(MapperError::ParameterRejected {
                    class: class.to_owned(),
                    parameter: parameter.name.clone(),
                    expected: parameter.ty.clone(),
                    value: shown,
                });
            }
            arguments.push(parameter.name.clone(), self.coerce(decoding, &parameter.ty).value);
        }

        debug!(%class, arguments = arguments.len(), "constructing");
        let instance = self.registry.construct(class, arguments)?;
        Ok(Decoding { value: Decoded::Object(instance), inferred: expected.clone() })
    }

    /// Source field for a parameter: the rename table of the concrete class,
    /// then of the declared class, then the parameter name itself.
    fn source_field<'s>(&'s self, class: &str, declared: &str, parameter: &'s str) -> &'s str {
        let renames = &self.config.parameter_name_mapping;
        [class, declared]
            .iter()
            .find_map(|c| renames.get(*c).and_then(|m| m.get(parameter)))
            .map(String::as_str)
            .unwrap_or(parameter)
    }
}
