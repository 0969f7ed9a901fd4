use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::descriptor::TypeDescriptor;

pub type Result<T, E = MapperError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON document is not an object: {0}")]
    NotAnObject(String),

    #[error("JSON value {0} does not match any expected type")]
    InvalidValue(Value),

    #[error("Class {class} constructor parameter ${parameter} of type {expected} does not accept {value}")]
    ParameterRejected {
        class: String,
        parameter: String,
        expected: TypeDescriptor,
        value: Value,
    },

    #[error("Array of type {expected} does not accept {value}")]
    ArrayRejected { expected: TypeDescriptor, value: Value },

    #[error("Enum of type {expected} does not accept {value}")]
    EnumRejected { expected: TypeDescriptor, value: Value },

    #[error("Cannot find class {0}")]
    ClassNotFound(String),

    #[error("Class {class} does not have a usable constructor: {issue}")]
    NoUsableConstructor { class: String, issue: ConstructorIssue },

    #[error("Class {class} constructor argument ${parameter} was not supplied")]
    MissingArgument { class: String, parameter: String },

    #[error("Class {class} constructor argument ${parameter} is {found}, not {expected}")]
    ArgumentType {
        class: String,
        parameter: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Class {class} constructor failed: {message}")]
    Construction { class: String, message: String },

    #[error("Mapped instance of class {class} is not a {expected}")]
    InstanceType { class: String, expected: &'static str },
}

impl MapperError {
    /// Mismatches between a raw value and an expected descriptor. Only these
    /// are discarded while trying union alternatives.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MapperError::InvalidValue(_)
                | MapperError::ParameterRejected { .. }
                | MapperError::ArrayRejected { .. }
                | MapperError::EnumRejected { .. }
        )
    }

    pub fn construction(class: impl Into<String>, message: impl fmt::Display) -> Self {
        MapperError::Construction { class: class.into(), message: message.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorIssue {
    Missing,
    NotPublic,
    Overloaded,
}

impl fmt::Display for ConstructorIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstructorIssue::Missing => "no constructor declared",
            ConstructorIssue::NotPublic => "constructor is not public",
            ConstructorIssue::Overloaded => "constructor has multiple variants",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_name_class_parameter_and_value() {
        let err = MapperError::ParameterRejected {
            class: "Pair".into(),
            parameter: "b".into(),
            expected: TypeDescriptor::int(),
            value: Value::Null,
        };
        assert_eq!(err.to_string(), "Class Pair constructor parameter $b of type int does not accept null");

        let err = MapperError::EnumRejected { expected: TypeDescriptor::enumeration("StringEnum"), value: json!("wtf") };
        assert_eq!(err.to_string(), r#"Enum of type StringEnum does not accept "wtf""#);
    }

    #[test]
    fn only_value_mismatches_are_structural() {
        assert!(MapperError::InvalidValue(json!(1)).is_structural());
        assert!(!MapperError::ClassNotFound("X".into()).is_structural());
        assert!(
            !MapperError::NoUsableConstructor { class: "X".into(), issue: ConstructorIssue::Overloaded }
                .is_structural()
        );
    }
}
