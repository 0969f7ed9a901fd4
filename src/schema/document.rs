//! JSON schema documents: classes and enums declared as data.
//!
//! ```json
//! {
//!   "classes": [{"name": "Pair", "parameters": [{"name": "a", "type": "string"}]}],
//!   "enums": [{"name": "Suit", "backing": "string", "cases": {"Hearts": "H"}}]
//! }
//! ```
//!
//! Every declared class constructs a [`Record`](crate::value::Record).
use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::registry::{ClassSchema, EnumSchema, Registry};
use super::ParameterDescriptor;
use crate::descriptor::{Literal, ScalarKind, TypeDescriptor};
use crate::path_de::{self, PathError};

static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\\]*$").expect("valid name regex"));

/// Valid identifier that type expressions read back as a plain class name,
/// so keywords like `int` or `never` cannot be declared.
fn is_declarable(name: &str) -> bool {
    NAME.is_match(name)
        && matches!(
            name.parse::<TypeDescriptor>(),
            Ok(TypeDescriptor::Class { name: ref parsed, ref args }) if parsed == name && args.is_empty()
        )
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot read schema document {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] PathError),

    #[error("invalid name `{0}`")]
    InvalidName(String),

    #[error("`{0}` is declared more than once")]
    Duplicate(String),

    #[error("class {class} extends unknown class {parent}")]
    UnknownParent { class: String, parent: String },

    #[error("{owner} refers to unknown class {name}")]
    UnknownClass { owner: String, name: String },

    #[error("enum {name} cannot be backed by {backing}")]
    UnsupportedBacking { name: String, backing: &'static str },

    #[error("enum {name} case {case} is not a {backing} value: {value}")]
    BackingMismatch {
        name: String,
        case: String,
        backing: &'static str,
        value: Literal,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
    #[serde(default)]
    pub enums: Vec<EnumDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub templates: Vec<TemplateDecl>,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateDecl {
    pub name: String,
    #[serde(default = "mixed")]
    pub bound: TypeDescriptor,
}

fn mixed() -> TypeDescriptor {
    TypeDescriptor::Mixed
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDecl {
    pub name: String,
    pub backing: ScalarKind,
    pub cases: IndexMap<String, Literal>,
}

impl SchemaDocument {
    pub fn from_json(src: &str) -> Result<Self, DocumentError> {
        Ok(path_de::from_str_with_path(src)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path_de::from_slice_with_path(&bytes)?)
    }

    /// Validate the document and build a registry from it.
    pub fn into_registry(self) -> Result<Registry, DocumentError> {
        let mut seen = HashSet::new();
        for name in self.classes.iter().map(|c| &c.name).chain(self.enums.iter().map(|e| &e.name)) {
            if !is_declarable(name) {
                return Err(DocumentError::InvalidName(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(DocumentError::Duplicate(name.clone()));
            }
        }
        let enum_names: HashSet<&str> = self.enums.iter().map(|e| e.name.as_str()).collect();
        let class_names: HashSet<&str> = self.classes.iter().map(|c| c.name.as_str()).collect();
        let is_enum = |name: &str| enum_names.contains(name);

        let mut registry = Registry::new();
        for decl in &self.enums {
            registry.register_enum(enum_schema(decl)?);
        }

        for decl in &self.classes {
            if let Some(parent) = decl.extends.as_ref().filter(|p| !class_names.contains(p.as_str())) {
                return Err(DocumentError::UnknownParent { class: decl.name.clone(), parent: parent.clone() });
            }
            let templates: Vec<String> = decl.templates.iter().map(|t| t.name.clone()).collect();
            for t in &decl.templates {
                if !is_declarable(&t.name) {
                    return Err(DocumentError::InvalidName(t.name.clone()));
                }
            }

            let mut schema = ClassSchema::new(&decl.name);
            if let Some(parent) = &decl.extends {
                schema = schema.extends(parent);
            }
            for t in &decl.templates {
                let bound = t.bound.resolve_names(&[], &is_enum);
                check_classes(&decl.name, &bound, &class_names)?;
                schema = schema.template(&t.name, bound);
            }
            for p in &decl.parameters {
                let ty = p.ty.resolve_names(&templates, &is_enum);
                check_classes(&format!("{}::${}", decl.name, p.name), &ty, &class_names)?;
                schema = schema.parameter(ParameterDescriptor { ty, ..p.clone() });
            }
            registry.register_class(schema.record());
        }

        debug!(classes = self.classes.len(), enums = self.enums.len(), "loaded schema document");
        Ok(registry)
    }
}

impl Registry {
    pub fn from_document(document: SchemaDocument) -> Result<Self, DocumentError> {
        document.into_registry()
    }
}

fn enum_schema(decl: &EnumDecl) -> Result<EnumSchema, DocumentError> {
    if !matches!(decl.backing, ScalarKind::Int | ScalarKind::String) {
        return Err(DocumentError::UnsupportedBacking { name: decl.name.clone(), backing: decl.backing.as_str() });
    }
    let mut schema = EnumSchema::new(&decl.name, decl.backing);
    for (case, value) in &decl.cases {
        if value.kind() != decl.backing {
            return Err(DocumentError::BackingMismatch {
                name: decl.name.clone(),
                case: case.clone(),
                backing: decl.backing.as_str(),
                value: value.clone(),
            });
        }
        schema = schema.case(case, value.clone());
    }
    Ok(schema)
}

/// Every class named by `ty` must be declared in the document.
fn check_classes(owner: &str, ty: &TypeDescriptor, classes: &HashSet<&str>) -> Result<(), DocumentError> {
    let unknown = |name: &str| DocumentError::UnknownClass { owner: owner.to_owned(), name: name.to_owned() };
    match ty {
        TypeDescriptor::Class { name, args } => {
            if !classes.contains(name.as_str()) {
                return Err(unknown(name));
            }
            args.iter().try_for_each(|a| check_classes(owner, a, classes))
        }
        TypeDescriptor::ClassString { bound: Some(name) } if !classes.contains(name.as_str()) => Err(unknown(name)),
        TypeDescriptor::ArrayOf { key, value } => {
            check_classes(owner, key, classes)?;
            check_classes(owner, value, classes)
        }
        TypeDescriptor::ArrayShape(xs) | TypeDescriptor::Union(xs) => {
            xs.iter().try_for_each(|x| check_classes(owner, x, classes))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ClassHierarchy;
    use crate::schema::SchemaProvider;

    const DOC: &str = r#"{
        "classes": [
            {"name": "Animal", "parameters": [{"name": "name", "type": "string"}]},
            {"name": "Cat", "extends": "Animal", "parameters": [{"name": "name", "type": "string"}]},
            {"name": "Pair", "parameters": [
                {"name": "a", "type": "string"},
                {"name": "b", "type": "int", "default": 1},
                {"name": "suit", "type": "?Suit"}
            ]},
            {"name": "Box", "templates": [{"name": "T", "bound": "Animal"}], "parameters": [
                {"name": "items", "type": "list<T>"}
            ]}
        ],
        "enums": [{"name": "Suit", "backing": "string", "cases": {"Hearts": "H", "Spades": "S"}}]
    }"#;

    #[test]
    fn loads_classes_and_enums() {
        let registry = SchemaDocument::from_json(DOC).unwrap().into_registry().unwrap();
        assert!(registry.is_subclass_of("Cat", "Animal"));

        let params = registry.parameters("Pair", &TypeDescriptor::class("Pair")).unwrap();
        assert_eq!(params[1].default, Some(Literal::Int(1)));
        assert_eq!(params[2].ty, TypeDescriptor::nullable(TypeDescriptor::enumeration("Suit")));

        let suit = registry.enum_schema("Suit").unwrap();
        assert_eq!(suit.cases().len(), 2);
    }

    #[test]
    fn templates_become_type_params() {
        let registry = Registry::from_document(SchemaDocument::from_json(DOC).unwrap()).unwrap();
        let params = registry.parameters("Box", &TypeDescriptor::class("Box")).unwrap();
        assert_eq!(params[0].ty.to_string(), "array<int, Animal>");
        let params = registry
            .parameters("Box", &TypeDescriptor::generic("Box", vec![TypeDescriptor::class("Cat")]))
            .unwrap();
        assert_eq!(params[0].ty.to_string(), "array<int, Cat>");
    }

    #[test]
    fn parse_errors_carry_the_path() {
        let err = SchemaDocument::from_json(r#"{"classes": [{"name": "A", "parameters": [{"name": "x", "type": "array<"}]}]}"#)
            .unwrap_err();
        match err {
            DocumentError::Parse(e) => assert_eq!(e.path, "classes[0].parameters[0].type"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_documents() {
        let cases = [
            (r#"{"classes": [{"name": "1Pair"}]}"#, "invalid name"),
            (r#"{"classes": [{"name": "never"}]}"#, "invalid name `never`"),
            (r#"{"enums": [{"name": "int", "backing": "int", "cases": {}}]}"#, "invalid name `int`"),
            (r#"{"classes": [{"name": "A", "templates": [{"name": "string"}]}]}"#, "invalid name `string`"),
            (r#"{"classes": [{"name": "A"}, {"name": "A"}]}"#, "more than once"),
            (r#"{"classes": [{"name": "A", "extends": "B"}]}"#, "extends unknown"),
            (r#"{"classes": [{"name": "A", "parameters": [{"name": "x", "type": "B[]"}]}]}"#, "unknown class B"),
            (r#"{"enums": [{"name": "E", "backing": "bool", "cases": {}}]}"#, "cannot be backed"),
            (r#"{"enums": [{"name": "E", "backing": "int", "cases": {"A": "a"}}]}"#, "not a int value"),
        ];
        for (doc, needle) in cases {
            let err = SchemaDocument::from_json(doc).unwrap().into_registry().unwrap_err();
            assert!(err.to_string().contains(needle), "{doc}: {err}");
        }
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, DOC).unwrap();
        let doc = SchemaDocument::load(&path).unwrap();
        assert_eq!(doc.classes.len(), 4);

        let err = SchemaDocument::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, DocumentError::Io { .. }));
    }
}
