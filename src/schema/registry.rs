//! Reflection backend: a registry of class and enum schemas populated at startup.
//!
//! Classes are registered with their constructor parameters and a constructor
//! closure; schema documents register classes that construct `Record`s.
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{ParameterDescriptor, SchemaProvider};
use crate::descriptor::{ClassHierarchy, Literal, ScalarKind, TypeDescriptor};
use crate::error::{ConstructorIssue, MapperError, Result};
use crate::value::{Arguments, Instance};

pub type Constructor = Arc<dyn Fn(Arguments) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

#[derive(Clone, Default)]
enum ConstructorSlot {
    #[default]
    Missing,
    NotPublic,
    Public(Constructor),
    Overloaded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParam {
    pub name: String,
    pub bound: TypeDescriptor,
}

#[derive(Clone)]
pub struct ClassSchema {
    name: String,
    parent: Option<String>,
    templates: Vec<TemplateParam>,
    params: Vec<ParameterDescriptor>,
    constructor: ConstructorSlot,
}

impl ClassSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            templates: Vec::new(),
            params: Vec::new(),
            constructor: ConstructorSlot::Missing,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn templates(&self) -> &[TemplateParam] {
        &self.templates
    }

    /// Declared parameters, before generic substitution.
    pub fn declared_parameters(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare a template parameter; unbound uses resolve to `bound`.
    pub fn template(mut self, name: impl Into<String>, bound: TypeDescriptor) -> Self {
        self.templates.push(TemplateParam { name: name.into(), bound });
        self
    }

    pub fn param(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.parameter(ParameterDescriptor::new(name, ty))
    }

    pub fn param_with_default(self, name: impl Into<String>, ty: TypeDescriptor, default: impl Into<Literal>) -> Self {
        self.parameter(ParameterDescriptor::new(name, ty).with_default(default))
    }

    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.params.push(parameter);
        self
    }

    /// Register the public constructor. Registering a second one makes the
    /// class unusable (overloaded constructor).
    pub fn constructor<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arguments) -> Result<T> + Send + Sync + 'static,
    {
        let ctor: Constructor = Arc::new(move |args| f(args).map(|v| Box::new(v) as Box<dyn Any + Send + Sync>));
        self.constructor = match self.constructor {
            ConstructorSlot::Missing | ConstructorSlot::NotPublic => ConstructorSlot::Public(ctor),
            ConstructorSlot::Public(_) | ConstructorSlot::Overloaded => ConstructorSlot::Overloaded,
        };
        self
    }

    pub fn private_constructor(mut self) -> Self {
        if matches!(self.constructor, ConstructorSlot::Missing) {
            self.constructor = ConstructorSlot::NotPublic;
        }
        self
    }

    /// Construct a dynamic `Record` holding the decoded arguments.
    pub fn record(self) -> Self {
        self.constructor(|args: Arguments| Ok(args.into_record()))
    }

    fn usable_constructor(&self) -> Result<&Constructor> {
        let issue = match &self.constructor {
            ConstructorSlot::Public(ctor) => return Ok(ctor),
            ConstructorSlot::Missing => ConstructorIssue::Missing,
            ConstructorSlot::NotPublic => ConstructorIssue::NotPublic,
            ConstructorSlot::Overloaded => ConstructorIssue::Overloaded,
        };
        Err(MapperError::NoUsableConstructor { class: self.name.clone(), issue })
    }
}

impl fmt::Debug for ClassSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let constructor = match self.constructor {
            ConstructorSlot::Missing => "missing",
            ConstructorSlot::NotPublic => "not public",
            ConstructorSlot::Public(_) => "public",
            ConstructorSlot::Overloaded => "overloaded",
        };
        f.debug_struct("ClassSchema")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("templates", &self.templates)
            .field("params", &self.params)
            .field("constructor", &constructor)
            .finish()
    }
}

// -------------------------------- Enums ----------------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub struct EnumCase {
    pub name: String,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    name: String,
    backing: ScalarKind,
    cases: Vec<EnumCase>,
}

impl EnumSchema {
    pub fn new(name: impl Into<String>, backing: ScalarKind) -> Self {
        Self { name: name.into(), backing, cases: Vec::new() }
    }

    pub fn case(mut self, name: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.cases.push(EnumCase { name: name.into(), value: value.into() });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backing(&self) -> ScalarKind {
        self.backing
    }

    pub fn cases(&self) -> &[EnumCase] {
        &self.cases
    }

    /// The case backed by exactly `value`. Only string and int backing values
    /// take part; there is no cross-kind coercion.
    pub fn case_for(&self, value: &Literal) -> Option<&EnumCase> {
        match value {
            Literal::Int(_) | Literal::String(_) => self.cases.iter().find(|c| c.value == *value),
            Literal::Float(_) | Literal::Bool(_) => None,
        }
    }
}

// ------------------------------ Registry ---------------------------------- //

#[derive(Debug, Default)]
pub struct Registry {
    classes: HashMap<String, ClassSchema>,
    enums: HashMap<String, EnumSchema>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_class(&mut self, schema: ClassSchema) -> &mut Self {
        debug!(class = %schema.name, "registering class");
        self.classes.insert(schema.name.clone(), schema);
        self
    }

    pub fn register_enum(&mut self, schema: EnumSchema) -> &mut Self {
        debug!(enum_ = %schema.name, "registering enum");
        self.enums.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_class(mut self, schema: ClassSchema) -> Self {
        self.register_class(schema);
        self
    }

    pub fn with_enum(mut self, schema: EnumSchema) -> Self {
        self.register_enum(schema);
        self
    }

    pub fn class(&self, name: &str) -> Result<&ClassSchema> {
        self.classes.get(name).ok_or_else(|| MapperError::ClassNotFound(name.to_owned()))
    }

    pub fn enum_schema(&self, name: &str) -> Result<&EnumSchema> {
        self.enums.get(name).ok_or_else(|| MapperError::ClassNotFound(name.to_owned()))
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    /// Invoke the constructor of `class` with already decoded arguments.
    pub fn construct(&self, class: &str, arguments: Arguments) -> Result<Instance> {
        let schema = self.class(class)?;
        let ctor = schema.usable_constructor()?;
        let value = ctor(arguments)?;
        Ok(Instance::from_boxed(class, value))
    }
}

impl ClassHierarchy for Registry {
    fn class_exists(&self, class: &str) -> bool {
        self.classes.contains_key(class) || self.enums.contains_key(class)
    }

    fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        let mut current = Some(class);
        // a bounded walk: a malformed `extends` cycle must not hang the decoder
        for _ in 0..=self.classes.len() {
            match current {
                Some(name) if name == ancestor => return true,
                Some(name) => current = self.classes.get(name).and_then(|c| c.parent()),
                None => return false,
            }
        }
        false
    }
}

impl SchemaProvider for Registry {
    fn parameters(&self, class: &str, expected: &TypeDescriptor) -> Result<Arc<[ParameterDescriptor]>> {
        let schema = self.class(class)?;
        schema.usable_constructor()?;

        let args: &[TypeDescriptor] = match expected {
            TypeDescriptor::Class { args, .. } => args,
            _ => &[],
        };
        let bindings: HashMap<String, TypeDescriptor> = schema
            .templates
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), args.get(i).cloned().unwrap_or_else(|| t.bound.clone())))
            .collect();

        Ok(schema
            .params
            .iter()
            .map(|p| ParameterDescriptor { ty: p.ty.substitute(&bindings), ..p.clone() })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new()
            .with_class(ClassSchema::new("Animal").param("name", TypeDescriptor::string()).record())
            .with_class(ClassSchema::new("Cat").extends("Animal").param("name", TypeDescriptor::string()).record())
            .with_class(
                ClassSchema::new("Box")
                    .template("T", TypeDescriptor::class("Animal"))
                    .template("U", TypeDescriptor::Mixed)
                    .param("first", TypeDescriptor::TypeParam("T".into()))
                    .param("rest", TypeDescriptor::list_of(TypeDescriptor::TypeParam("U".into())))
                    .record(),
            )
            .with_class(ClassSchema::new("Hidden").param("x", TypeDescriptor::int()).private_constructor())
            .with_class(ClassSchema::new("Abstract"))
            .with_class(ClassSchema::new("Twice").record().record())
            .with_enum(EnumSchema::new("Suit", ScalarKind::String).case("Hearts", "H").case("Spades", "S"))
    }

    #[test]
    fn unknown_classes_are_not_found() {
        let err = registry().parameters("Dog", &TypeDescriptor::class("Dog")).unwrap_err();
        assert!(matches!(err, MapperError::ClassNotFound(ref c) if c == "Dog"));
    }

    #[test]
    fn unusable_constructors_are_reported() {
        let r = registry();
        for (class, expected) in [
            ("Hidden", ConstructorIssue::NotPublic),
            ("Abstract", ConstructorIssue::Missing),
            ("Twice", ConstructorIssue::Overloaded),
        ] {
            match r.parameters(class, &TypeDescriptor::class(class)) {
                Err(MapperError::NoUsableConstructor { issue, .. }) => assert_eq!(issue, expected, "{class}"),
                other => panic!("{class}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn generic_arguments_are_substituted() {
        let r = registry();
        let params = r
            .parameters("Box", &TypeDescriptor::generic("Box", vec![TypeDescriptor::class("Cat"), TypeDescriptor::int()]))
            .unwrap();
        assert_eq!(params[0].ty, TypeDescriptor::class("Cat"));
        assert_eq!(params[1].ty, TypeDescriptor::list_of(TypeDescriptor::int()));

        // missing arguments fall back to the template bounds
        let params = r.parameters("Box", &TypeDescriptor::class("Box")).unwrap();
        assert_eq!(params[0].ty, TypeDescriptor::class("Animal"));
        assert_eq!(params[1].ty, TypeDescriptor::list_of(TypeDescriptor::Mixed));
    }

    #[test]
    fn hierarchy_follows_extends() {
        let r = registry();
        assert!(r.is_subclass_of("Cat", "Animal"));
        assert!(r.is_subclass_of("Cat", "Cat"));
        assert!(!r.is_subclass_of("Animal", "Cat"));
        assert!(r.class_exists("Suit"));
        assert!(!r.class_exists("Dog"));
    }

    #[test]
    fn extends_cycles_terminate() {
        let r = Registry::new()
            .with_class(ClassSchema::new("A").extends("B"))
            .with_class(ClassSchema::new("B").extends("A"));
        assert!(!r.is_subclass_of("A", "C"));
    }

    #[test]
    fn enum_cases_match_exact_backing_values() {
        let r = registry();
        let suit = r.enum_schema("Suit").unwrap();
        assert_eq!(suit.case_for(&Literal::from("H")).map(|c| c.name.as_str()), Some("Hearts"));
        assert!(suit.case_for(&Literal::from("h")).is_none());
        assert!(suit.case_for(&Literal::from(1)).is_none());
    }

    #[test]
    fn construct_runs_the_registered_closure() {
        let r = Registry::new().with_class(
            ClassSchema::new("Point")
                .param("x", TypeDescriptor::int())
                .constructor(|mut args: Arguments| Ok((args.take::<i64>("x")?, 0_i64))),
        );
        let mut args = Arguments::new("Point");
        args.push("x", crate::value::Decoded::Int(4));
        let instance = r.construct("Point", args).unwrap();
        assert_eq!(instance.class(), "Point");
        assert_eq!(instance.downcast::<(i64, i64)>().unwrap(), (4, 0));
    }
}
