//! Schema-directed JSON decoding.
//!
//! A [`Mapper`] walks a JSON document together with the constructor schema of a
//! target class (held by a [`Registry`]) and builds the object graph bottom-up:
//! nested arrays, unions and enums are resolved against their declared
//! [`TypeDescriptor`]s before any constructor runs.
pub mod cli;
pub mod decode;
pub mod descriptor;
pub mod error;
pub mod mapper;
pub mod path_de;
pub mod schema;
pub mod value;

pub use decode::Decoding;
pub use descriptor::{Literal, ScalarKind, TypeDescriptor};
pub use error::{MapperError, Result};
pub use mapper::{Mapper, MapperBuilder, MapperConfig};
pub use schema::{ClassSchema, EnumSchema, MemoizingProvider, ParameterDescriptor, Registry, SchemaDocument, SchemaProvider};
pub use value::{Arguments, ArrayKey, Decoded, EnumValue, FromDecoded, Instance, Record};
