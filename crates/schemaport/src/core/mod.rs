//! Core abstractions: descriptors, the run catalog and collaborator traits.

pub mod catalog;
pub mod identifier;
pub mod schema;
pub mod traits;

pub use catalog::Catalog;
pub use schema::{
    ColumnDescriptor, DefaultValue, ForeignKeyRef, GenericType, IndexDescriptor, ReflectedColumn,
    ReflectedTable, TableDescriptor,
};
pub use traits::{Creation, SchemaReader, TargetExecutor};
