//! Field catalog for linkdb.
//!
//! The catalog stores field definitions, table display names, and the
//! dependency edges used to find fields affected by a change.

#[allow(clippy::module_inception)]
mod catalog;
mod field;
pub mod ident;

pub use catalog::{FieldCatalog, SqlCatalog, COLUMNS_TABLE, REFERENCES_TABLE, TABLES_TABLE};
pub use field::{
    DependentKind, FieldDef, FieldRef, FieldType, LinkField, LinkProperty, ReferenceEdge,
    TITLE_SUFFIX,
};
