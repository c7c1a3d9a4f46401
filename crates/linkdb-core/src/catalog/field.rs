//! Field definitions and dependency records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Suffix of the column caching a link cell's display titles.
pub const TITLE_SUFFIX: &str = "__title";

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Plain text.
    Text,
    /// Numeric value.
    Number,
    /// Many-to-many link to another table.
    Link,
    /// Values looked up through a link field.
    Lookup,
    /// Aggregate over values reached through a link field.
    Rollup,
}

impl FieldType {
    /// Catalog representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Link => "link",
            FieldType::Lookup => "lookup",
            FieldType::Rollup => "rollup",
        }
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(FieldType::Text),
            "number" => Ok(FieldType::Number),
            "link" => Ok(FieldType::Link),
            "lookup" => Ok(FieldType::Lookup),
            "rollup" => Ok(FieldType::Rollup),
            other => Err(Error::InvalidData(format!("unknown field type {other:?}"))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Property of a link field: where its paired field lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkProperty {
    /// Table holding the paired field (the referenced table).
    pub link_table_name: String,
    /// Column of the paired field.
    pub link_column_name: String,
}

/// A catalog field entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Display name.
    pub name: String,
    /// Field type.
    pub field_type: FieldType,
    /// Owning table.
    pub table_name: String,
    /// Storage column on the owning table.
    pub table_column_name: String,
    /// Type-specific properties, stored as JSON.
    pub property: serde_json::Value,
}

impl FieldDef {
    /// Create a field with no properties.
    pub fn new(
        name: impl Into<String>,
        field_type: FieldType,
        table_name: impl Into<String>,
        table_column_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            table_name: table_name.into(),
            table_column_name: table_column_name.into(),
            property: serde_json::Value::Null,
        }
    }

    /// Set the property payload.
    pub fn with_property(mut self, property: serde_json::Value) -> Self {
        self.property = property;
        self
    }

    /// Check if this is a link field.
    pub fn is_link(&self) -> bool {
        self.field_type == FieldType::Link
    }

    /// View this field as a link field.
    pub fn as_link(&self) -> Result<LinkField> {
        if !self.is_link() {
            return Err(Error::NotALinkField {
                table: self.table_name.clone(),
                column: self.table_column_name.clone(),
            });
        }
        Ok(LinkField {
            name: self.name.clone(),
            table_name: self.table_name.clone(),
            table_column_name: self.table_column_name.clone(),
            property: serde_json::from_value(self.property.clone())?,
        })
    }
}

/// A link field with its typed property.
///
/// Identity is `(table_name, table_column_name)`; `name` is presentation only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkField {
    /// Display name.
    pub name: String,
    /// Owning table.
    pub table_name: String,
    /// Storage column on the owning table.
    pub table_column_name: String,
    /// Where the paired field lives.
    pub property: LinkProperty,
}

impl LinkField {
    /// Create a link field from `table.column` to `link_table.link_column`.
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        table_column_name: impl Into<String>,
        link_table_name: impl Into<String>,
        link_column_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            table_column_name: table_column_name.into(),
            property: LinkProperty {
                link_table_name: link_table_name.into(),
                link_column_name: link_column_name.into(),
            },
        }
    }

    /// The mirror field on the referenced table, under the given name.
    pub fn mirror(&self, name: impl Into<String>) -> LinkField {
        LinkField::new(
            name,
            self.property.link_table_name.clone(),
            self.property.link_column_name.clone(),
            self.table_name.clone(),
            self.table_column_name.clone(),
        )
    }

    /// Check whether `other` is this field's pair.
    pub fn is_paired_with(&self, other: &LinkField) -> bool {
        self.property.link_table_name == other.table_name
            && self.property.link_column_name == other.table_column_name
            && other.property.link_table_name == self.table_name
            && other.property.link_column_name == self.table_column_name
    }

    /// Column caching this field's display titles.
    pub fn title_column(&self) -> String {
        format!("{}{}", self.table_column_name, TITLE_SUFFIX)
    }

    /// Catalog entry for this field.
    pub fn to_field_def(&self) -> Result<FieldDef> {
        Ok(FieldDef::new(
            self.name.clone(),
            FieldType::Link,
            self.table_name.clone(),
            self.table_column_name.clone(),
        )
        .with_property(serde_json::to_value(&self.property)?))
    }
}

/// How a dependent field derives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependentKind {
    /// Lookup field, recomputed by the lookup subsystem.
    Lookup,
    /// Rollup field, recomputed by the lookup subsystem.
    Rollup,
    /// `<column>__title` cache, maintained by the link engine itself.
    TitleProjection,
}

impl DependentKind {
    /// Catalog representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DependentKind::Lookup => "lookup",
            DependentKind::Rollup => "rollup",
            DependentKind::TitleProjection => "title",
        }
    }
}

impl FromStr for DependentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lookup" => Ok(DependentKind::Lookup),
            "rollup" => Ok(DependentKind::Rollup),
            "title" => Ok(DependentKind::TitleProjection),
            other => Err(Error::InvalidData(format!(
                "unknown dependent kind {other:?}"
            ))),
        }
    }
}

/// A field that depends on some other column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// How the field is derived.
    pub kind: DependentKind,
    /// Table of the dependent field.
    pub table_name: String,
    /// Column of the dependent field.
    pub table_column_name: String,
}

impl FieldRef {
    /// Create a dependency record.
    pub fn new(
        kind: DependentKind,
        table_name: impl Into<String>,
        table_column_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            table_name: table_name.into(),
            table_column_name: table_column_name.into(),
        }
    }

    /// For a title projection, the link column whose titles it caches.
    pub fn projected_link_column(&self) -> Option<&str> {
        match self.kind {
            DependentKind::TitleProjection => self.table_column_name.strip_suffix(TITLE_SUFFIX),
            DependentKind::Lookup | DependentKind::Rollup => None,
        }
    }
}

/// A dependency edge registered in the catalog: `self` derives from `ref`
/// through the link field `link`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceEdge {
    /// Table of the dependent field.
    pub self_table_name: String,
    /// Column of the dependent field.
    pub self_table_column_name: String,
    /// Table of the source field.
    pub ref_table_name: String,
    /// Column of the source field.
    pub ref_table_column_name: String,
    /// Table of the link field connecting the two.
    pub link_table_name: String,
    /// Column of the link field connecting the two.
    pub link_table_column_name: String,
    /// How the dependent field is derived.
    pub kind: DependentKind,
}

impl ReferenceEdge {
    /// The title projection of `field`: `<column>__title` on the owning table
    /// depends on the referenced table's title column.
    pub fn title_projection(field: &LinkField, title_column: &str) -> Self {
        Self {
            self_table_name: field.table_name.clone(),
            self_table_column_name: field.title_column(),
            ref_table_name: field.property.link_table_name.clone(),
            ref_table_column_name: title_column.to_string(),
            link_table_name: field.table_name.clone(),
            link_table_column_name: field.table_column_name.clone(),
            kind: DependentKind::TitleProjection,
        }
    }

    /// The dependent side of this edge.
    pub fn dependent(&self) -> FieldRef {
        FieldRef::new(
            self.kind,
            self.self_table_name.clone(),
            self.self_table_column_name.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> LinkField {
        LinkField::new("Tasks", "tb_projects", "link_tasks", "tb_tasks", "link_projects")
    }

    #[test]
    fn test_link_property_json_shape() {
        let def = link().to_field_def().unwrap();
        assert_eq!(
            def.property,
            serde_json::json!({"linkTableName": "tb_tasks", "linkColumnName": "link_projects"})
        );
        assert_eq!(def.field_type, FieldType::Link);
        assert_eq!(def.as_link().unwrap(), link());
    }

    #[test]
    fn test_non_link_rejected() {
        let def = FieldDef::new("Name", FieldType::Text, "tb_tasks", "title");
        assert!(matches!(def.as_link(), Err(Error::NotALinkField { .. })));
    }

    #[test]
    fn test_mirror_round_trip() {
        let field = link();
        let paired = field.mirror("Projects");
        assert_eq!(paired.table_name, "tb_tasks");
        assert_eq!(paired.table_column_name, "link_projects");
        assert!(field.is_paired_with(&paired));
        assert!(paired.is_paired_with(&field));

        let back = paired.mirror(field.name.clone());
        assert_eq!(back, field);
    }

    #[test]
    fn test_type_strings() {
        for ty in [
            FieldType::Text,
            FieldType::Number,
            FieldType::Link,
            FieldType::Lookup,
            FieldType::Rollup,
        ] {
            assert_eq!(ty.as_str().parse::<FieldType>().unwrap(), ty);
        }
        assert!("formula".parse::<FieldType>().is_err());
        assert_eq!(
            "title".parse::<DependentKind>().unwrap(),
            DependentKind::TitleProjection
        );
    }

    #[test]
    fn test_title_projection_edge() {
        let edge = ReferenceEdge::title_projection(&link(), "title");
        assert_eq!(edge.self_table_column_name, "link_tasks__title");
        assert_eq!(edge.ref_table_name, "tb_tasks");
        assert_eq!(edge.ref_table_column_name, "title");
        assert_eq!(edge.dependent().projected_link_column(), Some("link_tasks"));

        let lookup = FieldRef::new(DependentKind::Lookup, "tb_projects", "task_names");
        assert_eq!(lookup.projected_link_column(), None);
    }
}
