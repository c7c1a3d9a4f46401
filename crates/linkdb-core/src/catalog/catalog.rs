//! Field catalog: field definitions, table names and the dependency index.

use rusqlite::types::Value;
use tracing::debug;

use super::field::{DependentKind, FieldDef, FieldRef, FieldType, ReferenceEdge};
use super::ident;
use crate::config::DEFAULT_TITLE_COLUMN;
use crate::error::{Error, Result};
use crate::store::Executor;

/// Table mapping table names to display names.
pub const TABLES_TABLE: &str = "__tables";

/// Table holding field definitions.
pub const COLUMNS_TABLE: &str = "__columns";

/// Table holding dependency edges between fields.
pub const REFERENCES_TABLE: &str = "__references";

/// Catalog access used by the link engine.
///
/// Every call runs on the executor it is given, so catalog reads and writes
/// join whatever transaction the caller has open.
pub trait FieldCatalog {
    /// Resolve a field definition.
    fn get_column(&self, exec: &dyn Executor, table: &str, column: &str) -> Result<Option<FieldDef>>;

    /// Insert a field definition.
    fn add_column(&self, exec: &dyn Executor, field: &FieldDef) -> Result<()>;

    /// Fields that depend on `table.column`, either through it as their link
    /// field or on it as their source column.
    fn effected_fields(&self, exec: &dyn Executor, table: &str, column: &str) -> Result<Vec<FieldRef>>;

    /// Register a dependency edge.
    fn add_reference(&self, exec: &dyn Executor, edge: &ReferenceEdge) -> Result<()>;

    /// Human-readable name of a table.
    fn resolve_table_display_name(&self, exec: &dyn Executor, table: &str) -> Result<Option<String>>;

    /// Record (or rename) a table.
    fn register_table(&self, exec: &dyn Executor, table: &str, display_name: &str) -> Result<()>;
}

/// Catalog kept in tables of the relation store itself.
#[derive(Debug, Clone)]
pub struct SqlCatalog {
    title_column: String,
}

impl SqlCatalog {
    /// Create a catalog whose tables use the default title column.
    pub fn new() -> Self {
        Self {
            title_column: DEFAULT_TITLE_COLUMN.to_string(),
        }
    }

    /// Set the title column registered for every table.
    pub fn with_title_column(mut self, column: impl Into<String>) -> Self {
        self.title_column = column.into();
        self
    }

    /// Create the catalog tables if they do not exist.
    pub fn install(exec: &dyn Executor) -> Result<()> {
        exec.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLES_TABLE} (
                table_name TEXT PRIMARY KEY,
                display_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS {COLUMNS_TABLE} (
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                table_name TEXT NOT NULL,
                table_column_name TEXT NOT NULL,
                property TEXT,
                PRIMARY KEY (table_name, table_column_name)
            );

            CREATE TABLE IF NOT EXISTS {REFERENCES_TABLE} (
                self_table_name TEXT NOT NULL,
                self_table_column_name TEXT NOT NULL,
                ref_table_name TEXT NOT NULL,
                ref_table_column_name TEXT NOT NULL,
                link_table_name TEXT NOT NULL,
                link_table_column_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                PRIMARY KEY (self_table_name, self_table_column_name, ref_table_name,
                             ref_table_column_name, link_table_name, link_table_column_name),
                FOREIGN KEY (self_table_name, self_table_column_name)
                    REFERENCES {COLUMNS_TABLE}(table_name, table_column_name) ON DELETE CASCADE,
                FOREIGN KEY (ref_table_name, ref_table_column_name)
                    REFERENCES {COLUMNS_TABLE}(table_name, table_column_name) ON DELETE CASCADE
            );"
        ))
    }
}

impl Default for SqlCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldCatalog for SqlCatalog {
    fn get_column(&self, exec: &dyn Executor, table: &str, column: &str) -> Result<Option<FieldDef>> {
        let rows = exec.query(
            &format!(
                "SELECT name, type, table_name, table_column_name, property FROM {COLUMNS_TABLE} \
                 WHERE table_name = ? AND table_column_name = ?"
            ),
            &[&table, &column],
        )?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let field_type: FieldType = row
            .get_string("type")
            .ok_or_else(|| Error::InvalidData(format!("{table}.{column} has no type")))?
            .parse()?;
        let property = match row.get_string("property") {
            Some(raw) => serde_json::from_str(&raw)?,
            None => serde_json::Value::Null,
        };

        Ok(Some(FieldDef {
            name: row.get_string("name").unwrap_or_default(),
            field_type,
            table_name: table.to_string(),
            table_column_name: column.to_string(),
            property,
        }))
    }

    fn add_column(&self, exec: &dyn Executor, field: &FieldDef) -> Result<()> {
        ident::validate(&field.table_name)?;
        ident::validate(&field.table_column_name)?;
        let property: Value = if field.property.is_null() {
            Value::Null
        } else {
            Value::Text(serde_json::to_string(&field.property)?)
        };
        exec.execute(
            &format!(
                "INSERT INTO {COLUMNS_TABLE} (name, type, table_name, table_column_name, property) \
                 VALUES (?, ?, ?, ?, ?)"
            ),
            &[
                &field.name,
                &field.field_type.as_str(),
                &field.table_name,
                &field.table_column_name,
                &property,
            ],
        )?;
        debug!(
            table = %field.table_name,
            column = %field.table_column_name,
            field_type = %field.field_type,
            "catalog column added"
        );
        Ok(())
    }

    fn effected_fields(&self, exec: &dyn Executor, table: &str, column: &str) -> Result<Vec<FieldRef>> {
        let rows = exec.query(
            &format!(
                "SELECT self_table_name, self_table_column_name, kind FROM {REFERENCES_TABLE} \
                 WHERE (link_table_name = ?1 AND link_table_column_name = ?2) \
                    OR (ref_table_name = ?1 AND ref_table_column_name = ?2) \
                 GROUP BY self_table_name, self_table_column_name, kind \
                 ORDER BY MIN(rowid)"
            ),
            &[&table, &column],
        )?;

        rows.iter()
            .map(|row| {
                let kind: DependentKind = row.get_string("kind").unwrap_or_default().parse()?;
                Ok(FieldRef::new(
                    kind,
                    row.get_string("self_table_name").unwrap_or_default(),
                    row.get_string("self_table_column_name").unwrap_or_default(),
                ))
            })
            .collect()
    }

    fn add_reference(&self, exec: &dyn Executor, edge: &ReferenceEdge) -> Result<()> {
        exec.execute(
            &format!(
                "INSERT OR IGNORE INTO {REFERENCES_TABLE} (self_table_name, self_table_column_name, \
                 ref_table_name, ref_table_column_name, link_table_name, link_table_column_name, kind) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)"
            ),
            &[
                &edge.self_table_name,
                &edge.self_table_column_name,
                &edge.ref_table_name,
                &edge.ref_table_column_name,
                &edge.link_table_name,
                &edge.link_table_column_name,
                &edge.kind.as_str(),
            ],
        )?;
        debug!(
            dependent = %format!("{}.{}", edge.self_table_name, edge.self_table_column_name),
            source = %format!("{}.{}", edge.ref_table_name, edge.ref_table_column_name),
            kind = edge.kind.as_str(),
            "catalog reference added"
        );
        Ok(())
    }

    fn resolve_table_display_name(&self, exec: &dyn Executor, table: &str) -> Result<Option<String>> {
        let rows = exec.query(
            &format!("SELECT display_name FROM {TABLES_TABLE} WHERE table_name = ?"),
            &[&table],
        )?;
        Ok(rows.first().and_then(|row| row.get_string("display_name")))
    }

    fn register_table(&self, exec: &dyn Executor, table: &str, display_name: &str) -> Result<()> {
        ident::validate_table(table)?;
        exec.execute(
            &format!(
                "INSERT INTO {TABLES_TABLE} (table_name, display_name) VALUES (?, ?) \
                 ON CONFLICT(table_name) DO UPDATE SET display_name = excluded.display_name"
            ),
            &[&table, &display_name],
        )?;
        exec.execute(
            &format!(
                "INSERT OR IGNORE INTO {COLUMNS_TABLE} (name, type, table_name, table_column_name) \
                 VALUES (?, ?, ?, ?)"
            ),
            &[
                &self.title_column,
                &FieldType::Text.as_str(),
                &table,
                &self.title_column,
            ],
        )?;
        Ok(())
    }
}
