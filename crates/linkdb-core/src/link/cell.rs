//! Link cell reads and writes inside a caller's transaction.

use std::collections::{HashMap, HashSet};

use rusqlite::ToSql;
use tracing::{debug, warn};

use super::diff::{diff, LinkDiff};
use super::pairing::{relation_table_name, resolve_paired_field, reverse_relation_table_name};
use super::relation_table::validate_field;
use super::value::LinkValue;
use crate::cascade::CascadePropagator;
use crate::catalog::{ident, FieldCatalog, LinkField};
use crate::error::{Error, Result};
use crate::store::{placeholders, Executor};

/// Keeps link cells, title caches and relation tuples in step.
///
/// Every method runs on the executor it is given and never opens a
/// transaction of its own.
pub(crate) struct CellUpdater<'a> {
    catalog: &'a dyn FieldCatalog,
    propagator: CascadePropagator<'a>,
    id_column: String,
    title_column: String,
}

impl<'a> CellUpdater<'a> {
    pub(crate) fn new(
        catalog: &'a dyn FieldCatalog,
        propagator: CascadePropagator<'a>,
        id_column: &str,
        title_column: &str,
    ) -> Result<Self> {
        Ok(Self {
            catalog,
            propagator,
            id_column: ident::validate(id_column)?.to_string(),
            title_column: ident::validate(title_column)?.to_string(),
        })
    }

    pub(crate) fn catalog(&self) -> &'a dyn FieldCatalog {
        self.catalog
    }

    pub(crate) fn id_column(&self) -> &str {
        &self.id_column
    }

    pub(crate) fn title_column(&self) -> &str {
        &self.title_column
    }

    /// Resolve `table.column` to a link field. `None` when no such field
    /// exists.
    pub(crate) fn link_field(
        &self,
        exec: &dyn Executor,
        table: &str,
        column: &str,
    ) -> Result<Option<LinkField>> {
        match self.catalog.get_column(exec, table, column)? {
            None => Ok(None),
            Some(def) if def.is_link() => {
                let field = def.as_link()?;
                validate_field(&field)?;
                Ok(Some(field))
            }
            Some(_) => Err(Error::NotALinkField {
                table: table.to_string(),
                column: column.to_string(),
            }),
        }
    }

    /// Current link values of `row_ids`, rebuilt from the forward relation
    /// table in insertion order. Rows without edges are absent.
    pub(crate) fn link_cell_values(
        &self,
        exec: &dyn Executor,
        field: &LinkField,
        row_ids: &[String],
    ) -> Result<HashMap<String, LinkValue>> {
        let mut values: HashMap<String, LinkValue> = HashMap::new();
        if row_ids.is_empty() {
            return Ok(values);
        }

        let sql = format!(
            "SELECT self, ref FROM {} WHERE link_field_id = ? AND self IN ({}) ORDER BY rowid",
            relation_table_name(field),
            placeholders(row_ids.len())
        );
        let mut params: Vec<&dyn ToSql> = vec![&field.table_column_name];
        params.extend(row_ids.iter().map(|id| id as &dyn ToSql));

        for row in exec.query(&sql, &params)? {
            let (Some(self_id), Some(ref_id)) = (row.get_string("self"), row.get_string("ref"))
            else {
                continue;
            };
            values.entry(self_id).or_default().push(ref_id);
        }
        Ok(values)
    }

    /// Comma-joined titles of the rows in `value`, in value order.
    ///
    /// Rows that no longer exist are skipped; a `NULL` title renders empty.
    /// `None` when `value` is empty.
    pub(crate) fn link_cell_title(
        &self,
        exec: &dyn Executor,
        field: &LinkField,
        value: &LinkValue,
    ) -> Result<Option<String>> {
        if value.is_empty() {
            return Ok(None);
        }

        let id = &self.id_column;
        let title = &self.title_column;
        let sql = format!(
            "SELECT {id} AS id, {title} AS title FROM {} WHERE {id} IN ({})",
            field.property.link_table_name,
            placeholders(value.len())
        );
        let params: Vec<&dyn ToSql> = value.iter().map(|id| id as &dyn ToSql).collect();

        let mut titles: HashMap<String, String> = HashMap::new();
        for row in exec.query(&sql, &params)? {
            if let Some(row_id) = row.get_string("id") {
                titles.insert(row_id, row.get_string("title").unwrap_or_default());
            }
        }

        let joined: Vec<&str> = value
            .iter()
            .filter_map(|id| titles.get(id).map(String::as_str))
            .collect();
        Ok(Some(joined.join(",")))
    }

    /// Write a link cell and its title cache.
    fn write_link_cell(
        &self,
        exec: &dyn Executor,
        field: &LinkField,
        row_id: &str,
        value: &LinkValue,
    ) -> Result<()> {
        let title = self.link_cell_title(exec, field, value)?;
        exec.execute(
            &format!(
                "UPDATE {} SET {} = ?, {} = ? WHERE {} = ?",
                field.table_name,
                field.table_column_name,
                field.title_column(),
                self.id_column
            ),
            &[&value.to_storage(), &title, &row_id],
        )?;
        Ok(())
    }

    /// Write only the title cache of a link cell.
    fn write_link_title(
        &self,
        exec: &dyn Executor,
        field: &LinkField,
        row_id: &str,
        value: &LinkValue,
    ) -> Result<()> {
        let title = self.link_cell_title(exec, field, value)?;
        exec.execute(
            &format!(
                "UPDATE {} SET {} = ? WHERE {} = ?",
                field.table_name,
                field.title_column(),
                self.id_column
            ),
            &[&title, &row_id],
        )?;
        Ok(())
    }

    /// Rebuild `field`'s cells for `row_ids` from the relation tuples, then
    /// propagate to its dependents.
    pub(crate) fn refresh_cells(
        &self,
        exec: &dyn Executor,
        field: &LinkField,
        row_ids: &[String],
    ) -> Result<()> {
        let mut seen = HashSet::new();
        let row_ids: Vec<String> = row_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        if row_ids.is_empty() {
            return Ok(());
        }

        let values = self.link_cell_values(exec, field, &row_ids)?;
        let empty = LinkValue::new();
        for row_id in &row_ids {
            let value = values.get(row_id).unwrap_or(&empty);
            self.write_link_cell(exec, field, row_id, value)?;
        }
        debug!(
            table = %field.table_name,
            column = %field.table_column_name,
            rows = row_ids.len(),
            "link cells refreshed"
        );

        self.propagator
            .propagate(exec, &field.table_name, &field.table_column_name, &row_ids)?;
        Ok(())
    }

    /// Refresh `table.column` for `row_ids`. A missing field is logged and
    /// ignored.
    pub(crate) fn update_link_cell_in(
        &self,
        exec: &dyn Executor,
        table: &str,
        column: &str,
        row_ids: &[String],
    ) -> Result<()> {
        match self.link_field(exec, table, column)? {
            Some(field) => self.refresh_cells(exec, &field, row_ids),
            None => {
                warn!(table, column, "link field not found; nothing to refresh");
                Ok(())
            }
        }
    }

    /// Apply an edit of `row_id`'s cell from `old` to `new`.
    ///
    /// The cell itself must already hold `new`. Relation tuples are brought in
    /// line on both sides, dependents of both sides are recomputed and every
    /// affected title cache is rewritten.
    pub(crate) fn update_cell_in(
        &self,
        exec: &dyn Executor,
        field: &LinkField,
        row_id: &str,
        new: Option<&LinkValue>,
        old: Option<&LinkValue>,
    ) -> Result<LinkDiff> {
        validate_field(field)?;
        let paired = resolve_paired_field(self.catalog, exec, field)?;
        let forward = relation_table_name(field);
        let reverse = reverse_relation_table_name(field);

        let changes = diff(new, old);
        debug!(
            table = %field.table_name,
            column = %field.table_column_name,
            row_id,
            added = ?changes.added,
            removed = ?changes.removed,
            "link cell diff"
        );

        if !changes.removed.is_empty() {
            let list = placeholders(changes.removed.len());
            let removed = changes.removed.iter().map(|id| id as &dyn ToSql);

            let mut params: Vec<&dyn ToSql> = vec![&row_id, &field.table_column_name];
            params.extend(removed.clone());
            exec.execute(
                &format!(
                    "DELETE FROM {forward} WHERE self = ? AND link_field_id = ? AND ref IN ({list})"
                ),
                &params,
            )?;

            let mut params: Vec<&dyn ToSql> = vec![&row_id, &paired.table_column_name];
            params.extend(removed);
            exec.execute(
                &format!(
                    "DELETE FROM {reverse} WHERE ref = ? AND link_field_id = ? AND self IN ({list})"
                ),
                &params,
            )?;
        }

        for added in &changes.added {
            exec.execute(
                &format!("INSERT OR IGNORE INTO {forward} (self, ref, link_field_id) VALUES (?, ?, ?)"),
                &[&row_id, added, &field.table_column_name],
            )?;
            exec.execute(
                &format!("INSERT OR IGNORE INTO {reverse} (self, ref, link_field_id) VALUES (?, ?, ?)"),
                &[added, &row_id, &paired.table_column_name],
            )?;
        }

        let own = [row_id.to_string()];
        self.propagator
            .propagate(exec, &field.table_name, &field.table_column_name, &own)?;

        let affected = changes.affected();
        if !affected.is_empty() {
            self.refresh_cells(exec, &paired, &affected)?;
        }

        let empty = LinkValue::new();
        self.write_link_title(exec, field, row_id, new.unwrap_or(&empty))?;

        Ok(changes)
    }

    /// Store `new` in `row_id`'s cell and apply the edit.
    pub(crate) fn set_cell_in(
        &self,
        exec: &dyn Executor,
        field: &LinkField,
        row_id: &str,
        new: &LinkValue,
    ) -> Result<LinkDiff> {
        validate_field(field)?;
        let rows = exec.query(
            &format!(
                "SELECT {} AS value FROM {} WHERE {} = ?",
                field.table_column_name, field.table_name, self.id_column
            ),
            &[&row_id],
        )?;
        let Some(row) = rows.first() else {
            return Err(Error::InvalidData(format!(
                "row {row_id:?} not found in {}",
                field.table_name
            )));
        };
        let old = LinkValue::parse(row.get_string("value").as_deref());

        exec.execute(
            &format!(
                "UPDATE {} SET {} = ? WHERE {} = ?",
                field.table_name, field.table_column_name, self.id_column
            ),
            &[&new.to_storage(), &row_id],
        )?;
        self.update_cell_in(exec, field, row_id, Some(new), Some(&old))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::NoopLookupUpdater;
    use crate::catalog::SqlCatalog;
    use crate::link::relation_table::add_field;
    use crate::store::RelationStore;

    fn setup() -> (RelationStore, SqlCatalog, LinkField) {
        let mut store = RelationStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE tb_a (_id TEXT PRIMARY KEY, title TEXT);
                 CREATE TABLE tb_b (_id TEXT PRIMARY KEY, title TEXT);
                 INSERT INTO tb_a (_id, title) VALUES ('r1', 'first');
                 INSERT INTO tb_b (_id, title) VALUES ('2', 'two'), ('3', NULL), ('4', 'four');",
            )
            .unwrap();
        let catalog = SqlCatalog::new();
        catalog.register_table(&store, "tb_a", "A").unwrap();
        catalog.register_table(&store, "tb_b", "B").unwrap();
        let field = LinkField::new("B", "tb_a", "link_b", "tb_b", "link_a");
        add_field(&mut store, &catalog, &field).unwrap();
        (store, catalog, field)
    }

    #[test]
    fn test_title_follows_value_order() {
        let (store, catalog, field) = setup();
        let cells = CellUpdater::new(
            &catalog,
            CascadePropagator::new(&catalog, &NoopLookupUpdater),
            "_id",
            "title",
        )
        .unwrap();

        let value = LinkValue::parse(Some("4,missing,3,2"));
        let title = cells.link_cell_title(&store, &field, &value).unwrap();
        assert_eq!(title.as_deref(), Some("four,,two"));
        assert_eq!(cells.link_cell_title(&store, &field, &LinkValue::new()).unwrap(), None);
    }

    #[test]
    fn test_link_field_rejects_plain_column() {
        let (store, catalog, _) = setup();
        let cells = CellUpdater::new(
            &catalog,
            CascadePropagator::new(&catalog, &NoopLookupUpdater),
            "_id",
            "title",
        )
        .unwrap();

        assert!(cells.link_field(&store, "tb_a", "nope").unwrap().is_none());
        let err = cells.link_field(&store, "tb_a", "title").unwrap_err();
        assert!(matches!(err, Error::NotALinkField { .. }));
    }

    #[test]
    fn test_set_cell_unknown_row() {
        let (store, catalog, field) = setup();
        let cells = CellUpdater::new(
            &catalog,
            CascadePropagator::new(&catalog, &NoopLookupUpdater),
            "_id",
            "title",
        )
        .unwrap();

        let err = cells
            .set_cell_in(&store, &field, "ghost", &LinkValue::parse(Some("2")))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }
}
