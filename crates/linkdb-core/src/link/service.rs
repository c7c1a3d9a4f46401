//! Link field service.
//!
//! [`LinkFieldService`] is the entry point for link field edits. It holds the
//! store's only mutable borrow, so edits are serialized, and runs every
//! operation in a single transaction: relation tuples, link cells, title
//! caches and cascaded lookups commit or roll back together.

use std::collections::BTreeSet;

use rusqlite::ToSql;
use tracing::{debug, instrument, warn};

use super::cell::CellUpdater;
use super::diff::LinkDiff;
use super::effect::{self, EffectRows};
use super::relation_table;
use super::value::LinkValue;
use crate::cascade::{CascadePropagator, LookupUpdater};
use crate::catalog::{ident, DependentKind, FieldCatalog, LinkField};
use crate::error::{Error, Result};
use crate::store::{placeholders, Executor, RelationStore};

/// Link field operations over one store.
pub struct LinkFieldService<'a> {
    store: &'a mut RelationStore,
    cells: CellUpdater<'a>,
}

impl<'a> LinkFieldService<'a> {
    /// Create a service over `store`, reading fields from `catalog` and
    /// sending recompute requests to `lookup`.
    pub fn new(
        store: &'a mut RelationStore,
        catalog: &'a dyn FieldCatalog,
        lookup: &'a dyn LookupUpdater,
    ) -> Result<Self> {
        let config = store.config();
        let cells = CellUpdater::new(
            catalog,
            CascadePropagator::new(catalog, lookup),
            &config.id_column,
            &config.title_column,
        )?;
        Ok(Self { store, cells })
    }

    /// The underlying store.
    pub fn store(&self) -> &RelationStore {
        &*self.store
    }

    /// Establish `field` and its pair. Returns the paired field.
    #[instrument(skip(self, field), fields(table = %field.table_name, column = %field.table_column_name))]
    pub fn add_field(&mut self, field: &LinkField) -> Result<LinkField> {
        relation_table::add_field(self.store, self.cells.catalog(), field)
    }

    /// Rebuild `table.column` for `row_ids` from the relation tuples and
    /// recompute its dependents.
    ///
    /// A column that is not a registered field is a no-op.
    #[instrument(skip(self, row_ids), fields(rows = row_ids.len()))]
    pub fn update_link_cell(&mut self, table: &str, column: &str, row_ids: &[String]) -> Result<()> {
        let cells = &self.cells;
        self.store
            .transaction(|tx| cells.update_link_cell_in(tx, table, column, row_ids))
            .map_err(Error::cell_update)
    }

    /// Apply an edit of `row_id`'s cell in `field` from `old` to `new`.
    ///
    /// The cell must already hold `new`; [`LinkFieldService::set_cell`] writes
    /// it for you.
    #[instrument(skip(self, field, new, old), fields(table = %field.table_name, column = %field.table_column_name))]
    pub fn update_cell(
        &mut self,
        field: &LinkField,
        row_id: &str,
        new: Option<&LinkValue>,
        old: Option<&LinkValue>,
    ) -> Result<LinkDiff> {
        let cells = &self.cells;
        self.store
            .transaction(|tx| cells.update_cell_in(tx, field, row_id, new, old))
            .map_err(Error::cell_update)
    }

    /// Set `row_id`'s cell in `table.column` to `new` and apply the edit.
    ///
    /// Returns `None` when the column is not a registered field.
    #[instrument(skip(self, new))]
    pub fn set_cell(
        &mut self,
        table: &str,
        column: &str,
        row_id: &str,
        new: &LinkValue,
    ) -> Result<Option<LinkDiff>> {
        let cells = &self.cells;
        self.store
            .transaction(|tx| match cells.link_field(tx, table, column)? {
                Some(field) => cells.set_cell_in(tx, &field, row_id, new).map(Some),
                None => {
                    warn!(table, column, "link field not found; cell left unchanged");
                    Ok(None)
                }
            })
            .map_err(Error::cell_update)
    }

    /// Delete rows and refresh every surviving link cell that pointed at
    /// them.
    ///
    /// Returns the refreshed cells. Relation delete events reach subscribers
    /// once the deletion commits.
    #[instrument(skip(self, row_ids), fields(rows = row_ids.len()))]
    pub fn delete_rows(&mut self, table: &str, row_ids: &[String]) -> Result<EffectRows> {
        let cells = &self.cells;
        self.store
            .transaction(|tx| {
                if row_ids.is_empty() {
                    return Ok(EffectRows::new());
                }
                ident::validate_table(table)?;

                let params: Vec<&dyn ToSql> = row_ids.iter().map(|id| id as &dyn ToSql).collect();
                let deleted = tx.execute(
                    &format!(
                        "DELETE FROM {table} WHERE {} IN ({})",
                        cells.id_column(),
                        placeholders(row_ids.len())
                    ),
                    &params,
                )?;

                let mut effects = EffectRows::new();
                for event in tx.pending_deletes() {
                    if let Some(found) =
                        effect::effect_rows_by_relation_deleted(&event.relation_table, &event.tuple)
                    {
                        effect::merge(&mut effects, found);
                    }
                }
                if let Some(columns) = effects.get_mut(table) {
                    for rows in columns.values_mut() {
                        rows.retain(|id| !row_ids.contains(id));
                    }
                }
                prune(&mut effects);

                refresh(cells, tx, &effects)?;
                debug!(table, deleted, tables = effects.len(), "rows deleted");
                Ok(effects)
            })
            .map_err(Error::cell_update)
    }

    /// Refresh the title caches that show `row_ids` of `table` after their
    /// titles changed. Returns the refreshed cells.
    #[instrument(skip(self, row_ids), fields(rows = row_ids.len()))]
    pub fn refresh_titles(&mut self, table: &str, row_ids: &[String]) -> Result<EffectRows> {
        let cells = &self.cells;
        self.store
            .transaction(|tx| {
                let projections: BTreeSet<(String, String)> = cells
                    .catalog()
                    .effected_fields(tx, table, cells.title_column())?
                    .into_iter()
                    .filter(|dep| dep.kind == DependentKind::TitleProjection)
                    .filter_map(|dep| {
                        let column = dep.projected_link_column()?.to_string();
                        Some((dep.table_name, column))
                    })
                    .collect();

                let mut effects = effect::effect_rows(tx, table, row_ids)?;
                for (owner, columns) in effects.iter_mut() {
                    columns.retain(|column, _| projections.contains(&(owner.clone(), column.clone())));
                }
                prune(&mut effects);

                refresh(cells, tx, &effects)?;
                Ok(effects)
            })
            .map_err(Error::cell_update)
    }

    /// Comma-joined titles of the rows in `value`, as `field` would cache
    /// them.
    pub fn link_cell_title(&self, field: &LinkField, value: &LinkValue) -> Result<Option<String>> {
        self.cells.link_cell_title(&*self.store, field, value)
    }

    /// Rows whose link cells point at `row_ids` of `table`.
    pub fn effect_rows(&self, table: &str, row_ids: &[String]) -> Result<EffectRows> {
        effect::effect_rows(&*self.store, table, row_ids)
    }
}

fn prune(effects: &mut EffectRows) {
    for columns in effects.values_mut() {
        columns.retain(|_, rows| !rows.is_empty());
    }
    effects.retain(|_, columns| !columns.is_empty());
}

fn refresh(cells: &CellUpdater<'_>, exec: &dyn Executor, effects: &EffectRows) -> Result<()> {
    for (table, columns) in effects {
        for (column, rows) in columns {
            let rows: Vec<String> = rows.iter().cloned().collect();
            cells.update_link_cell_in(exec, table, column, &rows)?;
        }
    }
    Ok(())
}

impl std::fmt::Debug for LinkFieldService<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkFieldService")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::NoopLookupUpdater;
    use crate::catalog::SqlCatalog;

    fn store() -> RelationStore {
        let store = RelationStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE tb_a (_id TEXT PRIMARY KEY, title TEXT);
                 CREATE TABLE tb_b (_id TEXT PRIMARY KEY, title TEXT);
                 INSERT INTO tb_a (_id, title) VALUES ('r1', 'first');
                 INSERT INTO tb_b (_id, title) VALUES ('2', 'two'), ('3', 'three');",
            )
            .unwrap();
        store
    }

    fn cell(store: &RelationStore, table: &str, column: &str, id: &str) -> Option<String> {
        store
            .query(&format!("SELECT {column} AS v FROM {table} WHERE _id = ?"), &[&id])
            .unwrap()[0]
            .get_string("v")
    }

    #[test]
    fn test_set_cell_writes_both_sides() {
        let mut store = store();
        let catalog = SqlCatalog::new();
        let mut service = LinkFieldService::new(&mut store, &catalog, &NoopLookupUpdater).unwrap();
        service
            .add_field(&LinkField::new("B", "tb_a", "link_b", "tb_b", "link_a"))
            .unwrap();

        let diff = service
            .set_cell("tb_a", "link_b", "r1", &LinkValue::parse(Some("3,2")))
            .unwrap()
            .unwrap();
        assert_eq!(diff.added, ["3", "2"]);

        let store = service.store();
        assert_eq!(cell(store, "tb_a", "link_b", "r1").as_deref(), Some("3,2"));
        assert_eq!(cell(store, "tb_a", "link_b__title", "r1").as_deref(), Some("three,two"));
        assert_eq!(cell(store, "tb_b", "link_a", "2").as_deref(), Some("r1"));
        assert_eq!(cell(store, "tb_b", "link_a__title", "3").as_deref(), Some("first"));
    }

    #[test]
    fn test_set_cell_on_unknown_field_is_noop() {
        let mut store = store();
        let catalog = SqlCatalog::new();
        let mut service = LinkFieldService::new(&mut store, &catalog, &NoopLookupUpdater).unwrap();
        let result = service
            .set_cell("tb_a", "missing", "r1", &LinkValue::parse(Some("2")))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_update_link_cell_unknown_field_is_noop() {
        let mut store = store();
        let catalog = SqlCatalog::new();
        let mut service = LinkFieldService::new(&mut store, &catalog, &NoopLookupUpdater).unwrap();
        service
            .update_link_cell("tb_a", "missing", &["r1".to_string()])
            .unwrap();
    }

    #[test]
    fn test_errors_are_cell_updates() {
        let mut store = store();
        let catalog = SqlCatalog::new();
        let mut service = LinkFieldService::new(&mut store, &catalog, &NoopLookupUpdater).unwrap();
        let err = service
            .delete_rows("tb_a; DROP TABLE tb_b", &["r1".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::CellUpdate(_)));
        assert!(matches!(err.root(), Error::InvalidIdentifier(_)));
    }
}
