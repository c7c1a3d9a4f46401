//! Relation tables and link field establishment.
//!
//! A link field pair between tables `A` and `B` is backed by two relation
//! tables, `lk_A__B` and `lk_B__A`, each with rows `(self, ref, link_field_id)`.
//! Both cascade away with the rows they point at and announce every removed
//! edge through an `AFTER DELETE` trigger.

use tracing::{debug, info};

use super::pairing::{paired_field, relation_table_between};
use crate::catalog::{ident, FieldCatalog, LinkField, ReferenceEdge};
use crate::error::Result;
use crate::store::{Executor, RelationStore, DELETE_EVENT_FUNCTION};

/// Name of the delete trigger on a relation table.
pub fn delete_trigger_name(relation_table: &str) -> String {
    format!("data_delete_trigger_{relation_table}")
}

/// DDL for one relation table and its delete trigger.
fn relation_table_ddl(self_table: &str, ref_table: &str, id_column: &str) -> String {
    let table = relation_table_between(self_table, ref_table);
    let trigger = delete_trigger_name(&table);
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            self TEXT,
            ref TEXT,
            link_field_id TEXT,
            PRIMARY KEY (self, ref, link_field_id),
            FOREIGN KEY (self) REFERENCES {self_table}({id_column}) ON DELETE CASCADE,
            FOREIGN KEY (ref) REFERENCES {ref_table}({id_column}) ON DELETE CASCADE
        );

        CREATE TRIGGER IF NOT EXISTS {trigger}
        AFTER DELETE ON {table}
        FOR EACH ROW
        BEGIN
            SELECT {DELETE_EVENT_FUNCTION}('{table}', json_object('self', OLD.self, 'ref', OLD.ref, 'link_field_id', OLD.link_field_id));
        END;"
    )
}

/// Create both relation tables between `owner` and `reference`, with their
/// triggers, if they do not exist yet.
pub fn ensure_relation_tables(
    exec: &dyn Executor,
    owner: &str,
    reference: &str,
    id_column: &str,
) -> Result<()> {
    ident::validate_table(owner)?;
    ident::validate_table(reference)?;
    ident::validate(id_column)?;

    exec.execute_batch(&relation_table_ddl(owner, reference, id_column))?;
    if owner != reference {
        exec.execute_batch(&relation_table_ddl(reference, owner, id_column))?;
    }
    debug!(owner, reference, "relation tables ensured");
    Ok(())
}

pub(crate) fn validate_field(field: &LinkField) -> Result<()> {
    ident::validate_table(&field.table_name)?;
    ident::validate_table(&field.property.link_table_name)?;
    ident::validate(&field.table_column_name)?;
    ident::validate(&field.property.link_column_name)?;
    ident::validate(&field.title_column())?;
    ident::validate(&format!(
        "{}{}",
        field.property.link_column_name,
        crate::catalog::TITLE_SUFFIX
    ))?;
    Ok(())
}

/// Establish a new link field and its pair.
///
/// In one transaction, with foreign-key enforcement suspended for that
/// transaction only:
/// 1. catalog entries for the field (if missing) and its pair,
/// 2. `<column>` and `<column>__title` on both tables,
/// 3. both `__title` projections registered against the opposite `title`,
/// 4. both relation tables and delete triggers.
///
/// Returns the paired field. On failure nothing is kept and enforcement is
/// back on.
pub fn add_field(
    store: &mut RelationStore,
    catalog: &dyn FieldCatalog,
    field: &LinkField,
) -> Result<LinkField> {
    add_field_inner(store, catalog, field).map_err(|e| e.creation())
}

fn add_field_inner(
    store: &mut RelationStore,
    catalog: &dyn FieldCatalog,
    field: &LinkField,
) -> Result<LinkField> {
    validate_field(field)?;
    let id_column = ident::validate(&store.config().id_column)?.to_string();
    let title_column = ident::validate(&store.config().title_column)?.to_string();

    let paired = store.transaction_without_foreign_keys(|tx| {
        let paired = paired_field(catalog, tx, field)?;

        if catalog
            .get_column(tx, &field.table_name, &field.table_column_name)?
            .is_none()
        {
            catalog.add_column(tx, &field.to_field_def()?)?;
        }
        catalog.add_column(tx, &paired.to_field_def()?)?;

        for side in [field, &paired] {
            tx.execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN {column} TEXT;
                 ALTER TABLE {table} ADD COLUMN {title} TEXT;",
                table = side.table_name,
                column = side.table_column_name,
                title = side.title_column(),
            ))?;
        }

        // `__title` columns have no catalog entry of their own.
        catalog.add_reference(tx, &ReferenceEdge::title_projection(field, &title_column))?;
        catalog.add_reference(tx, &ReferenceEdge::title_projection(&paired, &title_column))?;

        ensure_relation_tables(tx, &field.table_name, &paired.table_name, &id_column)?;
        Ok(paired)
    })?;

    info!(
        table = %field.table_name,
        column = %field.table_column_name,
        paired_table = %paired.table_name,
        paired_column = %paired.table_column_name,
        paired_name = %paired.name,
        "link field established"
    );
    Ok(paired)
}
