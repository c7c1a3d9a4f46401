//! Which link cells a row change reaches.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::ToSql;

use super::pairing::parse_relation_table_name;
use crate::error::Result;
use crate::store::{placeholders, Executor, RelationTuple};

/// Rows to refresh: table, then link column, then row ids.
pub type EffectRows = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// Every relation table in the store, by name.
pub fn relation_tables(exec: &dyn Executor) -> Result<Vec<String>> {
    let rows = exec.query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'lk\\_%' ESCAPE '\\' ORDER BY name",
        &[],
    )?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get_string("name"))
        .filter(|name| parse_relation_table_name(name).is_some())
        .collect())
}

/// Rows whose link cells point at any of `row_ids` in `table`.
pub fn effect_rows(exec: &dyn Executor, table: &str, row_ids: &[String]) -> Result<EffectRows> {
    let mut effects = EffectRows::new();
    if row_ids.is_empty() {
        return Ok(effects);
    }

    let params: Vec<&dyn ToSql> = row_ids.iter().map(|id| id as &dyn ToSql).collect();
    for relation_table in relation_tables(exec)? {
        let Some((owner, reference)) = parse_relation_table_name(&relation_table) else {
            continue;
        };
        if reference != table {
            continue;
        }

        let rows = exec.query(
            &format!(
                "SELECT self, link_field_id FROM {relation_table} WHERE ref IN ({})",
                placeholders(row_ids.len())
            ),
            &params,
        )?;
        for row in rows {
            let (Some(self_id), Some(column)) =
                (row.get_string("self"), row.get_string("link_field_id"))
            else {
                continue;
            };
            effects
                .entry(owner.to_string())
                .or_default()
                .entry(column)
                .or_default()
                .insert(self_id);
        }
    }
    Ok(effects)
}

/// The link cell a deleted relation tuple belonged to.
///
/// `None` when `relation_table` is not a relation table name.
pub fn effect_rows_by_relation_deleted(
    relation_table: &str,
    tuple: &RelationTuple,
) -> Option<EffectRows> {
    let (owner, _) = parse_relation_table_name(relation_table)?;
    let mut effects = EffectRows::new();
    effects
        .entry(owner.to_string())
        .or_default()
        .entry(tuple.link_field_id.clone())
        .or_default()
        .insert(tuple.self_id.clone());
    Some(effects)
}

/// Fold `other` into `into`.
pub fn merge(into: &mut EffectRows, other: EffectRows) {
    for (table, columns) in other {
        let target = into.entry(table).or_default();
        for (column, rows) in columns {
            target.entry(column).or_default().extend(rows);
        }
    }
}
