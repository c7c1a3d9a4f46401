//! Cascade propagation from a changed column to its dependent fields.
//!
//! The propagator resolves the dependents of `(table, column)` through the
//! catalog and asks the lookup subsystem to recompute each lookup or rollup
//! for the affected rows. Requests run synchronously, in catalog order, on the
//! caller's executor, so they commit or roll back with the change that caused
//! them. Only the first hop is seeded here; chaining from one lookup to the
//! next is the lookup subsystem's business.

use tracing::debug;

use crate::catalog::{DependentKind, FieldCatalog, FieldRef};
use crate::error::Result;
use crate::store::Executor;

/// A request to recompute one column for a set of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnUpdate<'a> {
    /// Table of the field to recompute.
    pub table_name: &'a str,
    /// Column of the field to recompute.
    pub table_column_name: &'a str,
    /// Rows to recompute.
    pub row_ids: &'a [String],
}

/// The lookup subsystem, as seen by the link engine.
pub trait LookupUpdater {
    /// Recompute `update.table_column_name` for `update.row_ids`, writing
    /// through `exec`.
    fn update_column(&self, exec: &dyn Executor, update: &ColumnUpdate<'_>) -> Result<()>;
}

impl<F> LookupUpdater for F
where
    F: Fn(&dyn Executor, &ColumnUpdate<'_>) -> Result<()>,
{
    fn update_column(&self, exec: &dyn Executor, update: &ColumnUpdate<'_>) -> Result<()> {
        self(exec, update)
    }
}

/// Lookup subsystem for stores without lookup or rollup fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLookupUpdater;

impl LookupUpdater for NoopLookupUpdater {
    fn update_column(&self, _exec: &dyn Executor, _update: &ColumnUpdate<'_>) -> Result<()> {
        Ok(())
    }
}

/// Result of a propagation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PropagationResult {
    /// Dependents handed to the lookup subsystem.
    pub notified: Vec<FieldRef>,
    /// Title projections left to the link engine.
    pub skipped: Vec<FieldRef>,
}

impl PropagationResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Fans a column change out to its dependent fields.
#[derive(Clone, Copy)]
pub struct CascadePropagator<'a> {
    catalog: &'a dyn FieldCatalog,
    lookup: &'a dyn LookupUpdater,
}

impl<'a> CascadePropagator<'a> {
    /// Create a new propagator.
    pub fn new(catalog: &'a dyn FieldCatalog, lookup: &'a dyn LookupUpdater) -> Self {
        Self { catalog, lookup }
    }

    /// Notify every dependent of `table.column` that `row_ids` changed.
    ///
    /// The first failing request aborts propagation and its error is returned,
    /// which fails the enclosing transaction.
    pub fn propagate(
        &self,
        exec: &dyn Executor,
        table: &str,
        column: &str,
        row_ids: &[String],
    ) -> Result<PropagationResult> {
        let mut result = PropagationResult::new();
        if row_ids.is_empty() {
            return Ok(result);
        }

        for dependent in self.catalog.effected_fields(exec, table, column)? {
            match dependent.kind {
                DependentKind::Lookup | DependentKind::Rollup => {
                    self.lookup.update_column(
                        exec,
                        &ColumnUpdate {
                            table_name: &dependent.table_name,
                            table_column_name: &dependent.table_column_name,
                            row_ids,
                        },
                    )?;
                    result.notified.push(dependent);
                }
                DependentKind::TitleProjection => result.skipped.push(dependent),
            }
        }

        debug!(
            table,
            column,
            rows = row_ids.len(),
            notified = result.notified.len(),
            "cascade propagated"
        );
        Ok(result)
    }
}
