//! Statement execution shared by the store and its transactions.

use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};

use crate::error::Result;

/// A result row with owned values, addressable by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Value of a column, if the column exists.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Column value rendered as a string. `NULL` and blobs yield `None`.
    pub fn get_string(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(f) => Some(f.to_string()),
            Value::Null | Value::Blob(_) => None,
        }
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Something statements can run against: the store itself or an open
/// transaction on it.
///
/// Table and column names are interpolated into `sql` by callers and must be
/// validated with [`crate::catalog::ident::validate`] first; values always go
/// through `params`.
pub trait Executor {
    /// The underlying connection.
    fn connection(&self) -> &Connection;

    /// Run a single statement, returning the number of changed rows.
    fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        Ok(self.connection().execute(sql, params)?)
    }

    /// Run several parameterless statements.
    fn execute_batch(&self, sql: &str) -> Result<()> {
        Ok(self.connection().execute_batch(sql)?)
    }

    /// Run a query and collect every row.
    fn query(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>> {
        query_rows(self.connection(), sql, params)
    }
}

/// Run a query on `conn` and collect every row.
pub(crate) fn query_rows(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
        .into();
    let width = columns.len();

    let rows = stmt.query_map(params, |row| {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(row.get::<_, Value>(idx)?);
        }
        Ok(values)
    })?;

    let mut out = Vec::new();
    for values in rows {
        out.push(Row {
            columns: columns.clone(),
            values: values?,
        });
    }
    Ok(out)
}

/// `?,?,?` for an `IN (...)` list of `n` values.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare(Connection);

    impl Executor for Bare {
        fn connection(&self) -> &Connection {
            &self.0
        }
    }

    #[test]
    fn test_query_rows_by_name() {
        let exec = Bare(Connection::open_in_memory().unwrap());
        exec.execute_batch("CREATE TABLE t (_id TEXT PRIMARY KEY, title TEXT, n INTEGER);")
            .unwrap();
        exec.execute(
            "INSERT INTO t (_id, title, n) VALUES (?, ?, ?)",
            &[&"1", &"first", &7],
        )
        .unwrap();
        exec.execute("INSERT INTO t (_id) VALUES (?)", &[&"2"]).unwrap();

        let rows = exec.query("SELECT _id, title, n FROM t ORDER BY _id", &[]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns(), ["_id", "title", "n"]);
        assert_eq!(rows[0].get_string("title").as_deref(), Some("first"));
        assert_eq!(rows[0].get_string("n").as_deref(), Some("7"));
        assert_eq!(rows[1].get_string("title"), None);
        assert_eq!(rows[1].get("missing"), None);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?,?,?");
    }
}
