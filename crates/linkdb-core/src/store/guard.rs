//! Scoped suspension of foreign-key enforcement.

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Keeps SQLite foreign-key enforcement off while alive.
///
/// SQLite ignores `PRAGMA foreign_keys` while a transaction is open, so the
/// guard must be taken before the transaction it covers begins. Enforcement
/// is switched back on by [`release`](Self::release) or, on any other exit
/// path, when the guard is dropped.
#[must_use = "foreign keys are re-enabled as soon as the guard is dropped"]
pub struct ForeignKeyGuard<'a> {
    conn: &'a Connection,
    released: bool,
}

impl<'a> ForeignKeyGuard<'a> {
    /// Switch enforcement off on `conn`.
    pub fn suspend(conn: &'a Connection) -> Result<Self> {
        Self::suspend_checked(conn, foreign_keys_enabled)
    }

    fn suspend_checked(
        conn: &'a Connection,
        enabled: impl Fn(&Connection) -> Result<bool>,
    ) -> Result<Self> {
        if !conn.is_autocommit() {
            return Err(Error::IntegrityGuard(
                "foreign keys cannot be suspended inside an open transaction".into(),
            ));
        }
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        // From here on, dropping the guard switches enforcement back on.
        let guard = Self {
            conn,
            released: false,
        };
        if enabled(conn)? {
            return Err(Error::IntegrityGuard(
                "foreign key enforcement is still active".into(),
            ));
        }
        debug!("foreign key enforcement suspended");
        Ok(guard)
    }

    /// Re-enable enforcement and confirm it took effect.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        restore(self.conn)
    }
}

impl Drop for ForeignKeyGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = restore(self.conn) {
            warn!(error = %e, "failed to restore foreign key enforcement");
        }
    }
}

fn restore(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    if !foreign_keys_enabled(conn)? {
        return Err(Error::IntegrityGuard(
            "foreign key enforcement could not be restored".into(),
        ));
    }
    debug!("foreign key enforcement restored");
    Ok(())
}

/// Read the current `PRAGMA foreign_keys` setting.
pub(crate) fn foreign_keys_enabled(conn: &Connection) -> Result<bool> {
    let enabled: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    Ok(enabled == 1)
}
