//! Relation store adapter over SQLite.
//!
//! [`RelationStore`] owns the connection. Every mutation takes `&mut self`, so
//! a store has exactly one writer; multi-step work runs through
//! [`RelationStore::transaction`] and commits or rolls back as a whole.

mod events;
mod executor;
mod guard;
mod transaction;

use std::sync::Arc;

use rusqlite::{Connection, ToSql, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::catalog::SqlCatalog;
use crate::config::StoreConfig;
use crate::error::Result;

pub use events::{DeleteEvent, DeleteEventBus, RelationTuple, DELETE_EVENT_FUNCTION};
pub use executor::{Executor, Row};
pub use guard::ForeignKeyGuard;
pub use transaction::StoreTransaction;

pub(crate) use executor::placeholders;

/// A SQLite database holding user tables, relation tables and the catalog.
pub struct RelationStore {
    conn: Connection,
    events: Arc<DeleteEventBus>,
    config: StoreConfig,
}

impl RelationStore {
    /// Open a store with the given configuration.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let conn = match config.path() {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let events = Arc::new(DeleteEventBus::new());
        events::register_delete_function(&conn, events.clone())?;

        let store = Self {
            conn,
            events,
            config,
        };
        if store.config.install_catalog {
            SqlCatalog::install(&store)?;
        }

        info!(
            path = ?store.config.path(),
            catalog = store.config.install_catalog,
            "relation store opened"
        );
        Ok(store)
    }

    /// Open a private in-memory store with default settings.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The delete event bus fed by relation table triggers.
    pub fn events(&self) -> &DeleteEventBus {
        &self.events
    }

    /// Register a subscriber for committed relation delete events.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&DeleteEvent) + Send + 'static,
    {
        self.events.subscribe(subscriber);
    }

    /// Check whether foreign-key enforcement is currently on.
    pub fn foreign_keys_enabled(&self) -> Result<bool> {
        guard::foreign_keys_enabled(&self.conn)
    }

    /// Run `work` inside one transaction.
    pub fn transaction<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&StoreTransaction<'_>) -> Result<T>,
    {
        self.run_transaction(work)
    }

    /// Run `work` inside one transaction with foreign-key enforcement
    /// suspended for exactly that transaction.
    ///
    /// Enforcement is restored whether the work commits, fails or panics.
    pub fn transaction_without_foreign_keys<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&StoreTransaction<'_>) -> Result<T>,
    {
        let guard = ForeignKeyGuard::suspend(&self.conn)?;
        let result = self.run_transaction(work);
        let restored = guard.release();
        let value = result?;
        restored?;
        Ok(value)
    }

    /// Settle the delete events raised by a statement run outside
    /// [`RelationStore::transaction`].
    ///
    /// Once the connection is back in autocommit the statement's effects are
    /// final, so its events are delivered on success and dropped on failure.
    /// Inside a transaction the statement opened itself, events wait for the
    /// transaction to end.
    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return result;
        }
        match result {
            Ok(value) => {
                self.events.publish_pending();
                Ok(value)
            }
            Err(err) => {
                self.events.discard_pending();
                Err(err)
            }
        }
    }

    fn run_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&StoreTransaction<'_>) -> Result<T>,
    {
        let leftover = self.events.publish_pending();
        if leftover > 0 {
            debug!(leftover, "published delete events left by autocommit statements");
        }

        let tx = rusqlite::Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let scope = StoreTransaction {
            tx,
            events: &self.events,
        };

        match work(&scope) {
            Ok(value) => {
                let StoreTransaction { tx, .. } = scope;
                if let Err(e) = tx.commit() {
                    self.events.discard_pending();
                    return Err(e.into());
                }
                self.events.publish_pending();
                Ok(value)
            }
            Err(err) => {
                let StoreTransaction { tx, .. } = scope;
                if let Err(e) = tx.rollback() {
                    warn!(error = %e, "rollback failed");
                }
                let dropped = self.events.discard_pending();
                debug!(error = %err, dropped, "transaction rolled back");
                Err(err)
            }
        }
    }
}

impl Executor for RelationStore {
    fn connection(&self) -> &Connection {
        &self.conn
    }

    fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        self.settle(self.conn.execute(sql, params).map_err(Into::into))
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        self.settle(self.conn.execute_batch(sql).map_err(Into::into))
    }

    fn query(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>> {
        self.settle(executor::query_rows(&self.conn, sql, params))
    }
}

impl std::fmt::Debug for RelationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationStore")
            .field("config", &self.config)
            .field("events", &self.events)
            .finish()
    }
}
