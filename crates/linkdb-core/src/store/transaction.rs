//! Scoped transactions on the relation store.

use rusqlite::Connection;

use super::events::{DeleteEvent, DeleteEventBus};
use super::executor::Executor;

/// An open transaction handed to a unit of work.
///
/// The transaction commits when the unit of work returns `Ok` and rolls back
/// when it returns `Err` or panics.
pub struct StoreTransaction<'a> {
    pub(super) tx: rusqlite::Transaction<'a>,
    pub(super) events: &'a DeleteEventBus,
}

impl StoreTransaction<'_> {
    /// Relation delete events raised so far in this transaction.
    ///
    /// They are delivered to subscribers only once the transaction commits.
    pub fn pending_deletes(&self) -> Vec<DeleteEvent> {
        self.events.pending()
    }
}

impl Executor for StoreTransaction<'_> {
    fn connection(&self) -> &Connection {
        &self.tx
    }
}
