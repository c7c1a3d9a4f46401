//! Delete notifications raised by relation table triggers.
//!
//! Every relation table carries an `AFTER DELETE` trigger that calls the
//! [`DELETE_EVENT_FUNCTION`] SQL function with the relation table name and a
//! JSON payload `{self, ref, link_field_id}`. The function records the event on
//! the store's [`DeleteEventBus`]. Events raised inside a transaction stay
//! pending until it commits and are dropped if it rolls back.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Null;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Name of the SQL function invoked by relation table delete triggers.
pub const DELETE_EVENT_FUNCTION: &str = "data_event_delete";

/// One edge of a relation table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationTuple {
    /// Row in the owning table.
    #[serde(rename = "self")]
    pub self_id: String,
    /// Row in the referenced table.
    #[serde(rename = "ref")]
    pub ref_id: String,
    /// Column of the link field this edge belongs to.
    pub link_field_id: String,
}

impl RelationTuple {
    /// Create a relation tuple.
    pub fn new(
        self_id: impl Into<String>,
        ref_id: impl Into<String>,
        link_field_id: impl Into<String>,
    ) -> Self {
        Self {
            self_id: self_id.into(),
            ref_id: ref_id.into(),
            link_field_id: link_field_id.into(),
        }
    }
}

/// A relation tuple removed from a relation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEvent {
    /// Relation table the tuple was removed from (the event name).
    pub relation_table: String,
    /// The removed tuple (the event payload).
    #[serde(flatten)]
    pub tuple: RelationTuple,
}

type Subscriber = Box<dyn Fn(&DeleteEvent) + Send>;

/// Collects delete events and delivers them to subscribers.
#[derive(Default)]
pub struct DeleteEventBus {
    pending: Mutex<Vec<DeleteEvent>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl DeleteEventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for committed delete events.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&DeleteEvent) + Send + 'static,
    {
        self.subscribers.lock().push(Box::new(subscriber));
    }

    /// Record an event raised by a trigger.
    pub fn record(&self, event: DeleteEvent) {
        self.pending.lock().push(event);
    }

    /// Events recorded since the last publish or discard.
    pub fn pending(&self) -> Vec<DeleteEvent> {
        self.pending.lock().clone()
    }

    /// Deliver pending events to every subscriber and clear them.
    pub fn publish_pending(&self) -> usize {
        let events = std::mem::take(&mut *self.pending.lock());
        if events.is_empty() {
            return 0;
        }
        let subscribers = self.subscribers.lock();
        for event in &events {
            for subscriber in subscribers.iter() {
                subscriber(event);
            }
        }
        debug!(
            events = events.len(),
            subscribers = subscribers.len(),
            "published relation delete events"
        );
        events.len()
    }

    /// Drop pending events without delivering them.
    pub fn discard_pending(&self) -> usize {
        let mut pending = self.pending.lock();
        let dropped = pending.len();
        pending.clear();
        dropped
    }
}

impl std::fmt::Debug for DeleteEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteEventBus")
            .field("pending", &self.pending.lock().len())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

/// Register [`DELETE_EVENT_FUNCTION`] on a connection, feeding `bus`.
pub(crate) fn register_delete_function(conn: &Connection, bus: Arc<DeleteEventBus>) -> Result<()> {
    conn.create_scalar_function(
        DELETE_EVENT_FUNCTION,
        2,
        FunctionFlags::SQLITE_UTF8,
        move |ctx| {
            let relation_table: String = ctx.get(0)?;
            let payload: String = ctx.get(1)?;
            let tuple: RelationTuple = serde_json::from_str(&payload)
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
            bus.record(DeleteEvent {
                relation_table,
                tuple,
            });
            Ok(Null)
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(self_id: &str, ref_id: &str) -> DeleteEvent {
        DeleteEvent {
            relation_table: "lk_tb_a__tb_b".into(),
            tuple: RelationTuple::new(self_id, ref_id, "link_b"),
        }
    }

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(event("1", "2")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "relation_table": "lk_tb_a__tb_b",
                "self": "1",
                "ref": "2",
                "link_field_id": "link_b",
            })
        );

        let tuple: RelationTuple =
            serde_json::from_str(r#"{"self":"1","ref":"2","link_field_id":"link_b"}"#).unwrap();
        assert_eq!(tuple, RelationTuple::new("1", "2", "link_b"));
    }

    #[test]
    fn test_publish_delivers_and_clears() {
        let bus = DeleteEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(move |e| sink.lock().push(e.tuple.self_id.clone()));

        bus.record(event("1", "2"));
        bus.record(event("3", "4"));
        assert_eq!(bus.pending().len(), 2);

        assert_eq!(bus.publish_pending(), 2);
        assert!(bus.pending().is_empty());
        assert_eq!(*seen.lock(), vec!["1".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_panicking_subscriber_leaves_bus_usable() {
        let bus = DeleteEventBus::new();
        bus.subscribe(|e| {
            if e.tuple.self_id == "boom" {
                panic!("subscriber failed");
            }
        });

        bus.record(event("boom", "2"));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bus.publish_pending()));
        assert!(result.is_err());

        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        bus.subscribe(move |_| *sink.lock() += 1);
        bus.record(event("1", "2"));
        assert_eq!(bus.publish_pending(), 1);
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn test_discard_drops_silently() {
        let bus = DeleteEventBus::new();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        bus.subscribe(move |_| *sink.lock() += 1);

        bus.record(event("1", "2"));
        assert_eq!(bus.discard_pending(), 1);
        assert_eq!(bus.publish_pending(), 0);
        assert_eq!(*seen.lock(), 0);
    }
}
