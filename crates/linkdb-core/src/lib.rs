//! linkdb core - link fields, paired relations and title caches for a SQLite
//! row store.
//!
//! A link field on table `A` pointing at table `B` gets a paired field on `B`,
//! two relation tables holding the edges, and a `<column>__title` cache on each
//! side. [`LinkFieldService`] applies cell edits so that relation tuples, both
//! link cells, both title caches and any dependent lookup fields move
//! together in one transaction.

pub mod cascade;
pub mod catalog;
pub mod config;
pub mod error;
pub mod link;
pub mod store;

pub use cascade::{CascadePropagator, ColumnUpdate, LookupUpdater, NoopLookupUpdater, PropagationResult};
pub use catalog::{
    DependentKind, FieldCatalog, FieldDef, FieldRef, FieldType, LinkField, LinkProperty,
    ReferenceEdge, SqlCatalog,
};
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use link::{EffectRows, LinkDiff, LinkFieldService, LinkValue};
pub use store::{
    DeleteEvent, DeleteEventBus, Executor, ForeignKeyGuard, RelationStore, RelationTuple, Row,
    StoreTransaction,
};
