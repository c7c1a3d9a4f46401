//! Link fields: values, diffs, pairing, relation tables and the service that
//! keeps them consistent.

mod cell;
pub mod diff;
pub mod effect;
pub mod pairing;
pub mod relation_table;
mod service;
pub mod value;

pub use diff::{diff, diff_stored, LinkDiff};
pub use effect::EffectRows;
pub use pairing::{paired_field, relation_table_name, reverse_relation_table_name};
pub use relation_table::{add_field, ensure_relation_tables};
pub use service::LinkFieldService;
pub use value::LinkValue;
