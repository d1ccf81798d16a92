//! Observable, transactional in-memory record store.
//!
//! Records ([`Model`]) track per-field edits against a pristine snapshot,
//! including edits made deep inside nested arrays and objects. A
//! [`RecordSet`] keeps the flat sequence together with the inserted and
//! removed ledgers, and a [`DataSource`] coordinates it with an optional
//! [`GroupTree`] so that insert, remove and rollback behave the same whether
//! or not the records are grouped.
//!
//! ```
//! use json_records::{DataSource, DataSourceOptions, LocalTransport, ModelSchema, Schema};
//! use serde_json::json;
//!
//! let transport = LocalTransport::new(json!([{"id": 1, "foo": "foo"}, {"id": 2, "foo": "foo"}]));
//! let schema = Schema::new(ModelSchema::new().with_id("id"));
//! let mut source = DataSource::new(DataSourceOptions::new(), schema, transport);
//! source.read().unwrap();
//!
//! let first = source.get(&json!(1)).unwrap();
//! source.remove(&first);
//! assert_eq!(source.data().len(), 1);
//!
//! source.cancel_changes(None).unwrap();
//! assert_eq!(source.data().len(), 2);
//! assert_eq!(source.data()[0].get_json("id"), Some(json!(1)));
//! ```

pub mod aggregates;
pub mod data_source;
pub mod error;
pub mod group;
pub mod model;
pub mod options;
pub mod record_set;
pub mod schema;
pub mod transport;

pub use aggregates::{AggregateFunction, AggregateRegistry};
pub use data_source::{Action, DataSource, DataSourceEvent, RecordInput, View};
pub use error::{DataSourceError, GroupError};
pub use group::{
    AggregateDescriptor, FieldGrouper, Group, GroupAggregates, GroupDescriptor, GroupItem,
    GroupPath, GroupTree, Grouper,
};
pub use model::{FieldSpec, Model, ModelSchema, WeakModel};
pub use options::DataSourceOptions;
pub use record_set::{CancelOutcome, RecordSet, RemovedRecord};
pub use schema::Schema;
pub use transport::{LocalTransport, Transport, TransportError};

pub use json_records_observable as observable;
