//! Grouping overlay: a tree of groups whose leaves are the same record handles
//! held by the flat record set.

mod descriptor;
mod grouper;
mod node;
mod path;
mod tree;

pub use descriptor::{AggregateDescriptor, GroupDescriptor};
pub use grouper::{FieldGrouper, Grouper};
pub use node::{Group, GroupAggregates, GroupItem};
pub use path::GroupPath;
pub use tree::GroupTree;
