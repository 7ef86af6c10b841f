//! Trellis Operators - Stateful incremental relational operators.
//!
//! Each operator subscribes to one or two upstream outputs, maintains its
//! own derived row space incrementally as add/change/remove events arrive,
//! and republishes through its own `Output` in removes-then-adds-then-
//! changes order:
//!
//! - `join`: a live equi-join between two row streams, keyed by interned
//!   join-key values
//! - `groupby`: group membership maintenance with dependency-tracked
//!   aggregate recomputation
//! - `conflation`: bounded batching and coalescing of change events
//! - `interner`: join-key and group-key interning over resolved fields
//!
//! Operators are constructed through their builders, which validate
//! configuration eagerly, before any data flows.

#![no_std]

extern crate alloc;

pub mod conflation;
pub mod groupby;
pub mod interner;
pub mod join;

pub use conflation::{ChangeConflator, ConflatorBuilder};
pub use groupby::{
    AggregationFunction, AvgAggregation, FieldGroupFunction, GroupBy, GroupByBuilder,
    GroupFunction, SumAggregation, NO_GROUP,
};
pub use interner::{DynamicJoinInterner, JoinInterner, KeyValue, RowInterner};
pub use join::{Join, JoinBuilder, JoinKeyHandling, NameConflictPolicy};
