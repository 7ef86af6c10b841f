//! Trellis Flow - Change-propagation core.
//!
//! This crate decouples producers of row-level add/change/remove events
//! from an arbitrary number of subscribers, guaranteeing each subscriber a
//! consistent schema-then-data sequence:
//!
//! - `TransformInput`: the subscriber contract (schema binding plus ordered
//!   event delivery)
//! - `Output`: subscription management and fan-out; late subscribers are
//!   caught up with the current schema and a synthetic add of all active
//!   rows before they see any live event
//! - `RowProvider`: iteration over "all currently active rows" for catch-up
//! - `StateChange` / `StateChangeSet`: per-turn accumulators that publish
//!   in removes-then-adds-then-changes order
//!
//! The model is single-threaded, cooperative and push-based: all state
//! mutation and downstream delivery happen synchronously on one logical
//! thread. Handles are `Rc`-based and deliberately not `Send`; crossing
//! threads is the caller's responsibility.

#![no_std]

extern crate alloc;

mod input;
mod output;
mod provider;
mod state_change;

pub use input::{InputHandle, RowSequence, TransformInput};
pub use output::Output;
pub use provider::{BitSetRowProvider, DelegatedRowProvider, EmptyRowProvider, RowProvider, SharedBitSet};
pub use state_change::{StateChange, StateChangeSet};
