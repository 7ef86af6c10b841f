//! Trellis Core - Schema and field model for the Trellis dataflow engine.
//!
//! This crate provides the foundational types shared by every operator in a
//! transform graph:
//!
//! - `FieldType`: the closed set of primitive field type tags
//! - `Field`: type-tagged columnar accessors keyed by row id
//! - `cast`: the explicit narrowing/widening table between accessor types
//! - `Schema`: an ordered, immutable-once-published list of named fields
//! - `FieldBitSet`: the changed-field-set reported alongside change events
//! - `FieldMapping`: inbound-to-outbound field id translation
//! - `FieldResolver`: name-based field lookup with dependency recording
//! - `Error`: error types for bind and configuration failures
//!
//! Row ids are dense, non-negative, process-local integers. `NO_ROW` is the
//! sentinel for "no row" in sparse row-indexed arrays.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::schema::{Schema, SchemaField};
//! use trellis_core::field::row_identity_field;
//!
//! let schema = Schema::new("orders", vec![
//!     SchemaField::new(0, "order_id", row_identity_field()),
//! ]);
//! assert_eq!(schema.field_at(0).unwrap().name(), "order_id");
//! ```

#![no_std]

extern crate alloc;

pub mod bitset;
pub mod cast;
pub mod collections;
mod error;
pub mod field;
pub mod field_bitset;
pub mod field_mapping;
pub mod resolver;
pub mod schema;
mod types;

pub use bitset::BitSet;
pub use collections::{IndexedSet, Interner};
pub use error::{Error, Result};
pub use field::{mapped_field, row_identity_field, Field, RowMapper, NO_ROW};
pub use field_bitset::FieldBitSet;
pub use field_mapping::{FieldMapping, FieldMappingBuilder, UNMAPPED};
pub use resolver::{FieldResolver, SchemaFieldResolver};
pub use schema::{Metadata, Schema, SchemaField};
pub use types::FieldType;
