//! Name-based field resolution with dependency recording.
//!
//! Operators and aggregation functions resolve the fields they read during
//! the bind phase. A resolver records every resolved field id so the owner
//! knows which inbound field changes it must react to.

use crate::bitset::BitSet;
use crate::cast;
use crate::error::{Error, Result};
use crate::field::{
    BoolField, ByteField, CharField, DoubleField, Field, FloatField, IntField, LongField,
    ShortField, StrField,
};
use crate::schema::Schema;
use alloc::rc::Rc;
use alloc::string::String;

/// Resolves fields by name within the schema being bound, recording that
/// the caller depends on each resolved field.
pub trait FieldResolver {
    /// Returns the field named `name`, or `FieldNotFound`.
    fn find_field(&mut self, name: &str) -> Result<Field>;

    /// Resolves and casts to a boolean accessor.
    fn find_bool_field(&mut self, name: &str) -> Result<Rc<dyn BoolField>> {
        cast::to_bool_field(&self.find_field(name)?)
    }

    /// Resolves and casts to a byte accessor.
    fn find_byte_field(&mut self, name: &str) -> Result<Rc<dyn ByteField>> {
        cast::to_byte_field(&self.find_field(name)?)
    }

    /// Resolves and casts to a short accessor.
    fn find_short_field(&mut self, name: &str) -> Result<Rc<dyn ShortField>> {
        cast::to_short_field(&self.find_field(name)?)
    }

    /// Resolves and casts to a character accessor.
    fn find_char_field(&mut self, name: &str) -> Result<Rc<dyn CharField>> {
        cast::to_char_field(&self.find_field(name)?)
    }

    /// Resolves and casts to an int accessor.
    fn find_int_field(&mut self, name: &str) -> Result<Rc<dyn IntField>> {
        cast::to_int_field(&self.find_field(name)?)
    }

    /// Resolves and casts to a long accessor.
    fn find_long_field(&mut self, name: &str) -> Result<Rc<dyn LongField>> {
        cast::to_long_field(&self.find_field(name)?)
    }

    /// Resolves and casts to a float accessor.
    fn find_float_field(&mut self, name: &str) -> Result<Rc<dyn FloatField>> {
        cast::to_float_field(&self.find_field(name)?)
    }

    /// Resolves and casts to a double accessor.
    fn find_double_field(&mut self, name: &str) -> Result<Rc<dyn DoubleField>> {
        cast::to_double_field(&self.find_field(name)?)
    }

    /// Resolves and casts to a string accessor.
    fn find_str_field(&mut self, name: &str) -> Result<Rc<dyn StrField>> {
        cast::to_str_field(&self.find_field(name)?)
    }
}

/// A `FieldResolver` over one schema, recording resolved field ids into a
/// dependency bit set.
pub struct SchemaFieldResolver<'a> {
    schema: &'a Schema,
    context: String,
    dependencies: BitSet,
}

impl<'a> SchemaFieldResolver<'a> {
    /// Creates a resolver over `schema`. `context` names the caller for
    /// error messages (e.g. the operator or function name).
    pub fn new(schema: &'a Schema, context: impl Into<String>) -> Self {
        Self {
            schema,
            context: context.into(),
            dependencies: BitSet::new(),
        }
    }

    /// Returns the field ids resolved so far.
    pub fn dependencies(&self) -> &BitSet {
        &self.dependencies
    }

    /// Consumes the resolver, returning the recorded dependency set.
    pub fn into_dependencies(self) -> BitSet {
        self.dependencies
    }
}

impl FieldResolver for SchemaFieldResolver<'_> {
    fn find_field(&mut self, name: &str) -> Result<Field> {
        match self.schema.maybe_field(name) {
            Some(schema_field) => {
                self.dependencies.set(schema_field.field_id());
                Ok(schema_field.field().clone())
            }
            None => Err(Error::field_not_found(
                name,
                self.context.clone(),
                self.schema.name(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaField;
    use alloc::vec;

    fn schema() -> Rc<Schema> {
        Schema::new(
            "trades",
            vec![
                SchemaField::new(0, "qty", Field::Int(Rc::new(|row: usize| row as i32))),
                SchemaField::new(1, "px", Field::Double(Rc::new(|_row: usize| 1.25))),
            ],
        )
    }

    #[test]
    fn test_resolution_records_dependencies() {
        let schema = schema();
        let mut resolver = SchemaFieldResolver::new(&schema, "test");
        resolver.find_field("px").unwrap();
        assert!(resolver.dependencies().get(1));
        assert!(!resolver.dependencies().get(0));
    }

    #[test]
    fn test_missing_field_error_names_context() {
        let schema = schema();
        let mut resolver = SchemaFieldResolver::new(&schema, "vwap calc");
        match resolver.find_field("notional") {
            Err(Error::FieldNotFound {
                field,
                context,
                schema,
            }) => {
                assert_eq!(field, "notional");
                assert_eq!(context, "vwap calc");
                assert_eq!(schema, "trades");
            }
            _ => panic!("expected FieldNotFound"),
        }
    }

    #[test]
    fn test_typed_find_applies_cast_table() {
        let schema = schema();
        let mut resolver = SchemaFieldResolver::new(&schema, "test");
        // int widens to long
        let long = resolver.find_long_field("qty").unwrap();
        assert_eq!(long.value_at(4), 4);
        // double does not narrow to int
        assert!(resolver.find_int_field("px").is_err());
    }
}
