//! Key interning over resolved fields.
//!
//! A join or group key is the value (or tuple of values) of one or more
//! fields of a row. Interning maps each distinct key value to a small
//! dense integer so that key equality and key-to-row lookup are O(1)
//! regardless of the key's width or type. Entries are recycled when freed,
//! keeping the key space dense.

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use trellis_core::{Error, Field, FieldResolver, Interner, Result};

/// One interned key component. Floating-point components are stored by
/// their bit pattern so keys are hashable; two floats intern to the same
/// entry iff their bit patterns are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    FloatBits(u32),
    DoubleBits(u64),
    Str(Rc<str>),
    Tuple(Vec<KeyValue>),
    Unit,
}

impl KeyValue {
    pub fn float(value: f32) -> Self {
        KeyValue::FloatBits(value.to_bits())
    }

    pub fn double(value: f64) -> Self {
        KeyValue::DoubleBits(value.to_bits())
    }
}

/// Reads the key component of `field` at `row`.
///
/// Generic fields key on their display form, which is the only equality
/// the type exposes.
pub(crate) fn key_of(field: &Field, row: usize) -> KeyValue {
    match field {
        Field::Bool(f) => KeyValue::Bool(f.value_at(row)),
        Field::Byte(f) => KeyValue::Byte(f.value_at(row)),
        Field::Short(f) => KeyValue::Short(f.value_at(row)),
        Field::Char(f) => KeyValue::Char(f.value_at(row)),
        Field::Int(f) => KeyValue::Int(f.value_at(row)),
        Field::Long(f) => KeyValue::Long(f.value_at(row)),
        Field::Float(f) => KeyValue::float(f.value_at(row)),
        Field::Double(f) => KeyValue::double(f.value_at(row)),
        Field::Str(f) => KeyValue::Str(f.value_at(row)),
        Field::Generic(f) => KeyValue::Str(Rc::from(format!("{}", f.value_at(row)))),
    }
}

/// Builds the composite key of `row` over `fields`: `Unit` for zero
/// fields, the bare component for one, a tuple otherwise.
pub(crate) fn composite_key_of(fields: &[Field], row: usize) -> KeyValue {
    match fields {
        [] => KeyValue::Unit,
        [field] => key_of(field, row),
        many => KeyValue::Tuple(many.iter().map(|f| key_of(f, row)).collect()),
    }
}

/// A key space shared between interners whose entries must be comparable,
/// such as the two sides of a join.
pub type SharedKeySpace = Rc<RefCell<Interner<KeyValue>>>;

/// Interns rows of one schema into a key space.
pub trait RowInterner {
    /// Resolves the key fields against the schema being bound. The
    /// resolver records the key fields as dependencies of the caller.
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()>;

    /// Releases bound field references.
    fn unbind(&mut self);

    /// Returns the key entry for `row`'s current key value, allocating a
    /// new entry for a first-seen value.
    fn intern(&mut self, row: usize) -> usize;

    /// Releases a key entry for reuse.
    fn free_entry(&mut self, entry: usize);
}

/// A `RowInterner` over named key fields, interning into a shared key
/// space.
pub struct FieldKeyInterner {
    names: Vec<String>,
    fields: Vec<Field>,
    keys: SharedKeySpace,
}

impl FieldKeyInterner {
    pub fn new(names: Vec<String>, keys: SharedKeySpace) -> Self {
        Self {
            names,
            fields: Vec::new(),
            keys,
        }
    }

    /// Returns the field types resolved at bind, in key order.
    fn bound_types(&self) -> Vec<trellis_core::FieldType> {
        self.fields.iter().map(Field::field_type).collect()
    }
}

impl RowInterner for FieldKeyInterner {
    fn bind_to_schema(&mut self, resolver: &mut dyn FieldResolver) -> Result<()> {
        let mut fields = Vec::with_capacity(self.names.len());
        for name in &self.names {
            fields.push(resolver.find_field(name)?);
        }
        self.fields = fields;
        Ok(())
    }

    fn unbind(&mut self) {
        self.fields.clear();
        self.keys.borrow_mut().clear();
    }

    fn intern(&mut self, row: usize) -> usize {
        let key = composite_key_of(&self.fields, row);
        self.keys.borrow_mut().intern(key)
    }

    fn free_entry(&mut self, entry: usize) {
        self.keys.borrow_mut().free_entry(entry);
    }
}

/// Pairs a left and a right interner over one shared key space, so a left
/// row and a right row with equal key values intern to the same entry.
pub trait JoinInterner {
    /// Binds both sides. Each resolver records that side's key fields as
    /// join-key dependencies.
    fn bind_to_schemas(
        &mut self,
        left: &mut dyn FieldResolver,
        right: &mut dyn FieldResolver,
    ) -> Result<()>;

    /// Releases bound field references and the shared key space.
    fn unbind(&mut self);

    fn intern_left(&mut self, row: usize) -> usize;

    fn intern_right(&mut self, row: usize) -> usize;
}

/// A `JoinInterner` over named key field lists, validating at bind that
/// the left and right key field types line up.
pub struct DynamicJoinInterner {
    left: FieldKeyInterner,
    right: FieldKeyInterner,
}

impl DynamicJoinInterner {
    /// Creates an interner over matching key name lists. The lists must be
    /// the same length; an empty list joins every row to every row through
    /// one constant key and is rejected as a configuration error.
    pub fn new(left_names: Vec<String>, right_names: Vec<String>) -> Result<Self> {
        if left_names.is_empty() {
            return Err(Error::invalid_config("join key field list is empty"));
        }
        if left_names.len() != right_names.len() {
            return Err(Error::invalid_config(format!(
                "join key field lists differ in length: left={}, right={}",
                left_names.len(),
                right_names.len()
            )));
        }
        let keys: SharedKeySpace = Rc::new(RefCell::new(Interner::new()));
        Ok(Self {
            left: FieldKeyInterner::new(left_names, keys.clone()),
            right: FieldKeyInterner::new(right_names, keys),
        })
    }

    pub fn into_boxed(self) -> Box<dyn JoinInterner> {
        Box::new(self)
    }
}

impl JoinInterner for DynamicJoinInterner {
    fn bind_to_schemas(
        &mut self,
        left: &mut dyn FieldResolver,
        right: &mut dyn FieldResolver,
    ) -> Result<()> {
        self.left.bind_to_schema(left)?;
        self.right.bind_to_schema(right)?;
        let left_types = self.left.bound_types();
        let right_types = self.right.bound_types();
        if left_types != right_types {
            self.left.unbind();
            self.right.unbind();
            return Err(Error::schema_mismatch(format!(
                "join key types don't match: left={:?}, right={:?}",
                left_types, right_types
            )));
        }
        Ok(())
    }

    fn unbind(&mut self) {
        self.left.unbind();
        self.right.unbind();
    }

    fn intern_left(&mut self, row: usize) -> usize {
        self.left.intern(row)
    }

    fn intern_right(&mut self, row: usize) -> usize {
        self.right.intern(row)
    }
}
