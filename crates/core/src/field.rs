//! Type-tagged columnar field accessors.
//!
//! A field is a read-only view over one column of an operator's output,
//! keyed by row id. Concrete accessors are trait objects so that a field
//! can be a storage column, a computed value, or a wrapper over another
//! operator's field. Closures of the right signature implement the accessor
//! traits directly.

use crate::types::FieldType;
use alloc::rc::Rc;
use core::fmt;

/// Sentinel row id meaning "no row" in sparse row-indexed structures.
pub const NO_ROW: usize = usize::MAX;

/// Boolean accessor.
pub trait BoolField {
    fn value_at(&self, row: usize) -> bool;
}

/// 8-bit integer accessor.
pub trait ByteField {
    fn value_at(&self, row: usize) -> i8;
}

/// 16-bit integer accessor.
pub trait ShortField {
    fn value_at(&self, row: usize) -> i16;
}

/// Character accessor.
pub trait CharField {
    fn value_at(&self, row: usize) -> char;
}

/// 32-bit integer accessor.
pub trait IntField {
    fn value_at(&self, row: usize) -> i32;
}

/// 64-bit integer accessor.
pub trait LongField {
    fn value_at(&self, row: usize) -> i64;
}

/// 32-bit float accessor.
pub trait FloatField {
    fn value_at(&self, row: usize) -> f32;
}

/// 64-bit float accessor.
pub trait DoubleField {
    fn value_at(&self, row: usize) -> f64;
}

/// String accessor. Values are shared, immutable strings.
pub trait StrField {
    fn value_at(&self, row: usize) -> Rc<str>;
}

/// Opaque accessor; values are exposed through their display form.
pub trait GenericField {
    fn value_at(&self, row: usize) -> Rc<dyn fmt::Display>;
}

macro_rules! closure_field_impl {
    ($trait_name:ident, $value:ty) => {
        impl<F: Fn(usize) -> $value> $trait_name for F {
            fn value_at(&self, row: usize) -> $value {
                self(row)
            }
        }
    };
}

closure_field_impl!(BoolField, bool);
closure_field_impl!(ByteField, i8);
closure_field_impl!(ShortField, i16);
closure_field_impl!(CharField, char);
closure_field_impl!(IntField, i32);
closure_field_impl!(LongField, i64);
closure_field_impl!(FloatField, f32);
closure_field_impl!(DoubleField, f64);
closure_field_impl!(StrField, Rc<str>);
closure_field_impl!(GenericField, Rc<dyn fmt::Display>);

/// A field accessor tagged with its type.
#[derive(Clone)]
pub enum Field {
    Bool(Rc<dyn BoolField>),
    Byte(Rc<dyn ByteField>),
    Short(Rc<dyn ShortField>),
    Char(Rc<dyn CharField>),
    Int(Rc<dyn IntField>),
    Long(Rc<dyn LongField>),
    Float(Rc<dyn FloatField>),
    Double(Rc<dyn DoubleField>),
    Str(Rc<dyn StrField>),
    Generic(Rc<dyn GenericField>),
}

impl Field {
    /// Returns the type tag of this field.
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Bool(_) => FieldType::Bool,
            Field::Byte(_) => FieldType::Byte,
            Field::Short(_) => FieldType::Short,
            Field::Char(_) => FieldType::Char,
            Field::Int(_) => FieldType::Int,
            Field::Long(_) => FieldType::Long,
            Field::Float(_) => FieldType::Float,
            Field::Double(_) => FieldType::Double,
            Field::Str(_) => FieldType::Str,
            Field::Generic(_) => FieldType::Generic,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({})", self.field_type())
    }
}

/// Returns the shared field whose value at any row is the row id itself.
pub fn row_identity_field() -> Field {
    Field::Int(Rc::new(|row: usize| row as i32))
}

/// Maps an output row to the source row backing it, if any.
///
/// Used to read fields of one row space through another (e.g. a joined
/// output row reading its matched right-side row, or a group reading a
/// representative member row).
pub trait RowMapper {
    fn source_row_of(&self, row: usize) -> Option<usize>;
}

impl<F: Fn(usize) -> Option<usize>> RowMapper for F {
    fn source_row_of(&self, row: usize) -> Option<usize> {
        self(row)
    }
}

struct NullDisplay;

impl fmt::Display for NullDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null")
    }
}

/// Wraps `field` so reads go through `mapper` first.
///
/// When the mapper resolves no source row, the read yields the type's
/// default value (zero, false, empty string, "null" display).
pub fn mapped_field(field: &Field, mapper: Rc<dyn RowMapper>) -> Field {
    match field {
        Field::Bool(src) => {
            let src = src.clone();
            Field::Bool(Rc::new(move |row: usize| {
                mapper.source_row_of(row).map(|r| src.value_at(r)).unwrap_or(false)
            }))
        }
        Field::Byte(src) => {
            let src = src.clone();
            Field::Byte(Rc::new(move |row: usize| {
                mapper.source_row_of(row).map(|r| src.value_at(r)).unwrap_or(0)
            }))
        }
        Field::Short(src) => {
            let src = src.clone();
            Field::Short(Rc::new(move |row: usize| {
                mapper.source_row_of(row).map(|r| src.value_at(r)).unwrap_or(0)
            }))
        }
        Field::Char(src) => {
            let src = src.clone();
            Field::Char(Rc::new(move |row: usize| {
                mapper.source_row_of(row).map(|r| src.value_at(r)).unwrap_or('\0')
            }))
        }
        Field::Int(src) => {
            let src = src.clone();
            Field::Int(Rc::new(move |row: usize| {
                mapper.source_row_of(row).map(|r| src.value_at(r)).unwrap_or(0)
            }))
        }
        Field::Long(src) => {
            let src = src.clone();
            Field::Long(Rc::new(move |row: usize| {
                mapper.source_row_of(row).map(|r| src.value_at(r)).unwrap_or(0)
            }))
        }
        Field::Float(src) => {
            let src = src.clone();
            Field::Float(Rc::new(move |row: usize| {
                mapper.source_row_of(row).map(|r| src.value_at(r)).unwrap_or(0.0)
            }))
        }
        Field::Double(src) => {
            let src = src.clone();
            Field::Double(Rc::new(move |row: usize| {
                mapper.source_row_of(row).map(|r| src.value_at(r)).unwrap_or(0.0)
            }))
        }
        Field::Str(src) => {
            let src = src.clone();
            Field::Str(Rc::new(move |row: usize| {
                mapper
                    .source_row_of(row)
                    .map(|r| src.value_at(r))
                    .unwrap_or_else(|| Rc::from(""))
            }))
        }
        Field::Generic(src) => {
            let src = src.clone();
            Field::Generic(Rc::new(move |row: usize| -> Rc<dyn fmt::Display> {
                match mapper.source_row_of(row) {
                    Some(r) => src.value_at(r),
                    None => Rc::new(NullDisplay),
                }
            }))
        }
    }
}
