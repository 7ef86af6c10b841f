//! The explicit cast table between field accessor types.
//!
//! Every legal narrowing/widening pair is enumerated here; any pair not
//! listed is a `CastError`. Casts wrap the source accessor in an adapter,
//! so a cast field reads live values, not a snapshot.

use crate::error::{Error, Result};
use crate::field::{
    BoolField, ByteField, CharField, DoubleField, Field, FloatField, GenericField, IntField,
    LongField, ShortField, StrField,
};
use crate::types::FieldType;
use alloc::format;
use alloc::rc::Rc;
use core::fmt;

/// Casts to a boolean accessor. Numeric sources read as `!= 0`;
/// characters as `'T'` / `'t'`.
pub fn to_bool_field(field: &Field) -> Result<Rc<dyn BoolField>> {
    match field {
        Field::Bool(f) => Ok(f.clone()),
        Field::Byte(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) != 0))
        }
        Field::Short(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) != 0))
        }
        Field::Char(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| {
                matches!(f.value_at(row), 'T' | 't')
            }))
        }
        Field::Int(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) != 0))
        }
        other => Err(Error::cast_error(other.field_type(), FieldType::Bool)),
    }
}

/// Casts to a byte accessor.
pub fn to_byte_field(field: &Field) -> Result<Rc<dyn ByteField>> {
    match field {
        Field::Byte(f) => Ok(f.clone()),
        Field::Bool(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i8))
        }
        Field::Char(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as u32 as i8))
        }
        other => Err(Error::cast_error(other.field_type(), FieldType::Byte)),
    }
}

/// Casts to a short accessor.
pub fn to_short_field(field: &Field) -> Result<Rc<dyn ShortField>> {
    match field {
        Field::Short(f) => Ok(f.clone()),
        Field::Byte(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i16))
        }
        Field::Bool(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i16))
        }
        Field::Char(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as u32 as i16))
        }
        other => Err(Error::cast_error(other.field_type(), FieldType::Short)),
    }
}

/// Casts to a character accessor. Strings read their first character,
/// empty strings read `'\0'`.
pub fn to_char_field(field: &Field) -> Result<Rc<dyn CharField>> {
    match field {
        Field::Char(f) => Ok(f.clone()),
        Field::Byte(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as u8 as char))
        }
        Field::Short(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| {
                char::from_u32(f.value_at(row) as u16 as u32).unwrap_or('\0')
            }))
        }
        Field::Bool(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| {
                if f.value_at(row) {
                    'T'
                } else {
                    'F'
                }
            }))
        }
        Field::Str(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| {
                f.value_at(row).chars().next().unwrap_or('\0')
            }))
        }
        other => Err(Error::cast_error(other.field_type(), FieldType::Char)),
    }
}

/// Casts to an int accessor.
pub fn to_int_field(field: &Field) -> Result<Rc<dyn IntField>> {
    match field {
        Field::Int(f) => Ok(f.clone()),
        Field::Short(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i32))
        }
        Field::Byte(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i32))
        }
        Field::Char(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i32))
        }
        Field::Bool(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i32))
        }
        other => Err(Error::cast_error(other.field_type(), FieldType::Int)),
    }
}

/// Casts to a long accessor.
pub fn to_long_field(field: &Field) -> Result<Rc<dyn LongField>> {
    match field {
        Field::Long(f) => Ok(f.clone()),
        Field::Int(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i64))
        }
        Field::Short(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i64))
        }
        Field::Byte(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i64))
        }
        Field::Char(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i64))
        }
        Field::Bool(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i64))
        }
        other => Err(Error::cast_error(other.field_type(), FieldType::Long)),
    }
}

/// Casts to a float accessor.
pub fn to_float_field(field: &Field) -> Result<Rc<dyn FloatField>> {
    match field {
        Field::Float(f) => Ok(f.clone()),
        Field::Int(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as f32))
        }
        Field::Short(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as f32))
        }
        Field::Byte(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as f32))
        }
        Field::Bool(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i32 as f32))
        }
        other => Err(Error::cast_error(other.field_type(), FieldType::Float)),
    }
}

/// Casts to a double accessor.
pub fn to_double_field(field: &Field) -> Result<Rc<dyn DoubleField>> {
    match field {
        Field::Double(f) => Ok(f.clone()),
        Field::Float(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as f64))
        }
        Field::Long(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as f64))
        }
        Field::Int(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as f64))
        }
        Field::Short(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as f64))
        }
        Field::Byte(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as f64))
        }
        Field::Bool(f) => {
            let f = f.clone();
            Ok(Rc::new(move |row: usize| f.value_at(row) as i32 as f64))
        }
        other => Err(Error::cast_error(other.field_type(), FieldType::Double)),
    }
}

/// Casts to a string accessor. Every type renders through its display form.
pub fn to_str_field(field: &Field) -> Result<Rc<dyn StrField>> {
    Ok(str_adapter(field))
}

fn str_adapter(field: &Field) -> Rc<dyn StrField> {
    match field {
        Field::Str(f) => f.clone(),
        Field::Generic(f) => {
            let f = f.clone();
            Rc::new(move |row: usize| -> Rc<str> {
                Rc::from(format!("{}", f.value_at(row)))
            })
        }
        Field::Double(f) => {
            let f = f.clone();
            Rc::new(move |row: usize| -> Rc<str> {
                Rc::from(format!("{}", f.value_at(row)))
            })
        }
        Field::Float(f) => {
            let f = f.clone();
            Rc::new(move |row: usize| -> Rc<str> {
                Rc::from(format!("{}", f.value_at(row)))
            })
        }
        Field::Long(f) => {
            let f = f.clone();
            Rc::new(move |row: usize| -> Rc<str> {
                Rc::from(format!("{}", f.value_at(row)))
            })
        }
        Field::Int(f) => {
            let f = f.clone();
            Rc::new(move |row: usize| -> Rc<str> {
                Rc::from(format!("{}", f.value_at(row)))
            })
        }
        Field::Short(f) => {
            let f = f.clone();
            Rc::new(move |row: usize| -> Rc<str> {
                Rc::from(format!("{}", f.value_at(row)))
            })
        }
        Field::Byte(f) => {
            let f = f.clone();
            Rc::new(move |row: usize| -> Rc<str> {
                Rc::from(format!("{}", f.value_at(row)))
            })
        }
        Field::Bool(f) => {
            let f = f.clone();
            Rc::new(move |row: usize| -> Rc<str> {
                Rc::from(format!("{}", f.value_at(row)))
            })
        }
        Field::Char(f) => {
            let f = f.clone();
            Rc::new(move |row: usize| -> Rc<str> {
                Rc::from(format!("{}", f.value_at(row)))
            })
        }
    }
}

struct DisplayValue<T: fmt::Display>(T);

impl<T: fmt::Display> fmt::Display for DisplayValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Casts to a generic accessor; always legal.
pub fn to_generic_field(field: &Field) -> Rc<dyn GenericField> {
    match field {
        Field::Generic(f) => f.clone(),
        other => {
            let str_field = str_adapter(other);
            Rc::new(move |row: usize| -> Rc<dyn fmt::Display> {
                Rc::new(DisplayValue(str_field.value_at(row)))
            })
        }
    }
}
