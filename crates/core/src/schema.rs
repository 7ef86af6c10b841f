//! Schema definitions: named, typed, ordered field lists.
//!
//! A schema is immutable once published. When an operator's output
//! structure changes, the whole schema is replaced: subscribers first see
//! a `None` schema, then the replacement.

use crate::field::Field;
use crate::types::FieldType;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Optional per-field display/formatting attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Display precision hint for fractional values.
    pub precision: Option<u8>,
    /// Free-form tags (e.g. "currency", "quantity").
    pub tags: Vec<String>,
}

impl Metadata {
    /// Metadata with no attributes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns whether `tag` is present.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A named, typed field at a fixed position within a schema.
#[derive(Clone)]
pub struct SchemaField {
    field_id: usize,
    name: String,
    field: Field,
    metadata: Metadata,
}

impl SchemaField {
    /// Creates a schema field with empty metadata.
    pub fn new(field_id: usize, name: impl Into<String>, field: Field) -> Self {
        Self {
            field_id,
            name: name.into(),
            field,
            metadata: Metadata::empty(),
        }
    }

    /// Creates a schema field with metadata.
    pub fn with_metadata(
        field_id: usize,
        name: impl Into<String>,
        field: Field,
        metadata: Metadata,
    ) -> Self {
        Self {
            field_id,
            name: name.into(),
            field,
            metadata,
        }
    }

    /// Returns a copy of this field at a new position.
    pub fn at_field_id(&self, field_id: usize) -> Self {
        Self {
            field_id,
            name: self.name.clone(),
            field: self.field.clone(),
            metadata: self.metadata.clone(),
        }
    }

    #[inline]
    pub fn field_id(&self) -> usize {
        self.field_id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn field(&self) -> &Field {
        &self.field
    }

    #[inline]
    pub fn field_type(&self) -> FieldType {
        self.field.field_type()
    }

    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// An ordered, immutable list of named, typed fields.
///
/// Field ids are positions: `field_at(id)` is O(1) and `field_id ==
/// position` always holds. Name lookup is O(1) via an internal map.
pub struct Schema {
    name: String,
    fields: Vec<SchemaField>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    /// Creates a schema from ordered fields. Field ids must equal their
    /// positions; this is the caller's responsibility when assembling the
    /// field list.
    pub fn new(name: impl Into<String>, fields: Vec<SchemaField>) -> Rc<Self> {
        let mut by_name = HashMap::with_capacity(fields.len());
        for field in &fields {
            by_name.insert(String::from(field.name()), field.field_id());
        }
        Rc::new(Self {
            name: name.into(),
            fields,
            by_name,
        })
    }

    /// Returns the schema name (usually the operator name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of fields.
    pub fn size(&self) -> usize {
        self.fields.len()
    }

    /// Returns the field at `field_id`, if in range.
    pub fn field_at(&self, field_id: usize) -> Option<&SchemaField> {
        self.fields.get(field_id)
    }

    /// Returns the field named `name`, if present.
    pub fn maybe_field(&self, name: &str) -> Option<&SchemaField> {
        self.by_name.get(name).map(|id| &self.fields[*id])
    }

    /// Calls `action` for each field in field-id order.
    pub fn for_each_field(&self, mut action: impl FnMut(&SchemaField)) {
        for field in &self.fields {
            action(field);
        }
    }

    /// Returns the fields in field-id order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }
}

impl core::fmt::Debug for Schema {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Schema('{}', {} fields)", self.name, self.fields.len())
    }
}
