//! Field type tags for the Trellis schema model.

/// The closed set of primitive field types an operator can publish.
///
/// Every field in a schema carries exactly one of these tags; dispatch on
/// field type is always over this enum, never reflective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Boolean (true/false)
    Bool,
    /// 8-bit signed integer
    Byte,
    /// 16-bit signed integer
    Short,
    /// Single character
    Char,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// UTF-8 string
    Str,
    /// Opaque value rendered through its display form
    Generic,
}

impl FieldType {
    /// Returns the display name of this type tag.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Bool => "Bool",
            FieldType::Byte => "Byte",
            FieldType::Short => "Short",
            FieldType::Char => "Char",
            FieldType::Int => "Int",
            FieldType::Long => "Long",
            FieldType::Float => "Float",
            FieldType::Double => "Double",
            FieldType::Str => "Str",
            FieldType::Generic => "Generic",
        }
    }

    /// Returns whether this type holds an integral value.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            FieldType::Byte | FieldType::Short | FieldType::Int | FieldType::Long
        )
    }

    /// Returns whether this type holds a numeric value.
    pub fn is_numeric(&self) -> bool {
        self.is_integral() || matches!(self, FieldType::Float | FieldType::Double)
    }
}

impl core::fmt::Display for FieldType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(FieldType::Bool.name(), "Bool");
        assert_eq!(FieldType::Generic.name(), "Generic");
    }

    #[test]
    fn test_integral_and_numeric() {
        assert!(FieldType::Byte.is_integral());
        assert!(FieldType::Long.is_integral());
        assert!(!FieldType::Float.is_integral());
        assert!(FieldType::Float.is_numeric());
        assert!(FieldType::Double.is_numeric());
        assert!(!FieldType::Str.is_numeric());
        assert!(!FieldType::Generic.is_numeric());
    }
}
