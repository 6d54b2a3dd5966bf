use std::cmp::Ordering;
use std::fmt;

use crate::error::{JMapError, Result};

/// Data types supported by the BCSV format
///
/// The discriminant is the type tag stored in field descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// Signed 32-bit integer (4 bytes)
    Int32 = 0,
    /// Inline string (32 bytes fixed). Deprecated by the games themselves
    EmbeddedString = 1,
    /// 32-bit floating point (4 bytes)
    Float32 = 2,
    /// Second 32-bit integer type, stored and read like `Int32` (4 bytes)
    Int32Alt = 3,
    /// Signed 16-bit integer (2 bytes)
    Int16 = 4,
    /// Signed 8-bit integer (1 byte)
    Int8 = 5,
    /// String stored in the string pool (4 byte offset)
    StringOffset = 6,
}

/// Kind of value a field holds in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    String,
}

impl ValueKind {
    /// Get the kind name for error messages
    pub const fn name(&self) -> &'static str {
        match self {
            ValueKind::Int => "Int",
            ValueKind::Float => "Float",
            ValueKind::String => "String",
        }
    }
}

impl FieldType {
    /// All field types in tag order
    pub const ALL: [FieldType; 7] = [
        FieldType::Int32,
        FieldType::EmbeddedString,
        FieldType::Float32,
        FieldType::Int32Alt,
        FieldType::Int16,
        FieldType::Int8,
        FieldType::StringOffset,
    ];

    /// Size in bytes for this field type
    pub const fn size(&self) -> usize {
        match self {
            FieldType::Int32 => 4,
            FieldType::EmbeddedString => 32,
            FieldType::Float32 => 4,
            FieldType::Int32Alt => 4,
            FieldType::Int16 => 2,
            FieldType::Int8 => 1,
            FieldType::StringOffset => 4,
        }
    }

    /// Default bitmask for this field type, all ones at the storage width
    pub const fn default_mask(&self) -> u32 {
        match self {
            FieldType::EmbeddedString => 0x00000000,
            FieldType::Int16 => 0x0000FFFF,
            FieldType::Int8 => 0x000000FF,
            _ => 0xFFFFFFFF,
        }
    }

    /// Sorting order for field layout (used when calculating offsets)
    pub const fn order(&self) -> u8 {
        match self {
            FieldType::EmbeddedString => 0,
            FieldType::Float32 => 1,
            FieldType::Int32 => 2,
            FieldType::Int32Alt => 3,
            FieldType::Int16 => 4,
            FieldType::Int8 => 5,
            FieldType::StringOffset => 6,
        }
    }

    /// The in-memory value kind of this field type
    pub const fn value_kind(&self) -> ValueKind {
        match self {
            FieldType::Int32 | FieldType::Int32Alt | FieldType::Int16 | FieldType::Int8 => {
                ValueKind::Int
            }
            FieldType::Float32 => ValueKind::Float,
            FieldType::EmbeddedString | FieldType::StringOffset => ValueKind::String,
        }
    }

    /// Type tag written to field descriptors
    pub const fn tag(&self) -> i8 {
        *self as u8 as i8
    }

    /// Parse field type from a descriptor type tag
    pub fn from_tag(tag: i8) -> Result<Self> {
        usize::try_from(tag)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(JMapError::InvalidFieldType(tag))
    }

    /// Get the name of this field type for CSV export
    pub const fn csv_name(&self) -> &'static str {
        match self {
            FieldType::Int32 => "Int",
            FieldType::EmbeddedString => "EmbeddedString",
            FieldType::Float32 => "Float",
            FieldType::Int32Alt => "Int2",
            FieldType::Int16 => "Short",
            FieldType::Int8 => "Char",
            FieldType::StringOffset => "String",
        }
    }

    /// Default text written after the type in a CSV descriptor
    pub const fn csv_default(&self) -> &'static str {
        match self {
            FieldType::Float32 => "0.0",
            _ => "0",
        }
    }

    /// Parse field type from CSV name
    pub fn from_csv_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.csv_name() == name)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.csv_name())
    }
}

/// A value that can be stored in a JMap field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Integer value (for Int32, Int32Alt, Int16, Int8)
    Int(i32),
    /// Floating point value
    Float(f32),
    /// String value (for EmbeddedString or StringOffset)
    String(String),
}

impl FieldValue {
    /// Get the default value for a field type
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type.value_kind() {
            ValueKind::Int => FieldValue::Int(0),
            ValueKind::Float => FieldValue::Float(0.0),
            ValueKind::String => FieldValue::String(String::new()),
        }
    }

    /// The kind of this value
    pub const fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Int(_) => ValueKind::Int,
            FieldValue::Float(_) => ValueKind::Float,
            FieldValue::String(_) => ValueKind::String,
        }
    }

    /// Check if this value is compatible with a field type
    pub fn is_compatible_with(&self, field_type: FieldType) -> bool {
        self.kind() == field_type.value_kind()
    }

    /// Get as integer, if this is an Int value
    pub fn as_int(&self) -> Option<i32> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as float, if this is a Float value
    pub fn as_float(&self) -> Option<f32> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string reference, if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Total order used when sorting entries by a field
    ///
    /// Values of different kinds order by kind, floats use IEEE total order
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => a.cmp(b),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.total_cmp(b),
            (FieldValue::String(a), FieldValue::String(b)) => a.cmp(b),
            _ => (self.kind() as u8).cmp(&(other.kind() as u8)),
        }
    }
}

impl fmt::Display for FieldValue {
    /// Canonical text form, floats always carry a fractional part
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

/// Definition of a field (column) in a BCSV
///
/// Fields are only created by their container; the name is resolved
/// through the container's hash table on demand
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    hash: u32,
    field_type: FieldType,
    mask: u32,
    shift: i8,
    offset: u16,
    default: FieldValue,
}

impl Field {
    pub(crate) fn new(
        hash: u32,
        field_type: FieldType,
        mask: u32,
        shift: i8,
        default: FieldValue,
    ) -> Result<Self> {
        check_shift(shift)?;

        Ok(Self {
            hash,
            field_type,
            mask,
            shift,
            offset: 0,
            default,
        })
    }

    /// Hash of the field name
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Data type of the field
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Bitmask for the field value
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Bit shift amount
    pub fn shift(&self) -> i8 {
        self.shift
    }

    /// Offset within an entry, as decoded or last laid out
    pub fn offset(&self) -> u16 {
        self.offset
    }

    /// Default value for new entries
    pub fn default_value(&self) -> &FieldValue {
        &self.default
    }

    /// Size of this field in bytes
    pub fn size(&self) -> usize {
        self.field_type.size()
    }

    pub(crate) fn set_offset(&mut self, offset: u16) {
        self.offset = offset;
    }
}

/// Shifts move bits within one 32-bit word
pub(crate) fn check_shift(shift: i8) -> Result<()> {
    if (0..32).contains(&shift) {
        Ok(())
    } else {
        Err(JMapError::InvalidShift(shift))
    }
}
