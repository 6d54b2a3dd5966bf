//! Entry (row) implementation for JMap containers

use std::ops::Deref;

use indexmap::IndexMap;

use crate::error::{JMapError, Result};
use crate::field::FieldValue;
use crate::hash::{HashTable, hash_placeholder};

/// A key that can be used to access fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    /// Access by hash value
    Hash(u32),
    /// Access by field name (will be hashed)
    Name(String),
}

impl FieldKey {
    /// Resolve this key to a hash with the given hash table
    pub fn to_hash<H: HashTable>(&self, hash_table: &H) -> u32 {
        match self {
            FieldKey::Hash(hash) => *hash,
            FieldKey::Name(name) => hash_table.calc(name),
        }
    }

    /// Human readable form for error messages
    pub fn describe(&self) -> String {
        match self {
            FieldKey::Hash(hash) => hash_placeholder(*hash),
            FieldKey::Name(name) => name.clone(),
        }
    }
}

impl From<u32> for FieldKey {
    fn from(hash: u32) -> Self {
        FieldKey::Hash(hash)
    }
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        FieldKey::Name(name.to_string())
    }
}

impl From<String> for FieldKey {
    fn from(name: String) -> Self {
        FieldKey::Name(name)
    }
}

/// An entry (row) in a JMap container
///
/// The key set always equals the container's field set. Keys are only added
/// and removed by the container, values can be replaced in place as long as
/// the kind stays the same.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Data stored as hash -> value mappings, in field declaration order
    data: IndexMap<u32, FieldValue>,
}

impl Entry {
    /// Create an entry with pre-allocated capacity
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            data: IndexMap::with_capacity(capacity),
        }
    }

    /// Get a value by hash
    pub fn get_by_hash(&self, hash: u32) -> Option<&FieldValue> {
        self.data.get(&hash)
    }

    /// Get a value by name, using the provided hash table
    pub fn get<H: HashTable>(&self, hash_table: &H, name: &str) -> Option<&FieldValue> {
        self.get_by_hash(hash_table.calc(name))
    }

    /// Get an integer value by hash
    pub fn get_int_by_hash(&self, hash: u32) -> Option<i32> {
        self.get_by_hash(hash).and_then(|v| v.as_int())
    }

    /// Get an integer value by name
    pub fn get_int<H: HashTable>(&self, hash_table: &H, name: &str) -> Option<i32> {
        self.get(hash_table, name).and_then(|v| v.as_int())
    }

    /// Get a float value by hash
    pub fn get_float_by_hash(&self, hash: u32) -> Option<f32> {
        self.get_by_hash(hash).and_then(|v| v.as_float())
    }

    /// Get a float value by name
    pub fn get_float<H: HashTable>(&self, hash_table: &H, name: &str) -> Option<f32> {
        self.get(hash_table, name).and_then(|v| v.as_float())
    }

    /// Get a string value by hash
    pub fn get_string_by_hash(&self, hash: u32) -> Option<&str> {
        self.get_by_hash(hash).and_then(|v| v.as_str())
    }

    /// Get a string value by name
    pub fn get_string<H: HashTable>(&self, hash_table: &H, name: &str) -> Option<&str> {
        self.get(hash_table, name).and_then(|v| v.as_str())
    }

    /// Replace a value by hash
    ///
    /// # Errors
    /// - `JMapError::UnknownField` if the entry has no value for the hash
    /// - `JMapError::TypeMismatch` if the value kind differs from the stored kind
    pub fn set_by_hash(&mut self, hash: u32, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        let slot = self
            .data
            .get_mut(&hash)
            .ok_or_else(|| JMapError::UnknownField(hash_placeholder(hash)))?;

        if slot.kind() != value.kind() {
            return Err(JMapError::TypeMismatch {
                expected: slot.type_name(),
                got: value.type_name(),
            });
        }

        *slot = value;
        Ok(())
    }

    /// Replace a value by name, using the provided hash table
    pub fn set<H: HashTable>(
        &mut self,
        hash_table: &H,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<()> {
        let hash = hash_table.calc(name);
        self.set_by_hash(hash, value).map_err(|err| match err {
            JMapError::UnknownField(_) => JMapError::UnknownField(name.to_string()),
            other => other,
        })
    }

    /// Check if this entry contains a field by hash
    pub fn contains_hash(&self, hash: u32) -> bool {
        self.data.contains_key(&hash)
    }

    /// Check if this entry contains a field by name
    pub fn contains<H: HashTable>(&self, hash_table: &H, name: &str) -> bool {
        self.contains_hash(hash_table.calc(name))
    }

    /// Get the number of fields in this entry
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if this entry is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over all hash-value pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (&u32, &FieldValue)> {
        self.data.iter()
    }

    /// Insert or overwrite a value without schema checks
    pub(crate) fn insert(&mut self, hash: u32, value: FieldValue) {
        self.data.insert(hash, value);
    }

    /// Remove a key, keeping the order of the remaining ones
    pub(crate) fn remove(&mut self, hash: u32) {
        self.data.shift_remove(&hash);
    }
}

/// Mutable handle to an entry held by a container
///
/// Values can be replaced through the `set` methods, the entry itself
/// cannot be swapped for another one
#[derive(Debug)]
pub struct EntryMut<'a>(pub(crate) &'a mut Entry);

impl EntryMut<'_> {
    /// Replace a value by hash, see [`Entry::set_by_hash`]
    pub fn set_by_hash(&mut self, hash: u32, value: impl Into<FieldValue>) -> Result<()> {
        self.0.set_by_hash(hash, value)
    }

    /// Replace a value by name, see [`Entry::set`]
    pub fn set<H: HashTable>(
        &mut self,
        hash_table: &H,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<()> {
        self.0.set(hash_table, name, value)
    }
}

impl Deref for EntryMut<'_> {
    type Target = Entry;

    fn deref(&self) -> &Entry {
        self.0
    }
}
