use indexmap::IndexMap;

use crate::entry::{Entry, EntryMut, FieldKey};
use crate::error::{JMapError, Result};
use crate::field::{Field, FieldType, FieldValue};
use crate::hash::HashTable;

/// The main JMap that holds fields and entries. So basically the in-memory representation of a BCSV file
///
/// This is a table-like structure where each field represents a column
/// and each entry represents a row of data. Every entry holds exactly one
/// value per field; field operations on the container keep all entries in sync.
///
/// The reverse-engineered format is documented on [this page](https://www.lumasworkshop.com/wiki/BCSV_(File_format))
#[derive(Debug, Clone)]
pub struct JMapInfo<H: HashTable> {
    /// The hash table used for field name lookups
    hash_table: H,
    /// Fields indexed by their hash, in declaration order
    fields: IndexMap<u32, Field>,
    /// List of entries
    entries: Vec<Entry>,
    /// Size of a single entry in bytes
    entry_size: u32,
}

impl<H: HashTable> JMapInfo<H> {
    /// Create a new empty JMapInfo with the given hash table
    ///
    /// # Arguments
    /// - `hash_table` - The hash table to use for field name lookups
    pub fn new(hash_table: H) -> Self {
        Self {
            hash_table,
            fields: IndexMap::new(),
            entries: Vec::new(),
            entry_size: 0,
        }
    }

    /// Container for a decoded table, keeping the stored offsets and stride
    ///
    /// # Errors
    /// - `JMapError::DuplicateField` if two descriptors share a hash
    pub(crate) fn with_layout(hash_table: H, fields: Vec<Field>, entry_size: u32) -> Result<Self> {
        let mut jmap = Self::new(hash_table);

        for field in fields {
            let hash = field.hash();
            if jmap.fields.contains_key(&hash) {
                return Err(JMapError::DuplicateField(jmap.field_name(hash)));
            }
            jmap.fields.insert(hash, field);
        }

        jmap.entry_size = entry_size;
        Ok(jmap)
    }

    /// Get a reference to the hash table
    pub fn hash_table(&self) -> &H {
        &self.hash_table
    }

    /// Get a mutable reference to the hash table
    pub fn hash_table_mut(&mut self) -> &mut H {
        &mut self.hash_table
    }

    /// Get the number of fields (columns)
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Get the number of entries (rows)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if entries are empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an iterator over all fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Get an iterator over all field hashes in declaration order
    pub fn field_hashes(&self) -> impl Iterator<Item = &u32> {
        self.fields.keys()
    }

    /// Get a field by hash or name
    pub fn get_field(&self, key: impl Into<FieldKey>) -> Option<&Field> {
        let hash = key.into().to_hash(&self.hash_table);
        self.fields.get(&hash)
    }

    /// Check if a field exists by hash or name
    pub fn contains_field(&self, key: impl Into<FieldKey>) -> bool {
        self.get_field(key).is_some()
    }

    /// Get the name of a field by its hash
    pub fn field_name(&self, hash: u32) -> String {
        self.hash_table.resolve(hash)
    }

    /// Create a new field with the given name and type, using the type's
    /// default mask and no shift
    ///
    /// # Arguments
    /// - `name` - The name of the field to create
    /// - `field_type` - The type of the field to create
    /// - `default` - The default value, also assigned to every existing entry
    ///
    /// # Errors
    /// - `JMapError::TypeMismatch` if the default value is not compatible with the field type
    /// - `JMapError::DuplicateField` if a field with the same hash already exists
    /// - `JMapError::EntryTooLarge` if the new layout does not fit 16-bit offsets
    ///
    /// # Returns
    /// The hash of the new field
    pub fn create_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        default: impl Into<FieldValue>,
    ) -> Result<u32> {
        self.create_bitfield(name, field_type, default, None, 0)
    }

    /// Create a new field with explicit packing parameters
    ///
    /// `mask: None` selects the type's default mask
    pub fn create_bitfield(
        &mut self,
        name: &str,
        field_type: FieldType,
        default: impl Into<FieldValue>,
        mask: Option<u32>,
        shift: i8,
    ) -> Result<u32> {
        let default = default.into();
        if !default.is_compatible_with(field_type) {
            return Err(JMapError::TypeMismatch {
                expected: field_type.value_kind().name(),
                got: default.type_name(),
            });
        }

        let hash = self.hash_table.register(name)?;

        if self.fields.contains_key(&hash) {
            return Err(JMapError::DuplicateField(name.to_string()));
        }

        let mask = mask.unwrap_or_else(|| field_type.default_mask());
        let field = Field::new(hash, field_type, mask, shift, default)?;
        self.insert_field(field)?;

        Ok(hash)
    }

    /// Remove a field from the container and its value from every entry
    ///
    /// # Arguments
    /// - `key` - The hash or name of the field to remove
    ///
    /// # Errors
    /// - `JMapError::UnknownField` if the field does not exist
    ///
    /// # Returns
    /// The detached field
    pub fn drop_field(&mut self, key: impl Into<FieldKey>) -> Result<Field> {
        let key = key.into();
        let hash = key.to_hash(&self.hash_table);
        let index = self
            .fields
            .get_index_of(&hash)
            .ok_or_else(|| JMapError::UnknownField(key.describe()))?;

        let (offsets, entry_size) =
            compute_layout(self.fields.values().filter(|f| f.hash() != hash))?;

        let (_, field) = self
            .fields
            .shift_remove_index(index)
            .ok_or_else(|| JMapError::UnknownField(key.describe()))?;

        for entry in &mut self.entries {
            entry.remove(hash);
        }
        self.apply_layout(offsets, entry_size);

        Ok(field)
    }

    /// Get a slice of all entries
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Get an entry by index
    pub fn entry(&self, index: usize) -> Result<&Entry> {
        let len = self.entries.len();
        self.entries
            .get(index)
            .ok_or(JMapError::IndexOutOfRange { index, len })
    }

    /// Get a mutable handle to an entry by index
    pub fn entry_mut(&mut self, index: usize) -> Result<EntryMut<'_>> {
        let len = self.entries.len();
        self.entries
            .get_mut(index)
            .map(EntryMut)
            .ok_or(JMapError::IndexOutOfRange { index, len })
    }

    /// Create a new entry with default values for all fields and append it
    pub fn create_entry(&mut self) -> EntryMut<'_> {
        let mut entry = Entry::with_capacity(self.fields.len());

        for field in self.fields.values() {
            entry.insert(field.hash(), field.default_value().clone());
        }

        let index = self.entries.len();
        self.entries.push(entry);
        EntryMut(&mut self.entries[index])
    }

    /// Remove an entry by index
    ///
    /// # Errors
    /// - `JMapError::IndexOutOfRange` if the index is out of bounds
    ///
    /// # Returns
    /// The detached entry
    pub fn remove_entry(&mut self, index: usize) -> Result<Entry> {
        if index >= self.entries.len() {
            return Err(JMapError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }

        Ok(self.entries.remove(index))
    }

    /// Clear all entries but keep the field definitions
    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }

    /// Sort entries by a custom key function
    ///
    /// The sort is stable in both directions: entries with equal keys keep
    /// their relative order even when `reverse` is set
    pub fn sort_entries_by<F, K>(&mut self, mut f: F, reverse: bool)
    where
        F: FnMut(&Entry) -> K,
        K: Ord,
    {
        if reverse {
            self.entries.sort_by(|a, b| f(b).cmp(&f(a)));
        } else {
            self.entries.sort_by_key(f);
        }
    }

    /// Sort entries by the value of one field
    ///
    /// # Errors
    /// - `JMapError::UnknownField` if the field does not exist
    pub fn sort_entries_by_field(&mut self, key: impl Into<FieldKey>, reverse: bool) -> Result<()> {
        let key = key.into();
        let hash = key.to_hash(&self.hash_table);
        if !self.fields.contains_key(&hash) {
            return Err(JMapError::UnknownField(key.describe()));
        }

        self.entries.sort_by(|a, b| {
            let (a, b) = if reverse { (b, a) } else { (a, b) };
            match (a.get_by_hash(hash), b.get_by_hash(hash)) {
                (Some(a), Some(b)) => a.total_cmp(b),
                _ => std::cmp::Ordering::Equal,
            }
        });

        Ok(())
    }

    /// Deep copy of fields and entries
    ///
    /// The hash table is cloned as a handle; with a [`NameRegistry`](crate::hash::NameRegistry)
    /// both containers keep resolving names through the same lookup
    pub fn copy(&self) -> Self
    where
        H: Clone,
    {
        self.clone()
    }

    /// Iterate over entries
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Iterate over mutable entry handles
    pub fn iter_mut(&mut self) -> impl Iterator<Item = EntryMut<'_>> {
        self.entries.iter_mut().map(EntryMut)
    }

    /// Size of a single entry in bytes
    ///
    /// A decoded table keeps the stride and offsets it was stored with;
    /// adding or dropping a field lays all fields out again
    pub fn entry_size(&self) -> u32 {
        self.entry_size
    }

    /// Lay all fields out from scratch, replacing a layout read from a buffer
    pub fn recalculate_offsets(&mut self) -> Result<u32> {
        let (offsets, entry_size) = compute_layout(self.fields.values())?;
        self.apply_layout(offsets, entry_size);
        Ok(entry_size)
    }

    /// Add a field parsed from a CSV header
    pub(crate) fn push_field(&mut self, field: Field) -> Result<()> {
        if self.fields.contains_key(&field.hash()) {
            return Err(JMapError::DuplicateField(self.field_name(field.hash())));
        }

        self.insert_field(field)
    }

    /// Append an entry built by a reader, which fills in every field
    pub(crate) fn push_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    fn insert_field(&mut self, field: Field) -> Result<()> {
        let (offsets, entry_size) =
            compute_layout(self.fields.values().chain(std::iter::once(&field)))?;
        let hash = field.hash();

        for entry in &mut self.entries {
            entry.insert(hash, field.default_value().clone());
        }

        self.fields.insert(hash, field);
        self.apply_layout(offsets, entry_size);
        Ok(())
    }

    fn apply_layout(&mut self, offsets: Vec<u16>, entry_size: u32) {
        for (field, offset) in self.fields.values_mut().zip(offsets) {
            field.set_offset(offset);
        }
        self.entry_size = entry_size;
    }
}

/// Lay out fields by type order and align the entry size to 4 bytes
///
/// Fields of the same type keep their declaration order. The returned
/// offsets are in declaration order.
fn compute_layout<'a>(fields: impl Iterator<Item = &'a Field>) -> Result<(Vec<u16>, u32)> {
    let fields: Vec<&Field> = fields.collect();

    let mut sorted: Vec<usize> = (0..fields.len()).collect();
    sorted.sort_by_key(|&i| fields[i].field_type().order());

    let mut offsets = vec![0u16; fields.len()];
    let mut current_offset = 0usize;
    for i in sorted {
        offsets[i] = u16::try_from(current_offset)
            .map_err(|_| JMapError::EntryTooLarge(current_offset))?;
        current_offset += fields[i].size();
    }

    let entry_size = (current_offset + 3) & !3;
    let entry_size = u32::try_from(entry_size).map_err(|_| JMapError::EntryTooLarge(entry_size))?;

    Ok((offsets, entry_size))
}

/// Implement IntoIterator for JMapInfo to allow iterating over entries directly
impl<H: HashTable> IntoIterator for JMapInfo<H> {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, H: HashTable> IntoIterator for &'a JMapInfo<H> {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<'a, H: HashTable> IntoIterator for &'a mut JMapInfo<H> {
    type Item = EntryMut<'a>;
    type IntoIter =
        std::iter::Map<std::slice::IterMut<'a, Entry>, fn(&'a mut Entry) -> EntryMut<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter_mut().map(EntryMut as fn(&'a mut Entry) -> EntryMut<'a>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashAlgorithm, NameRegistry, calc_jgadget_hash};

    fn jmap() -> JMapInfo<NameRegistry> {
        JMapInfo::new(NameRegistry::new(HashAlgorithm::JGadget))
    }

    #[test]
    fn test_create_field_backfills_entries() {
        let mut jmap = jmap();
        jmap.create_field("id", FieldType::Int32, 0).unwrap();
        jmap.create_entry();
        jmap.create_entry().set_by_hash(calc_jgadget_hash("id"), 4).unwrap();

        let hash = jmap.create_field("name", FieldType::StringOffset, "none").unwrap();
        assert_eq!(hash, calc_jgadget_hash("name"));
        assert_eq!(jmap.field_name(hash), "name");

        for entry in &jmap {
            assert_eq!(entry.len(), 2);
            assert_eq!(entry.get_string_by_hash(hash), Some("none"));
        }
        assert_eq!(jmap.entry(1).unwrap().get_int(jmap.hash_table(), "id"), Some(4));
    }

    #[test]
    fn test_create_field_errors() {
        let mut jmap = jmap();
        jmap.create_field("id", FieldType::Int32, 0).unwrap();

        assert!(matches!(
            jmap.create_field("id", FieldType::Int16, 0),
            Err(JMapError::DuplicateField(name)) if name == "id"
        ));
        assert!(matches!(
            jmap.create_field("speed", FieldType::Float32, 1),
            Err(JMapError::TypeMismatch { expected: "Float", got: "Int" })
        ));
        assert!(matches!(
            jmap.create_bitfield("flag", FieldType::Int32, 0, Some(1), 40),
            Err(JMapError::InvalidShift(40))
        ));
        assert_eq!(jmap.num_fields(), 1);
    }

    #[test]
    fn test_create_bitfield_mask() {
        let mut jmap = jmap();
        jmap.create_bitfield("flags", FieldType::Int32, 0, Some(0xF0), 4).unwrap();
        jmap.create_bitfield("other", FieldType::Int16, 0, None, 0).unwrap();

        let flags = jmap.get_field("flags").unwrap();
        assert_eq!(flags.mask(), 0xF0);
        assert_eq!(flags.shift(), 4);
        assert_eq!(jmap.get_field("other").unwrap().mask(), 0x0000FFFF);
    }

    #[test]
    fn test_drop_field() {
        let mut jmap = jmap();
        jmap.create_field("a", FieldType::Int32, 0).unwrap();
        let b = jmap.create_field("b", FieldType::Float32, 0.0f32).unwrap();
        jmap.create_field("c", FieldType::Int8, 0).unwrap();
        jmap.create_entry();

        let dropped = jmap.drop_field("a").unwrap();
        assert_eq!(dropped.field_type(), FieldType::Int32);
        jmap.drop_field(b).unwrap();

        assert_eq!(jmap.num_fields(), 1);
        assert_eq!(jmap.entries()[0].len(), 1);
        assert!(jmap.contains_field("c"));

        assert!(matches!(jmap.drop_field("a"), Err(JMapError::UnknownField(name)) if name == "a"));
        assert!(matches!(
            jmap.drop_field(0xDEADBEEFu32),
            Err(JMapError::UnknownField(name)) if name == "[DEADBEEF]"
        ));
    }

    #[test]
    fn test_drop_field_keeps_declaration_order() {
        let mut jmap = jmap();
        for name in ["a", "b", "c", "d"] {
            jmap.create_field(name, FieldType::Int32, 0).unwrap();
        }
        jmap.drop_field("b").unwrap();

        let names: Vec<String> = jmap.fields().map(|f| jmap.field_name(f.hash())).collect();
        assert_eq!(names, ["a", "c", "d"]);
    }

    #[test]
    fn test_entries() {
        let mut jmap = jmap();
        let id = jmap.create_field("id", FieldType::Int32, 0).unwrap();
        for i in 0..3 {
            jmap.create_entry().set_by_hash(id, i).unwrap();
        }

        let removed = jmap.remove_entry(1).unwrap();
        assert_eq!(removed.get_int_by_hash(calc_jgadget_hash("id")), Some(1));
        assert!(matches!(
            jmap.remove_entry(5),
            Err(JMapError::IndexOutOfRange { index: 5, len: 2 })
        ));
        assert!(matches!(jmap.entry(2), Err(JMapError::IndexOutOfRange { .. })));

        jmap.clear_entries();
        assert!(jmap.is_empty());
        assert_eq!(jmap.num_fields(), 1);
    }

    #[test]
    fn test_sort_entries_is_stable() {
        let mut jmap = jmap();
        let group = jmap.create_field("group", FieldType::Int32, 0).unwrap();
        let tag = jmap.create_field("tag", FieldType::StringOffset, "").unwrap();
        for (g, t) in [(2, "a"), (1, "b"), (2, "c"), (1, "d")] {
            let mut entry = jmap.create_entry();
            entry.set_by_hash(group, g).unwrap();
            entry.set_by_hash(tag, t).unwrap();
        }

        let tags = |jmap: &JMapInfo<NameRegistry>| -> Vec<String> {
            jmap.iter()
                .map(|e| e.get_string_by_hash(tag).unwrap().to_string())
                .collect()
        };

        jmap.sort_entries_by(|e| e.get_int_by_hash(group), false);
        assert_eq!(tags(&jmap), ["b", "d", "a", "c"]);

        jmap.sort_entries_by(|e| e.get_int_by_hash(group), true);
        assert_eq!(tags(&jmap), ["a", "c", "b", "d"]);

        jmap.sort_entries_by_field("tag", true).unwrap();
        assert_eq!(tags(&jmap), ["d", "c", "b", "a"]);
        assert!(jmap.sort_entries_by_field("missing", false).is_err());
    }

    #[test]
    fn test_copy_is_independent() {
        let mut jmap = jmap();
        let id = jmap.create_field("id", FieldType::Int32, 0).unwrap();
        jmap.create_entry().set_by_hash(id, 1).unwrap();

        let mut clone = jmap.copy();
        clone.entry_mut(0).unwrap().set_by_hash(id, 2).unwrap();
        clone.create_field("extra", FieldType::Int8, 0).unwrap();

        assert_eq!(jmap.entry(0).unwrap().get_int_by_hash(id), Some(1));
        assert_eq!(jmap.num_fields(), 1);
        assert_eq!(clone.num_fields(), 2);
    }

    #[test]
    fn test_copy_shares_registry() {
        let jmap = jmap();
        let mut clone = jmap.copy();
        assert!(clone.hash_table().shares_lookup_with(jmap.hash_table()));

        let hash = clone.create_field("OnlyInClone", FieldType::Int32, 0).unwrap();
        assert_eq!(jmap.field_name(hash), "OnlyInClone");
        assert!(!jmap.contains_field(hash));
    }

    #[test]
    fn test_entry_handles_keep_schema() {
        let mut jmap = jmap();
        let id = jmap.create_field("id", FieldType::Int32, 0).unwrap();
        jmap.create_entry();
        jmap.create_entry();

        for (i, mut entry) in jmap.iter_mut().enumerate() {
            entry.set_by_hash(id, i as i32 + 10).unwrap();
        }
        for mut entry in &mut jmap {
            assert!(entry.set_by_hash(id, "text").is_err());
            assert!(entry.set_by_hash(0xDEADBEEF, 1).is_err());
        }

        let ids: Vec<i32> = jmap.iter().map(|e| e.get_int_by_hash(id).unwrap()).collect();
        assert_eq!(ids, [10, 11]);
        assert!(jmap.iter().all(|e| e.len() == jmap.num_fields()));
    }

    #[test]
    fn test_layout() {
        let mut jmap = jmap();
        jmap.create_field("char", FieldType::Int8, 0).unwrap();
        jmap.create_field("str", FieldType::StringOffset, "").unwrap();
        jmap.create_field("float", FieldType::Float32, 0.0f32).unwrap();
        jmap.create_field("embedded", FieldType::EmbeddedString, "").unwrap();
        jmap.create_field("short", FieldType::Int16, 0).unwrap();

        // embedded(32) float(4) short(2) char(1) str(4) = 43, aligned to 44
        let offsets: Vec<u16> = jmap.fields().map(|f| f.offset()).collect();
        assert_eq!(offsets, [38, 39, 32, 0, 36]);
        assert_eq!(jmap.entry_size(), 44);
        assert_eq!(jmap.recalculate_offsets().unwrap(), 44);

        jmap.drop_field("char").unwrap();
        let offsets: Vec<u16> = jmap.fields().map(|f| f.offset()).collect();
        assert_eq!(offsets, [38, 32, 0, 36]);
        assert_eq!(jmap.entry_size(), 44);

        jmap.drop_field("embedded").unwrap();
        assert_eq!(jmap.entry_size(), 12);
    }

    #[test]
    fn test_layout_ties_keep_declaration_order() {
        let mut jmap = jmap();
        jmap.create_field("b", FieldType::Int32, 0).unwrap();
        jmap.create_field("a", FieldType::Int32, 0).unwrap();
        jmap.create_field("c", FieldType::Int8, 0).unwrap();

        let offsets: Vec<u16> = jmap.fields().map(|f| f.offset()).collect();
        assert_eq!(offsets, [0, 4, 8]);
        assert_eq!(jmap.entry_size(), 12);
    }
}
