use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::rc::Rc;

use crate::error::{JMapError, Result};

/// Modulus of the legacy hash
const LEGACY_MODULUS: i64 = 33_554_393;

/// Reinterpret a name byte as a signed char, like the games' compilers do
#[inline]
fn signed_char(byte: u8) -> i32 {
    byte as i8 as i32
}

/// The hash function used by Luigi's Mansion and Super Mario Sunshine
///
/// # Arguments
/// - `field_name` - The ASCII field name to hash
///
/// # Returns
/// A 32-bit hash value, always below 33554393
pub fn calc_legacy_hash(field_name: &str) -> u32 {
    let mut hash: i64 = 0;

    for byte in field_name.bytes() {
        let shifted = (hash << 8) & 0xFFFF_FFFF;
        hash = (shifted + signed_char(byte) as i64).rem_euclid(LEGACY_MODULUS);
    }

    hash as u32
}

/// The JGadget hash function used by the Super Mario Galaxy games and Donkey Kong Jungle Beat
///
/// # Arguments
/// - `field_name` - The ASCII field name to hash
///
/// # Returns
/// A 32-bit hash value
pub fn calc_jgadget_hash(field_name: &str) -> u32 {
    let mut hash: u32 = 0;

    for byte in field_name.bytes() {
        hash = hash
            .wrapping_mul(31)
            .wrapping_add(signed_char(byte) as u32);
    }

    hash
}

/// Trait for hash lookup tables
pub trait HashTable {
    /// Calculate the hash for a field name
    fn calc(&self, field_name: &str) -> u32;

    /// Find the field name for a given hash
    /// Returns a hex representation like `[DEADBEEF]` if not found
    ///
    /// # Arguments
    /// - `hash` - The hash value to look up
    fn resolve(&self, hash: u32) -> String;

    /// Hash a field name and remember it for later lookups
    ///
    /// The first name registered for a hash wins; registering a name whose
    /// hash is already known leaves the table untouched
    ///
    /// # Errors
    /// - `JMapError::NonAsciiName` if the name is not pure ASCII
    ///
    /// # Returns
    /// The hash value corresponding to the field name
    fn register(&mut self, field_name: &str) -> Result<u32>;
}

/// Placeholder name for a hash without a known name
pub fn hash_placeholder(hash: u32) -> String {
    format!("[{:08X}]", hash)
}

/// Type of hash algorithm to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// Old algorithm of Luigi's Mansion and Super Mario Sunshine
    Legacy,
    /// JGadget algorithm of Donkey Kong Jungle Beat and Super Mario Galaxy 1/2
    JGadget,
}

impl HashAlgorithm {
    /// Calculate hash using this algorithm
    ///
    /// # Arguments
    /// - `field_name` - The field name to hash
    ///
    /// # Returns
    /// The calculated hash value base of the hash algorithm
    pub fn calc(&self, field_name: &str) -> u32 {
        match self {
            HashAlgorithm::Legacy => calc_legacy_hash(field_name),
            HashAlgorithm::JGadget => calc_jgadget_hash(field_name),
        }
    }
}

/// Bidirectional hash <-> name store bound to one hash algorithm
///
/// A `NameRegistry` is a handle: clones share the same lookup, so a name
/// registered through a copied table resolves in the original as well
#[derive(Debug, Clone)]
pub struct NameRegistry {
    algorithm: HashAlgorithm,
    lookup: Rc<RefCell<HashMap<u32, String>>>,
}

impl NameRegistry {
    /// Create a new empty registry with the given algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            lookup: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Create a new registry seeded from a lookup file of known field names
    ///
    /// The lookup file should contain one field name per line
    /// Lines starting with '#' are treated as comments
    ///
    /// # Arguments
    /// - `algorithm` - The hash algorithm to use for calculating hashes
    /// - `path` - The path to the lookup file containing field names
    ///
    /// # Errors
    /// - `JMapError::ResourceMissing` if the file cannot be opened
    /// - `JMapError::NonAsciiName` if a listed name is not ASCII
    pub fn from_file<P: AsRef<Path>>(algorithm: HashAlgorithm, path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|_| JMapError::ResourceMissing(path.display().to_string()))?;

        Self::from_reader(algorithm, BufReader::new(file))
    }

    /// Create a new registry seeded from any buffered reader of field names
    pub fn from_reader<R: BufRead>(algorithm: HashAlgorithm, reader: R) -> Result<Self> {
        let mut registry = Self::new(algorithm);

        // `lines` drops the line ending, other whitespace belongs to the name
        for line in reader.lines() {
            let line = line?;

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            registry.register(&line)?;
        }

        Ok(registry)
    }

    /// Get the hash algorithm used by this registry
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Number of known names
    pub fn len(&self) -> usize {
        self.lookup.borrow().len()
    }

    /// Check if no names are known
    pub fn is_empty(&self) -> bool {
        self.lookup.borrow().is_empty()
    }

    /// Check if a name is known for the hash
    pub fn contains_hash(&self, hash: u32) -> bool {
        self.lookup.borrow().contains_key(&hash)
    }

    /// Check if two registries are handles to the same lookup
    pub fn shares_lookup_with(&self, other: &NameRegistry) -> bool {
        Rc::ptr_eq(&self.lookup, &other.lookup)
    }
}

impl HashTable for NameRegistry {
    fn calc(&self, field_name: &str) -> u32 {
        self.algorithm.calc(field_name)
    }

    fn resolve(&self, hash: u32) -> String {
        self.lookup
            .borrow()
            .get(&hash)
            .cloned()
            .unwrap_or_else(|| hash_placeholder(hash))
    }

    fn register(&mut self, field_name: &str) -> Result<u32> {
        if !field_name.is_ascii() {
            return Err(JMapError::NonAsciiName(field_name.to_string()));
        }

        let hash = self.calc(field_name);
        self.lookup
            .borrow_mut()
            .entry(hash)
            .or_insert_with(|| field_name.to_string());
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jgadget_hash() {
        // Known hash values from Super Mario Galaxy
        assert_eq!(calc_jgadget_hash("ScenarioNo"), 0xED08B591);
        assert_eq!(calc_jgadget_hash("ZoneName"), 0x3666C077);
        assert_eq!(calc_jgadget_hash("id"), 0x0D1B);
        assert_eq!(calc_jgadget_hash(""), 0);
    }

    #[test]
    fn test_legacy_hash() {
        assert_eq!(calc_legacy_hash("ScenarioNo"), 0x008A7117);
        assert_eq!(calc_legacy_hash("ZoneName"), 0x003CF769);
        assert_eq!(calc_legacy_hash("count"), 0x017CEDD5);
        assert_eq!(calc_legacy_hash(""), 0);
    }

    #[test]
    fn test_high_bytes_are_signed() {
        // UTF-8 "é" is C3 A9, both bytes become negative chars
        assert_eq!(calc_jgadget_hash("é"), 0xFFFFF846);
        assert_eq!(calc_legacy_hash("é"), 0x01FFAF02);
    }

    #[test]
    fn test_algorithm_dispatch() {
        assert_eq!(HashAlgorithm::JGadget.calc("name"), 0x00337A8B);
        assert_eq!(HashAlgorithm::Legacy.calc("name"), 0x006175C6);
    }

    #[test]
    fn test_registry() {
        let mut table = NameRegistry::new(HashAlgorithm::JGadget);

        let hash = table.register("TestField").unwrap();
        assert_eq!(hash, calc_jgadget_hash("TestField"));
        assert_eq!(table.resolve(hash), "TestField");
        assert_eq!(table.register("TestField").unwrap(), hash);
        assert_eq!(table.len(), 1);

        // Unknown hash should return hex representation
        assert_eq!(table.resolve(0xDEADBEEF), "[DEADBEEF]");
        assert_eq!(table.resolve(0x1), "[00000001]");
    }

    #[test]
    fn test_registry_rejects_non_ascii() {
        let mut table = NameRegistry::new(HashAlgorithm::Legacy);
        assert!(matches!(
            table.register("Größe"),
            Err(JMapError::NonAsciiName(_))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_registry_from_reader() {
        let list = "# comment line\nScenarioNo\n\nZoneName\r\n Padded \r\n";
        let table = NameRegistry::from_reader(HashAlgorithm::JGadget, list.as_bytes()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve(0xED08B591), "ScenarioNo");
        assert_eq!(table.resolve(0x3666C077), "ZoneName");
        assert!(!table.contains_hash(calc_jgadget_hash("# comment line")));

        // Only the line ending is stripped
        assert_eq!(table.resolve(calc_jgadget_hash(" Padded ")), " Padded ");
        assert!(!table.contains_hash(calc_jgadget_hash("Padded")));
    }

    #[test]
    fn test_registry_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookup.txt");
        std::fs::write(&path, "ZoneName\n").unwrap();

        let table = NameRegistry::from_file(HashAlgorithm::JGadget, &path).unwrap();
        assert_eq!(table.resolve(0x3666C077), "ZoneName");

        let missing = NameRegistry::from_file(HashAlgorithm::JGadget, dir.path().join("nope.txt"));
        assert!(matches!(missing, Err(JMapError::ResourceMissing(_))));
    }

    #[test]
    fn test_clones_share_lookup() {
        let original = NameRegistry::new(HashAlgorithm::JGadget);
        let mut other = original.clone();

        let hash = other.register("Shared").unwrap();
        assert_eq!(original.resolve(hash), "Shared");
        assert!(original.shares_lookup_with(&other));
        assert!(!original.shares_lookup_with(&NameRegistry::new(HashAlgorithm::JGadget)));
    }
}
