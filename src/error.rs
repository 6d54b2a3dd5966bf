use thiserror::Error;

/// Result type alias for JMap operations
pub type Result<T> = std::result::Result<T, JMapError>;

/// Errors that can occur during JMap operations
#[derive(Error, Debug)]
pub enum JMapError {
    /// Field type tag outside 0..=6 encountered while decoding a field descriptor
    #[error("Invalid field type ID: 0x{0:02X}")]
    InvalidFieldType(i8),

    /// A field with the same hash already exists in the container
    #[error("Field already exists: {0}")]
    DuplicateField(String),

    /// Field not found in the container or entry
    #[error("Field not found: {0}")]
    UnknownField(String),

    /// Value kind does not match the field's primary value kind
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    /// Entry index out of bounds
    #[error("Entry index out of range: {index} (len: {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Invalid CSV field descriptor
    #[error("Malformed CSV field descriptor: {0}")]
    MalformedDescriptor(String),

    /// Lookup file with known field names could not be read
    #[error("Lookup file not found: {0}")]
    ResourceMissing(String),

    /// Buffer too small to contain the data being read
    #[error("Buffer too small: expected at least {expected} bytes, got {got}")]
    BufferTooSmall { expected: usize, got: usize },

    /// String in the string pool has no null terminator
    #[error("Unterminated string at offset 0x{offset:X}")]
    UnterminatedString { offset: usize },

    /// Bit shift outside of the 32-bit word
    #[error("Invalid shift amount: {0}")]
    InvalidShift(i8),

    /// A field's storage does not fit inside the entry
    #[error("Field {hash:08X} at offset {offset} (size {size}) does not fit an entry of {entry_size} bytes")]
    FieldOutsideEntry {
        hash: u32,
        offset: u16,
        size: usize,
        entry_size: u32,
    },

    /// The computed entry layout exceeds the 16-bit offset space
    #[error("Entry too large: {0} bytes")]
    EntryTooLarge(usize),

    /// String encoding error
    #[error("String encoding error: {0}")]
    Encoding(String),

    /// Field names must be ASCII to be hashed
    #[error("Field name is not ASCII: {0:?}")]
    NonAsciiName(String),

    /// CSV cell could not be parsed as the field's value kind
    #[error("Cannot parse '{text}' for field {field}")]
    InvalidValue { field: String, text: String },

    /// Unknown game identifier
    #[error("Unknown game: {0}")]
    UnknownGame(String),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for JMapError {
    fn from(err: csv::Error) -> Self {
        JMapError::Csv(err.to_string())
    }
}
