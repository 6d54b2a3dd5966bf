use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::{JMapError, Result};
use crate::field::{Field, FieldType, FieldValue};
use crate::hash::{HashTable, hash_placeholder};
use crate::jmap::JMapInfo;

/// Size of the table header
const HEADER_SIZE: usize = 0x10;
/// Size of one field descriptor
const FIELD_SIZE: usize = 0x0C;
/// Size of an embedded string slot
const EMBEDDED_STRING_SIZE: usize = 32;
/// Buffers are padded to this alignment
const BUFFER_ALIGNMENT: usize = 32;
/// Filler byte used for the trailing padding
const PADDING_BYTE: u8 = 0x40;

/// Options for reading/writing BCSV files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoOptions {
    /// Whether data is big-endian or little-endian
    pub big_endian: bool,
    /// String encoding of embedded and pooled strings
    pub encoding: Encoding,
}

/// String encoding options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Shift-JIS encoding
    ShiftJis,
    /// UTF-8 encoding
    Utf8,
}

impl Encoding {
    fn codec(&self) -> &'static encoding_rs::Encoding {
        match self {
            Encoding::ShiftJis => encoding_rs::SHIFT_JIS,
            Encoding::Utf8 => encoding_rs::UTF_8,
        }
    }

    /// Decode bytes into a string, failing on malformed input
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        self.codec()
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|s| s.into_owned())
            .ok_or_else(|| {
                JMapError::Encoding(format!("invalid {} byte sequence {:02X?}", self, bytes))
            })
    }

    /// Encode a string into bytes, failing on unmappable characters
    pub fn encode(&self, s: &str) -> Result<Vec<u8>> {
        let (encoded, _, had_errors) = self.codec().encode(s);
        if had_errors {
            return Err(JMapError::Encoding(format!("cannot encode {:?} as {}", s, self)));
        }
        Ok(encoded.into_owned())
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::ShiftJis => write!(f, "shift_jis"),
            Encoding::Utf8 => write!(f, "utf-8"),
        }
    }
}

impl FromStr for Encoding {
    type Err = JMapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "shift_jis" | "shift-jis" | "sjis" | "shift_jisx0213" => Ok(Encoding::ShiftJis),
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            _ => Err(JMapError::Encoding(format!("unknown encoding: {}", s))),
        }
    }
}

impl Default for IoOptions {
    fn default() -> Self {
        Self {
            big_endian: true,
            encoding: Encoding::ShiftJis,
        }
    }
}

impl IoOptions {
    /// Create options for the given endianness and encoding
    pub fn new(big_endian: bool, encoding: Encoding) -> Self {
        Self {
            big_endian,
            encoding,
        }
    }
}

/// What happened while encoding a table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackReport {
    /// Number of embedded strings cut down to 31 bytes
    pub truncated_strings: usize,
}

/// Read a JMapInfo from a byte buffer
///
/// # Arguments
/// - `hash_table` - The hash table to use for field name lookups
/// - `data` - The byte buffer containing the BCSV data
/// - `options` - Options for endianness and string encoding
///
/// # Returns
/// A `JMapInfo` instance populated with the data from the buffer, or an error if parsing fails
pub fn from_buffer<H: HashTable>(
    hash_table: H,
    data: &[u8],
    options: &IoOptions,
) -> Result<JMapInfo<H>> {
    from_buffer_at(hash_table, data, 0, options)
}

/// Read a JMapInfo that starts at `offset` inside a larger buffer
///
/// All offsets stored in the table are relative to `offset`
pub fn from_buffer_at<H: HashTable>(
    hash_table: H,
    data: &[u8],
    offset: usize,
    options: &IoOptions,
) -> Result<JMapInfo<H>> {
    if options.big_endian {
        read_table::<BigEndian, H>(hash_table, data, offset, options.encoding)
    } else {
        read_table::<LittleEndian, H>(hash_table, data, offset, options.encoding)
    }
}

/// Read a JMapInfo from a file
///
/// # Arguments
/// - `hash_table` - The hash table to use for field name lookups
/// - `path` - The path to the BCSV file to read
/// - `options` - Options for endianness and string encoding
pub fn from_file<H: HashTable, P: AsRef<Path>>(
    hash_table: H,
    path: P,
    options: &IoOptions,
) -> Result<JMapInfo<H>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    from_buffer(hash_table, &data, options)
}

/// Write a JMapInfo to a byte buffer
///
/// Serializes the header, field descriptors, entries and string pool, padded
/// to 32 bytes. Embedded strings longer than 31 bytes are truncated with a
/// warning, see [`to_buffer_with_report`] to observe that.
pub fn to_buffer<H: HashTable>(jmap: &JMapInfo<H>, options: &IoOptions) -> Result<Vec<u8>> {
    to_buffer_with_report(jmap, options).map(|(buffer, _)| buffer)
}

/// Write a JMapInfo to a byte buffer and report lossy conversions
pub fn to_buffer_with_report<H: HashTable>(
    jmap: &JMapInfo<H>,
    options: &IoOptions,
) -> Result<(Vec<u8>, PackReport)> {
    if options.big_endian {
        write_table::<BigEndian, H>(jmap, options.encoding)
    } else {
        write_table::<LittleEndian, H>(jmap, options.encoding)
    }
}

/// Write a JMapInfo to a file
///
/// # Arguments
/// - `jmap` - The `JMapInfo` instance to write to the file
/// - `path` - The path to the file where the BCSV data should be written
/// - `options` - Options for endianness and string encoding
pub fn to_file<H: HashTable, P: AsRef<Path>>(
    jmap: &JMapInfo<H>,
    path: P,
    options: &IoOptions,
) -> Result<()> {
    let buffer = to_buffer(jmap, options)?;
    let mut file = File::create(path)?;
    file.write_all(&buffer)?;
    file.flush()?;
    Ok(())
}

// Helper functions

/// Borrow `len` bytes at `offset`, failing instead of panicking when out of range
fn slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset.checked_add(len).ok_or(JMapError::BufferTooSmall {
        expected: usize::MAX,
        got: data.len(),
    })?;

    data.get(offset..end).ok_or(JMapError::BufferTooSmall {
        expected: end,
        got: data.len(),
    })
}

fn read_table<B: ByteOrder, H: HashTable>(
    hash_table: H,
    data: &[u8],
    start: usize,
    encoding: Encoding,
) -> Result<JMapInfo<H>> {
    let header = slice(data, start, HEADER_SIZE)?;
    let num_entries = B::read_u32(&header[0x00..0x04]) as usize;
    let num_fields = B::read_u32(&header[0x04..0x08]) as usize;
    let off_data = B::read_u32(&header[0x08..0x0C]) as usize;
    let entry_size = B::read_u32(&header[0x0C..0x10]);

    // Field descriptors follow the header
    let mut fields = Vec::with_capacity(num_fields.min(data.len() / FIELD_SIZE));
    let mut off = start + HEADER_SIZE;
    for _ in 0..num_fields {
        fields.push(read_field::<B>(data, off)?);
        off += FIELD_SIZE;
    }

    // The stored layout stays authoritative until the field set changes
    let mut jmap = JMapInfo::with_layout(hash_table, fields, entry_size)?;

    // The string pool starts right after the last entry
    let data_start = start + off_data;
    let rows_len = num_entries
        .checked_mul(entry_size as usize)
        .ok_or(JMapError::BufferTooSmall {
            expected: usize::MAX,
            got: data.len(),
        })?;
    slice(data, data_start, rows_len)?;
    let off_strings = data_start + rows_len;

    let fields: Vec<Field> = jmap.fields().cloned().collect();
    let mut row = data_start;
    for _ in 0..num_entries {
        let entry = read_entry::<B>(data, row, off_strings, &fields, encoding)?;
        jmap.push_entry(entry);
        row += entry_size as usize;
    }

    debug!(
        entries = num_entries,
        fields = num_fields,
        entry_size,
        "decoded jmap table"
    );

    Ok(jmap)
}

/// Read a field descriptor (hash, mask, offset, shift, type tag)
fn read_field<B: ByteOrder>(data: &[u8], offset: usize) -> Result<Field> {
    let raw = slice(data, offset, FIELD_SIZE)?;
    let hash = B::read_u32(&raw[0x00..0x04]);
    let mask = B::read_u32(&raw[0x04..0x08]);
    let field_offset = B::read_u16(&raw[0x08..0x0A]);
    let shift = raw[0x0A] as i8;
    let field_type = FieldType::from_tag(raw[0x0B] as i8)?;

    let mut field = Field::new(
        hash,
        field_type,
        mask,
        shift,
        FieldValue::default_for(field_type),
    )?;
    field.set_offset(field_offset);
    Ok(field)
}

/// Write a field descriptor at the given offset
fn write_field<B: ByteOrder>(buffer: &mut [u8], offset: usize, field: &Field) {
    let raw = &mut buffer[offset..offset + FIELD_SIZE];
    B::write_u32(&mut raw[0x00..0x04], field.hash());
    B::write_u32(&mut raw[0x04..0x08], field.mask());
    B::write_u16(&mut raw[0x08..0x0A], field.offset());
    raw[0x0A] = field.shift() as u8;
    raw[0x0B] = field.field_type().tag() as u8;
}

fn read_entry<B: ByteOrder>(
    data: &[u8],
    entry_offset: usize,
    string_table_offset: usize,
    fields: &[Field],
    encoding: Encoding,
) -> Result<Entry> {
    let mut entry = Entry::with_capacity(fields.len());

    for field in fields {
        let val_offset = entry_offset + field.offset() as usize;
        let value = read_field_value::<B>(data, val_offset, string_table_offset, field, encoding)?;
        entry.insert(field.hash(), value);
    }

    Ok(entry)
}

/// Apply mask and shift to a raw integer
#[inline]
fn unpack_bits(raw: u32, field: &Field) -> u32 {
    (raw & field.mask()) >> field.shift() as u32
}

/// Merge a value into the bits selected by the field's mask
#[inline]
fn pack_bits(existing: u32, value: i32, field: &Field) -> u32 {
    (existing & !field.mask()) | (((value as u32) << field.shift() as u32) & field.mask())
}

/// Read a field value, sign-extending integers from their storage width
fn read_field_value<B: ByteOrder>(
    data: &[u8],
    offset: usize,
    string_table_offset: usize,
    field: &Field,
    encoding: Encoding,
) -> Result<FieldValue> {
    let value = match field.field_type() {
        FieldType::Int32 | FieldType::Int32Alt => {
            let raw = B::read_u32(slice(data, offset, 4)?);
            FieldValue::Int(unpack_bits(raw, field) as i32)
        }

        FieldType::Int16 => {
            let raw = B::read_u16(slice(data, offset, 2)?) as u32;
            FieldValue::Int(unpack_bits(raw, field) as u16 as i16 as i32)
        }

        FieldType::Int8 => {
            let raw = slice(data, offset, 1)?[0] as u32;
            FieldValue::Int(unpack_bits(raw, field) as u8 as i8 as i32)
        }

        FieldType::Float32 => FieldValue::Float(B::read_f32(slice(data, offset, 4)?)),

        FieldType::EmbeddedString => {
            let raw = slice(data, offset, EMBEDDED_STRING_SIZE)?;
            let end = raw
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(EMBEDDED_STRING_SIZE);
            FieldValue::String(encoding.decode(&raw[..end])?)
        }

        FieldType::StringOffset => {
            let str_offset = B::read_u32(slice(data, offset, 4)?) as usize;
            let str_start = string_table_offset + str_offset;
            let tail = data.get(str_start..).ok_or(JMapError::BufferTooSmall {
                expected: str_start,
                got: data.len(),
            })?;
            let end = tail
                .iter()
                .position(|&b| b == 0)
                .ok_or(JMapError::UnterminatedString { offset: str_start })?;
            FieldValue::String(encoding.decode(&tail[..end])?)
        }
    };

    Ok(value)
}

/// Per-call state of the encoder
struct PackState<'a> {
    /// String pool appended after the entries
    string_table: Vec<u8>,
    /// Pool offset of every string written so far
    string_offsets: HashMap<&'a str, u32>,
    encoding: Encoding,
    report: PackReport,
}

fn write_table<B: ByteOrder, H: HashTable>(
    jmap: &JMapInfo<H>,
    encoding: Encoding,
) -> Result<(Vec<u8>, PackReport)> {
    let entry_size = jmap.entry_size();
    let fields: Vec<&Field> = jmap.fields().collect();

    for field in &fields {
        if field.offset() as usize + field.size() > entry_size as usize {
            return Err(JMapError::FieldOutsideEntry {
                hash: field.hash(),
                offset: field.offset(),
                size: field.size(),
                entry_size,
            });
        }
    }

    let num_entries = jmap.len();
    let off_data = HEADER_SIZE + fields.len() * FIELD_SIZE;
    let mut buffer = vec![0u8; off_data + num_entries * entry_size as usize];

    B::write_u32(&mut buffer[0x00..0x04], num_entries as u32);
    B::write_u32(&mut buffer[0x04..0x08], fields.len() as u32);
    B::write_u32(&mut buffer[0x08..0x0C], off_data as u32);
    B::write_u32(&mut buffer[0x0C..0x10], entry_size);

    // Descriptors keep declaration order, only the offsets follow the layout
    let mut off = HEADER_SIZE;
    for field in &fields {
        write_field::<B>(&mut buffer, off, field);
        off += FIELD_SIZE;
    }

    let mut state = PackState {
        string_table: Vec::new(),
        string_offsets: HashMap::new(),
        encoding,
        report: PackReport::default(),
    };

    let mut row = off_data;
    for entry in jmap.entries() {
        for field in &fields {
            let value = entry
                .get_by_hash(field.hash())
                .ok_or_else(|| JMapError::UnknownField(jmap.field_name(field.hash())))?;
            let offset = row + field.offset() as usize;
            write_field_value::<B>(&mut buffer, offset, value, field, &mut state)?;
        }
        row += entry_size as usize;
    }

    debug!(
        entries = num_entries,
        fields = fields.len(),
        entry_size,
        string_pool = state.string_table.len(),
        "encoded jmap table"
    );

    buffer.extend_from_slice(&state.string_table);

    // Align to 32 bytes with 0x40 padding
    let aligned_len = buffer.len().next_multiple_of(BUFFER_ALIGNMENT);
    buffer.resize(aligned_len, PADDING_BYTE);

    Ok((buffer, state.report))
}

/// Write a field value at the given offset
///
/// Integers are merged into the existing bits outside the field's mask so
/// that fields packed into the same word do not clobber each other
fn write_field_value<'a, B: ByteOrder>(
    buffer: &mut [u8],
    offset: usize,
    value: &'a FieldValue,
    field: &Field,
    state: &mut PackState<'a>,
) -> Result<()> {
    match (field.field_type(), value) {
        (FieldType::Int32 | FieldType::Int32Alt, FieldValue::Int(v)) => {
            let slot = &mut buffer[offset..offset + 4];
            let packed = pack_bits(B::read_u32(slot), *v, field);
            B::write_u32(slot, packed);
        }

        (FieldType::Int16, FieldValue::Int(v)) => {
            let slot = &mut buffer[offset..offset + 2];
            let packed = pack_bits(B::read_u16(slot) as u32, *v, field);
            B::write_u16(slot, packed as u16);
        }

        (FieldType::Int8, FieldValue::Int(v)) => {
            buffer[offset] = pack_bits(buffer[offset] as u32, *v, field) as u8;
        }

        (FieldType::Float32, FieldValue::Float(v)) => {
            B::write_f32(&mut buffer[offset..offset + 4], *v);
        }

        (FieldType::EmbeddedString, FieldValue::String(s)) => {
            let bytes = state.encoding.encode(s)?;
            let len = if bytes.len() >= EMBEDDED_STRING_SIZE {
                warn!(
                    field = %hash_placeholder(field.hash()),
                    len = bytes.len(),
                    "string is too long to be embedded, truncating to 31 bytes"
                );
                state.report.truncated_strings += 1;
                truncated_len(&bytes, state.encoding)
            } else {
                bytes.len()
            };
            buffer[offset..offset + len].copy_from_slice(&bytes[..len]);
        }

        (FieldType::StringOffset, FieldValue::String(s)) => {
            let str_offset = match state.string_offsets.get(s.as_str()) {
                Some(&existing) => existing,
                None => {
                    let str_offset = state.string_table.len() as u32;
                    let bytes = state.encoding.encode(s)?;
                    state.string_table.extend_from_slice(&bytes);
                    state.string_table.push(0);
                    state.string_offsets.insert(s.as_str(), str_offset);
                    str_offset
                }
            };

            B::write_u32(&mut buffer[offset..offset + 4], str_offset);
        }

        _ => {
            return Err(JMapError::TypeMismatch {
                expected: field.field_type().value_kind().name(),
                got: value.type_name(),
            });
        }
    }

    Ok(())
}

/// Longest prefix of at most 31 bytes that still decodes cleanly
///
/// The last byte of the slot stays zero as terminator. ASCII text is cut at
/// exactly 31 bytes like the games' own tools do; for multi-byte text a
/// character cut in half is dropped entirely, so the result can be shorter
/// than 31 bytes where a plain byte cut would leave a broken sequence
fn truncated_len(bytes: &[u8], encoding: Encoding) -> usize {
    let mut len = bytes.len().min(EMBEDDED_STRING_SIZE - 1);
    while len > 0 && encoding.decode(&bytes[..len]).is_err() {
        len -= 1;
    }
    len
}
