use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::entry::Entry;
use crate::error::{JMapError, Result};
use crate::field::{Field, FieldType, FieldValue, ValueKind};
use crate::hash::HashTable;
use crate::io::Encoding;
use crate::jmap::JMapInfo;

/// Options for reading/writing CSV files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Text encoding of the CSV file itself
    pub encoding: Encoding,
    /// Character that separates name, type and default in a header cell
    pub header_delimiter: char,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            header_delimiter: ':',
        }
    }
}

/// Read a JMapInfo from a CSV file
///
/// The CSV format uses a header row where each column is formatted as:
/// `FieldName:Type:DefaultValue`
///
/// For example: `ScenarioNo:Int:0,ZoneName:String:0`
/// A name written as `[XXXXXXXX]` is taken as the field hash itself.
///
/// # Arguments
/// - `hash_table` - The hash table to use for field name lookups. Field names from the CSV will be registered in it
/// - `path` - The path to the CSV file to read
/// - `options` - File encoding and header delimiter
///
/// # Returns
/// A JMapInfo populated with fields and entries from the CSV file
pub fn from_csv<H: HashTable, P: AsRef<Path>>(
    hash_table: H,
    path: P,
    options: &CsvOptions,
) -> Result<JMapInfo<H>> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;

    let text = options.encoding.decode(&bytes)?;
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(&text);

    from_csv_reader(hash_table, text.as_bytes(), options.header_delimiter)
}

/// Read a JMapInfo from UTF-8 CSV data
pub fn from_csv_reader<H: HashTable, R: Read>(
    hash_table: H,
    reader: R,
    header_delimiter: char,
) -> Result<JMapInfo<H>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);

    let mut jmap = JMapInfo::new(hash_table);
    let mut records = csv_reader.records();

    // Parse header
    let header = records
        .next()
        .ok_or_else(|| JMapError::Csv("CSV file is empty".to_string()))??;

    let mut field_infos: Vec<(u32, FieldType, FieldValue)> = Vec::with_capacity(header.len());

    for field_desc in header.iter() {
        let (hash, field_type, default) =
            parse_descriptor(jmap.hash_table_mut(), field_desc, header_delimiter)?;

        let field = Field::new(hash, field_type, field_type.default_mask(), 0, default.clone())?;
        jmap.push_field(field)?;
        field_infos.push((hash, field_type, default));
    }

    // Parse data rows
    for result in records {
        let record = result?;
        let mut entry = Entry::with_capacity(field_infos.len());

        for (i, (hash, field_type, default)) in field_infos.iter().enumerate() {
            let value_str = record.get(i).unwrap_or("");

            let value = if value_str.is_empty() {
                default.clone()
            } else {
                parse_field_value(value_str, *field_type).ok_or_else(|| {
                    JMapError::InvalidValue {
                        field: jmap.field_name(*hash),
                        text: value_str.to_string(),
                    }
                })?
            };

            entry.insert(*hash, value);
        }

        jmap.push_entry(entry);
    }

    Ok(jmap)
}

/// Write a JMapInfo to a CSV file
///
/// The CSV format uses a header row where each column is formatted as:
/// `FieldName:Type:DefaultValue`. The default written is the type's
/// canonical default, not the field's own default value.
///
/// # Arguments
/// - `jmap` - The JMapInfo to export to CSV
/// - `path` - The path to the CSV file to write
/// - `options` - File encoding and header delimiter
pub fn to_csv<H: HashTable, P: AsRef<Path>>(
    jmap: &JMapInfo<H>,
    path: P,
    options: &CsvOptions,
) -> Result<()> {
    let mut text = Vec::new();
    to_csv_writer(jmap, &mut text, options.header_delimiter)?;

    let text = String::from_utf8(text).map_err(|e| JMapError::Encoding(e.to_string()))?;
    let bytes = options.encoding.encode(&text)?;

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Write a JMapInfo as UTF-8 CSV data
pub fn to_csv_writer<H: HashTable, W: Write>(
    jmap: &JMapInfo<H>,
    writer: W,
    header_delimiter: char,
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    // Write header
    let headers: Vec<String> = jmap
        .fields()
        .map(|field| {
            let name = jmap.field_name(field.hash());
            let field_type = field.field_type();
            format!(
                "{}{}{}{}{}",
                name,
                header_delimiter,
                field_type.csv_name(),
                header_delimiter,
                field_type.csv_default()
            )
        })
        .collect();

    csv_writer.write_record(&headers)?;

    // Write entries
    for entry in jmap.entries() {
        let values = jmap
            .fields()
            .map(|field| {
                entry
                    .get_by_hash(field.hash())
                    .map(|v| v.to_string())
                    .ok_or_else(|| JMapError::UnknownField(jmap.field_name(field.hash())))
            })
            .collect::<Result<Vec<String>>>()?;

        csv_writer.write_record(&values)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Split a `Name:Type:Default` header cell into hash, type and default value
fn parse_descriptor<H: HashTable>(
    hash_table: &mut H,
    field_desc: &str,
    delimiter: char,
) -> Result<(u32, FieldType, FieldValue)> {
    let parts: Vec<&str> = field_desc.split(delimiter).collect();

    let [field_name, type_name, default_str] = parts[..] else {
        return Err(JMapError::MalformedDescriptor(format!(
            "expected 3 parts (name{d}type{d}default), got: {}",
            field_desc,
            d = delimiter
        )));
    };

    if field_name.is_empty() {
        return Err(JMapError::MalformedDescriptor(format!(
            "field name cannot be empty: {}",
            field_desc
        )));
    }

    let field_type = FieldType::from_csv_name(type_name).ok_or_else(|| {
        JMapError::MalformedDescriptor(format!("unknown field type {} in {}", type_name, field_desc))
    })?;

    // String defaults are always empty, whatever the text says
    let default = match field_type.value_kind() {
        ValueKind::String => FieldValue::String(String::new()),
        _ => parse_field_value(default_str, field_type).ok_or_else(|| {
            JMapError::MalformedDescriptor(format!(
                "invalid default {} in {}",
                default_str, field_desc
            ))
        })?,
    };

    // Parse hash from [XXXXXXXX] format or compute from name
    let hash = match field_name
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        Some(hex_str) => u32::from_str_radix(hex_str, 16).map_err(|_| {
            JMapError::MalformedDescriptor(format!("invalid hash {} in {}", field_name, field_desc))
        })?,
        None => hash_table.register(field_name)?,
    };

    Ok((hash, field_type, default))
}

fn parse_field_value(s: &str, field_type: FieldType) -> Option<FieldValue> {
    match field_type.value_kind() {
        ValueKind::Int => s.trim().parse().ok().map(FieldValue::Int),
        ValueKind::Float => s.trim().parse().ok().map(FieldValue::Float),
        ValueKind::String => Some(FieldValue::String(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashAlgorithm, NameRegistry, calc_jgadget_hash};

    fn registry() -> NameRegistry {
        NameRegistry::new(HashAlgorithm::JGadget)
    }

    fn read(text: &str) -> Result<JMapInfo<NameRegistry>> {
        from_csv_reader(registry(), text.as_bytes(), ':')
    }

    fn write(jmap: &JMapInfo<NameRegistry>) -> String {
        let mut out = Vec::new();
        to_csv_writer(jmap, &mut out, ':').unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_read_string_and_int() {
        let jmap = read("name:String:0,count:Int:0\n\"Mario\",5\n").unwrap();

        let name = jmap.get_field("name").unwrap();
        assert_eq!(name.field_type(), FieldType::StringOffset);
        assert_eq!(name.default_value(), &FieldValue::from(""));
        let count = jmap.get_field("count").unwrap();
        assert_eq!(count.field_type(), FieldType::Int32);
        assert_eq!(count.default_value(), &FieldValue::Int(0));

        assert_eq!(jmap.len(), 1);
        let entry = jmap.entry(0).unwrap();
        assert_eq!(entry.get_string(jmap.hash_table(), "name"), Some("Mario"));
        assert_eq!(entry.get_int(jmap.hash_table(), "count"), Some(5));
        assert_eq!(jmap.field_name(calc_jgadget_hash("name")), "name");
    }

    #[test]
    fn test_read_defaults_and_hash_names() {
        let jmap = read("[DEADBEEF]:Short:7,speed:Float:1.5,label:EmbeddedString:abc\n,,\n-3,2.0,hi\n").unwrap();

        let entry = jmap.entry(0).unwrap();
        assert_eq!(entry.get_int_by_hash(0xDEADBEEF), Some(7));
        assert_eq!(entry.get_float(jmap.hash_table(), "speed"), Some(1.5));
        assert_eq!(entry.get_string(jmap.hash_table(), "label"), Some(""));

        let entry = jmap.entry(1).unwrap();
        assert_eq!(entry.get_int_by_hash(0xDEADBEEF), Some(-3));
        assert_eq!(entry.get_float(jmap.hash_table(), "speed"), Some(2.0));
        assert_eq!(jmap.field_name(0xDEADBEEF), "[DEADBEEF]");
    }

    #[test]
    fn test_all_type_names() {
        let jmap = read("a:Int:0,b:EmbeddedString:0,c:Float:0.0,d:Int2:0,e:Short:0,f:Char:0,g:String:0\n").unwrap();
        let types: Vec<FieldType> = jmap.fields().map(|f| f.field_type()).collect();
        assert_eq!(types, FieldType::ALL);
        assert!(jmap.is_empty());
    }

    #[test]
    fn test_malformed_descriptors() {
        for header in ["name:String", "name:String:0:1", ":Int:0", "name:UnsignedInt:0", "name:Int:x", "[XYZ]:Int:0"] {
            match read(header) {
                Err(JMapError::MalformedDescriptor(msg)) => assert!(msg.contains(header), "{}", msg),
                other => panic!("{} parsed as {:?}", header, other.map(|j| j.num_fields())),
            }
        }
    }

    #[test]
    fn test_read_errors() {
        assert!(matches!(read(""), Err(JMapError::Csv(_))));
        assert!(matches!(
            read("a:Int:0,a:Char:0\n"),
            Err(JMapError::DuplicateField(_))
        ));
        assert!(matches!(
            read("a:Int:0\nfive\n"),
            Err(JMapError::InvalidValue { field, text }) if field == "a" && text == "five"
        ));
        assert!(matches!(read("a:Int:0,b:Int:0\n1\n"), Err(JMapError::Csv(_))));
    }

    #[test]
    fn test_write_uses_canonical_defaults() {
        let mut jmap = JMapInfo::new(registry());
        jmap.create_field("ScenarioNo", FieldType::Int32, 3).unwrap();
        jmap.create_field("Scale", FieldType::Float32, 2.5f32).unwrap();
        jmap.create_field("ZoneName", FieldType::StringOffset, "x").unwrap();
        jmap.create_entry();
        let mut entry = jmap.create_entry();
        entry.set_by_hash(calc_jgadget_hash("ZoneName"), "Red, Blue").unwrap();
        entry.set_by_hash(calc_jgadget_hash("Scale"), 1.0f32).unwrap();

        assert_eq!(
            write(&jmap),
            "ScenarioNo:Int:0,Scale:Float:0.0,ZoneName:String:0\n3,2.5,x\n3,1.0,\"Red, Blue\"\n"
        );
    }

    #[test]
    fn test_write_unknown_hash_roundtrip() {
        let mut jmap = read("[0000ABCD]:Char:0\n-1\n").unwrap();
        assert_eq!(write(&jmap), "[0000ABCD]:Char:0\n-1\n");

        jmap.create_entry();
        let again = read(&write(&jmap)).unwrap();
        assert_eq!(again.entries(), jmap.entries());
    }

    #[test]
    fn test_write_rejects_entry_missing_a_field() {
        let mut jmap = read("id:Int:0\n1\n").unwrap();
        jmap.push_entry(Entry::with_capacity(0));

        let mut out = Vec::new();
        assert!(matches!(
            to_csv_writer(&jmap, &mut out, ':'),
            Err(JMapError::UnknownField(name)) if name == "id"
        ));
    }

    #[test]
    fn test_file_roundtrip_shift_jis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let options = CsvOptions {
            encoding: Encoding::ShiftJis,
            ..CsvOptions::default()
        };

        let mut jmap = JMapInfo::new(registry());
        let name = jmap.create_field("name", FieldType::StringOffset, "").unwrap();
        jmap.create_entry().set_by_hash(name, "ルイージ").unwrap();
        to_csv(&jmap, &path, &options).unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(String::from_utf8(raw).is_err());

        let again = from_csv(registry(), &path, &options).unwrap();
        assert_eq!(again.entries(), jmap.entries());
    }

    #[test]
    fn test_custom_header_delimiter() {
        let jmap = from_csv_reader(registry(), "id;Int;0\n4\n".as_bytes(), ';').unwrap();
        assert_eq!(jmap.entry(0).unwrap().get_int(jmap.hash_table(), "id"), Some(4));
    }
}
