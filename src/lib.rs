//! # jmap-codec
//!
//! A Rust library for reading and writing Nintendo's BCSV/JMap format
//! This format is used by Luigi's Mansion, Super Mario Sunshine,
//! Donkey Kong Jungle Beat and the Super Mario Galaxy games
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jmap_codec::{from_file, to_csv, CsvOptions, Game};
//!
//! # fn main() -> jmap_codec::Result<()> {
//! // Create a registry with known field names
//! let game = Game::SuperMarioGalaxy;
//! let registry = game.registry_with_lookup("hashtable_smg.txt")?;
//!
//! // Read a BCSV file
//! let jmap = from_file(registry, "scenariodata.bcsv", &game.io_options())?;
//!
//! // Print some data
//! println!("Entries: {}", jmap.len());
//! for entry in jmap.entries() {
//!     if let Some(name) = entry.get_string(jmap.hash_table(), "ZoneName") {
//!         println!("Zone: {}", name);
//!     }
//! }
//!
//! // Export to CSV
//! to_csv(&jmap, "output.csv", &CsvOptions::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - Read and write BCSV files with bit-exact layout, including packed bitfields
//! - Legacy and JGadget field name hashes
//! - big-endian and little-endian support
//! - Shift-JIS and UTF-8 string encoding
//! - CSV import/export

pub mod csv;
pub mod entry;
pub mod error;
pub mod field;
pub mod game;
pub mod hash;
pub mod io;
pub mod jmap;

pub use crate::csv::{CsvOptions, from_csv, from_csv_reader, to_csv, to_csv_writer};
pub use crate::entry::{Entry, EntryMut, FieldKey};
pub use crate::error::{JMapError, Result};
pub use crate::field::{Field, FieldType, FieldValue, ValueKind};
pub use crate::game::Game;
pub use crate::hash::{
    HashAlgorithm, HashTable, NameRegistry, calc_jgadget_hash,
    calc_legacy_hash,
};
pub use crate::io::{
    Encoding, IoOptions, PackReport, from_buffer, from_buffer_at, from_file, to_buffer,
    to_buffer_with_report, to_file,
};
pub use crate::jmap::JMapInfo;
