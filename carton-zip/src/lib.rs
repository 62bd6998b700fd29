//! # Carton Zip
//!
//! ZIP container reading: central directory parsing, per-entry
//! decompression sessions, and extraction helpers.
//!
//! The reader follows the format's own access path: it locates the
//! end-of-central-directory trailer by a backward scan, walks the
//! central directory with a lazy cursor, validates each entry's local
//! header before opening it, and streams the payload through the
//! [`carton_inflate`] engine (or a raw copy for stored entries) with a
//! running CRC-32 check.
//!
//! Out of scope, rejected fail-closed: encrypted entries, spanned
//! (multi-disk) archives, compression methods other than stored and
//! DEFLATE, and writing.
//!
//! ## Example
//!
//! ```rust,no_run
//! use carton_zip::{ZipArchive, read_entry};
//! use std::fs::File;
//!
//! let file = File::open("archive.zip").unwrap();
//! let mut archive = ZipArchive::open(file).unwrap();
//!
//! let mut next = archive.first_entry().unwrap();
//! while let Some(entry) = next {
//!     println!("{} ({} bytes)", entry.name, entry.uncompressed_size);
//!     next = archive.next_entry().unwrap();
//! }
//!
//! let entry = archive.locate("readme.txt", true).unwrap();
//! let contents = read_entry(&mut archive, &entry).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod extract;
pub mod reader;
pub mod records;

// Re-exports
pub use archive::{ZipArchive, ZipPosition};
pub use extract::{extract_all, read_entry, read_entry_to};
pub use reader::EntryReader;
pub use records::{CentralDirEntry, EndOfCentralDirectory, LocalFileHeader, NameDecoding};
