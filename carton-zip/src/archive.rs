//! Archive handle: open, enumerate, locate, and open entries.

use crate::reader::EntryReader;
use crate::records::{
    CentralDirEntry, EndOfCentralDirectory, LocalFileHeader, METHOD_DEFLATE, METHOD_STORED,
    LOCAL_HEADER_FIXED_SIZE, NameDecoding,
};
use carton_core::error::{CartonError, Result};
use std::io::{Read, Seek, SeekFrom};

/// Opaque bookmark for the enumeration cursor.
///
/// Lets a caller save the cursor, run a scan that moves it (such as
/// [`ZipArchive::locate`]), and restore it without re-reading records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipPosition {
    offset: u64,
    index: u16,
}

/// A ZIP archive opened for reading.
///
/// The byte source is anything `Read + Seek`; the archive owns the
/// handle for its lifetime but never materializes the file. Enumeration
/// is a cursor over the central directory: at most one entry record is
/// parsed at a time.
///
/// Exactly one entry may be open for reading at a time, and reading may
/// not be interleaved with enumeration: [`ZipArchive::open_entry`]
/// borrows the archive mutably for the life of the [`EntryReader`], so
/// both invariants hold at compile time.
#[derive(Debug)]
pub struct ZipArchive<R: Read + Seek> {
    pub(crate) reader: R,
    eocd: EndOfCentralDirectory,
    /// Bytes preceding the archive proper (self-extracting prefix).
    base_offset: u64,
    decoding: NameDecoding,
    /// Offset of the next unread record, relative to the central
    /// directory start.
    cursor_offset: u64,
    /// Index of the next unread record.
    cursor_index: u16,
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Open an archive with the default name decoding.
    pub fn open(reader: R) -> Result<Self> {
        Self::open_with_decoding(reader, NameDecoding::default())
    }

    /// Open an archive with an explicit entry-name decoding policy.
    ///
    /// Locates the end-of-central-directory record, rejects spanned
    /// (multi-disk) archives, and computes the length of any
    /// self-extracting prefix so stored offsets resolve correctly.
    pub fn open_with_decoding(mut reader: R, decoding: NameDecoding) -> Result<Self> {
        let eocd = EndOfCentralDirectory::find(&mut reader)?;

        if eocd.disk_number != 0
            || eocd.central_dir_disk != 0
            || eocd.entries_this_disk != eocd.entries_total
        {
            return Err(CartonError::bad_zip(
                "spanned (multi-disk) archives are not supported",
            ));
        }

        let cd_end = eocd.central_dir_offset as u64 + eocd.central_dir_size as u64;
        if cd_end > eocd.offset {
            return Err(CartonError::bad_zip(
                "central directory extends past its end record",
            ));
        }
        let base_offset = eocd.offset - cd_end;

        Ok(Self {
            reader,
            eocd,
            base_offset,
            decoding,
            cursor_offset: 0,
            cursor_index: 0,
        })
    }

    /// Number of entries in the archive.
    pub fn entry_count(&self) -> u16 {
        self.eocd.entries_total
    }

    /// The archive comment bytes.
    pub fn comment(&self) -> &[u8] {
        &self.eocd.comment
    }

    /// Length of the self-extracting prefix before the archive proper
    /// (0 for an ordinary ZIP file).
    pub fn prefix_len(&self) -> u64 {
        self.base_offset
    }

    /// Consume the archive and return the underlying byte source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Position the cursor at the first entry and read it.
    ///
    /// Returns `None` for an archive with no entries.
    pub fn first_entry(&mut self) -> Result<Option<CentralDirEntry>> {
        self.cursor_offset = 0;
        self.cursor_index = 0;
        self.next_entry()
    }

    /// Read the entry at the cursor and advance past it.
    ///
    /// Returns `None` once all entries have been enumerated. The order
    /// is the central directory order and is stable across repeated
    /// enumerations of the same handle.
    pub fn next_entry(&mut self) -> Result<Option<CentralDirEntry>> {
        if self.cursor_index >= self.eocd.entries_total {
            return Ok(None);
        }

        let record_pos =
            self.base_offset + self.eocd.central_dir_offset as u64 + self.cursor_offset;
        self.reader.seek(SeekFrom::Start(record_pos))?;
        let entry = CentralDirEntry::read(&mut self.reader, self.decoding)?;

        self.cursor_offset += entry.record_size();
        self.cursor_index += 1;
        Ok(Some(entry))
    }

    /// Save the enumeration cursor.
    pub fn position(&self) -> ZipPosition {
        ZipPosition {
            offset: self.cursor_offset,
            index: self.cursor_index,
        }
    }

    /// Restore a previously saved enumeration cursor.
    pub fn set_position(&mut self, position: ZipPosition) {
        self.cursor_offset = position.offset;
        self.cursor_index = position.index;
    }

    /// Find an entry by name with a linear scan from the first entry.
    ///
    /// Archives are not sorted, so this is O(entries). With
    /// `case_sensitive` clear the comparison folds ASCII case. On a
    /// miss the cursor is restored to its state before the call and
    /// `EntryNotFound` is returned; on a hit the cursor rests just past
    /// the found entry.
    pub fn locate(&mut self, name: &str, case_sensitive: bool) -> Result<CentralDirEntry> {
        let saved = self.position();

        let mut next = self.first_entry()?;
        while let Some(entry) = next {
            let matched = if case_sensitive {
                entry.name == name
            } else {
                entry.name.eq_ignore_ascii_case(name)
            };
            if matched {
                return Ok(entry);
            }
            next = self.next_entry()?;
        }

        self.set_position(saved);
        Err(CartonError::entry_not_found(name))
    }

    /// Materialize the full entry listing.
    ///
    /// The enumeration cursor is restored to its state before the call.
    pub fn entries(&mut self) -> Result<Vec<CentralDirEntry>> {
        let saved = self.position();

        let mut list = Vec::with_capacity(self.eocd.entries_total as usize);
        let mut next = self.first_entry()?;
        while let Some(entry) = next {
            list.push(entry);
            next = self.next_entry()?;
        }

        self.set_position(saved);
        Ok(list)
    }

    /// Open an entry for reading.
    ///
    /// Seeks to the entry's local file header, verifies its signature,
    /// and cross-validates it against the central directory record: the
    /// compression method always, and CRC/sizes unless flag bit 3 says
    /// they were unknown when the local header was written. The payload
    /// starts after the local header's own name and extra fields, whose
    /// lengths may differ from the central directory copy.
    pub fn open_entry(&mut self, entry: &CentralDirEntry) -> Result<EntryReader<'_, R>> {
        if entry.is_encrypted() {
            return Err(CartonError::bad_zip("encrypted entries are not supported"));
        }
        if entry.method != METHOD_STORED && entry.method != METHOD_DEFLATE {
            return Err(CartonError::unsupported_method(entry.method));
        }

        let header_pos = self.base_offset + entry.local_header_offset as u64;
        self.reader.seek(SeekFrom::Start(header_pos))?;
        let local = LocalFileHeader::read(&mut self.reader)?;

        if local.method != entry.method {
            return Err(CartonError::bad_zip(
                "compression method differs between local and central headers",
            ));
        }
        if !entry.has_data_descriptor() {
            if local.crc32 != entry.crc32 {
                return Err(CartonError::bad_zip(
                    "CRC differs between local and central headers",
                ));
            }
            if local.compressed_size != entry.compressed_size
                || local.uncompressed_size != entry.uncompressed_size
            {
                return Err(CartonError::bad_zip(
                    "sizes differ between local and central headers",
                ));
            }
        }

        let payload_offset = header_pos
            + LOCAL_HEADER_FIXED_SIZE
            + local.name_len as u64
            + local.extra_len as u64;

        Ok(EntryReader::new(self, entry.clone(), payload_offset))
    }
}
