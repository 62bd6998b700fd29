//! ZIP wire records (PKWARE APPNOTE layout).
//!
//! Three record types matter for reading:
//!
//! - the **end-of-central-directory** trailer, located by a backward
//!   signature scan over the last 64 KiB of the source;
//! - **central directory file headers**, the authoritative per-entry
//!   metadata block near the end of the archive;
//! - **local file headers**, the second metadata copy stored immediately
//!   before each entry's payload, read only for cross-validation.
//!
//! All integers are little-endian on disk; variable-length fields follow
//! their fixed record at exactly the declared lengths.

use carton_core::error::{CartonError, Result};
use encoding_rs::Encoding;
use std::io::{Read, Seek, SeekFrom};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// ZIP local file header signature.
pub const LOCAL_FILE_HEADER_SIG: u32 = 0x04034B50;

/// ZIP central directory header signature.
pub const CENTRAL_DIR_HEADER_SIG: u32 = 0x02014B50;

/// ZIP end of central directory signature.
pub const END_OF_CENTRAL_DIR_SIG: u32 = 0x06054B50;

/// Flag bit for traditional encryption.
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// Flag bit 3: sizes and CRC were unknown at write time; a data
/// descriptor follows the payload and the local header fields are zero.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// Flag bit 11: the entry name and comment are UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// Compression method: stored (no compression).
pub const METHOD_STORED: u16 = 0;

/// Compression method: DEFLATE.
pub const METHOD_DEFLATE: u16 = 8;

/// Fixed size of the end-of-central-directory record.
pub(crate) const EOCD_FIXED_SIZE: usize = 22;

/// Fixed size of a central directory file header.
pub(crate) const CENTRAL_DIR_FIXED_SIZE: usize = 46;

/// Fixed size of a local file header.
pub(crate) const LOCAL_HEADER_FIXED_SIZE: u64 = 30;

/// How far from the end of the source the EOCD may start: the maximum
/// comment length plus the fixed record.
const EOCD_SEARCH_LIMIT: u64 = 0xFFFF + EOCD_FIXED_SIZE as u64;

/// Read window for the backward EOCD scan.
const EOCD_SCAN_WINDOW: usize = 4096;

/// Policy for decoding entry names that lack the UTF-8 flag.
///
/// Names with [`FLAG_UTF8`] set are always decoded as UTF-8. For legacy
/// archives the encoding is not recorded, so the caller chooses.
#[derive(Debug, Clone, Copy, Default)]
pub enum NameDecoding {
    /// Decode as UTF-8, replacing invalid sequences (the default).
    #[default]
    Utf8Lossy,
    /// Decode with the given encoding, replacing invalid sequences.
    Encoding(&'static Encoding),
    /// Decode with the given encoding; malformed input is an error.
    Strict(&'static Encoding),
}

/// Decode an entry name according to its flags and the archive policy.
pub(crate) fn decode_name(raw: &[u8], flags: u16, decoding: NameDecoding) -> Result<String> {
    if flags & FLAG_UTF8 != 0 {
        return Ok(String::from_utf8_lossy(raw).into_owned());
    }
    match decoding {
        NameDecoding::Utf8Lossy => Ok(String::from_utf8_lossy(raw).into_owned()),
        NameDecoding::Encoding(encoding) => {
            let (decoded, _, _) = encoding.decode(raw);
            Ok(decoded.into_owned())
        }
        NameDecoding::Strict(encoding) => {
            let (decoded, _, had_errors) = encoding.decode(raw);
            if had_errors {
                return Err(CartonError::encoding(format!(
                    "entry name is not valid {}",
                    encoding.name()
                )));
            }
            Ok(decoded.into_owned())
        }
    }
}

/// The end-of-central-directory record.
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    /// Number of this disk.
    pub disk_number: u16,
    /// Disk where the central directory starts.
    pub central_dir_disk: u16,
    /// Central directory records on this disk.
    pub entries_this_disk: u16,
    /// Total central directory records.
    pub entries_total: u16,
    /// Size of the central directory in bytes.
    pub central_dir_size: u32,
    /// Offset of the central directory from the start of the archive.
    pub central_dir_offset: u32,
    /// Archive comment bytes.
    pub comment: Vec<u8>,
    /// Byte offset of this record in the source.
    pub offset: u64,
}

impl EndOfCentralDirectory {
    /// Locate and parse the EOCD record.
    ///
    /// Scans backward from the end of the source for the signature,
    /// covering at most the trailing 64 KiB plus the record itself, one
    /// 4 KiB window at a time. Absence means the input is not a ZIP
    /// archive (or was truncated before its central directory).
    pub fn find<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let source_len = reader.seek(SeekFrom::End(0))?;
        if source_len < EOCD_FIXED_SIZE as u64 {
            return Err(CartonError::NotAnArchive);
        }

        let max_back = EOCD_SEARCH_LIMIT.min(source_len);
        let signature = END_OF_CENTRAL_DIR_SIG.to_le_bytes();

        // Windows overlap by 3 bytes so a signature straddling two
        // windows is still seen.
        let mut buf = vec![0u8; EOCD_SCAN_WINDOW + 3];
        let mut back = 3u64;
        let mut found = None;

        while back < max_back && found.is_none() {
            back = (back + EOCD_SCAN_WINDOW as u64).min(max_back);
            let read_pos = source_len - back;
            let read_size = buf.len().min((source_len - read_pos) as usize);
            reader.seek(SeekFrom::Start(read_pos))?;
            reader.read_exact(&mut buf[..read_size])?;

            if let Some(i) = buf[..read_size].windows(4).rposition(|w| w == signature) {
                found = Some(read_pos + i as u64);
            }
        }

        let offset = found.ok_or(CartonError::NotAnArchive)?;

        reader.seek(SeekFrom::Start(offset))?;
        let mut rec = [0u8; EOCD_FIXED_SIZE];
        reader.read_exact(&mut rec)?;

        let disk_number = u16::from_le_bytes([rec[4], rec[5]]);
        let central_dir_disk = u16::from_le_bytes([rec[6], rec[7]]);
        let entries_this_disk = u16::from_le_bytes([rec[8], rec[9]]);
        let entries_total = u16::from_le_bytes([rec[10], rec[11]]);
        let central_dir_size = u32::from_le_bytes([rec[12], rec[13], rec[14], rec[15]]);
        let central_dir_offset = u32::from_le_bytes([rec[16], rec[17], rec[18], rec[19]]);
        let comment_len = u16::from_le_bytes([rec[20], rec[21]]) as usize;

        let mut comment = vec![0u8; comment_len];
        reader.read_exact(&mut comment).map_err(|_| {
            CartonError::bad_zip("archive comment extends past the end of the file")
        })?;

        Ok(Self {
            disk_number,
            central_dir_disk,
            entries_this_disk,
            entries_total,
            central_dir_size,
            central_dir_offset,
            comment,
            offset,
        })
    }
}

/// One central directory file header with its variable-length fields.
#[derive(Debug, Clone)]
pub struct CentralDirEntry {
    /// Version (and host system) that wrote the entry.
    pub version_made_by: u16,
    /// Minimum version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Compression method (0 = stored, 8 = deflate).
    pub method: u16,
    /// Last modification time, DOS format.
    pub dos_time: u16,
    /// Last modification date, DOS format.
    pub dos_date: u16,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Size of the compressed payload.
    pub compressed_size: u32,
    /// Size of the uncompressed data.
    pub uncompressed_size: u32,
    /// Disk on which the entry starts.
    pub disk_number_start: u16,
    /// Internal file attributes.
    pub internal_attributes: u16,
    /// External (host-specific) file attributes.
    pub external_attributes: u32,
    /// Offset of the local file header from the start of the archive.
    pub local_header_offset: u32,
    /// Entry name decoded per the archive's [`NameDecoding`] policy.
    pub name: String,
    /// Entry name exactly as stored.
    pub raw_name: Vec<u8>,
    /// Extra field bytes.
    pub extra: Vec<u8>,
    /// Entry comment bytes.
    pub comment: Vec<u8>,
}

impl CentralDirEntry {
    /// Parse one record, reader positioned at the signature.
    pub(crate) fn read<R: Read>(reader: &mut R, decoding: NameDecoding) -> Result<Self> {
        let mut buf = [0u8; CENTRAL_DIR_FIXED_SIZE];
        reader.read_exact(&mut buf)?;

        let signature = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if signature != CENTRAL_DIR_HEADER_SIG {
            return Err(CartonError::bad_zip(
                "central directory header signature mismatch",
            ));
        }

        let version_made_by = u16::from_le_bytes([buf[4], buf[5]]);
        let version_needed = u16::from_le_bytes([buf[6], buf[7]]);
        let flags = u16::from_le_bytes([buf[8], buf[9]]);
        let method = u16::from_le_bytes([buf[10], buf[11]]);
        let dos_time = u16::from_le_bytes([buf[12], buf[13]]);
        let dos_date = u16::from_le_bytes([buf[14], buf[15]]);
        let crc32 = u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]);
        let compressed_size = u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]);
        let uncompressed_size = u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]);
        let name_len = u16::from_le_bytes([buf[28], buf[29]]) as usize;
        let extra_len = u16::from_le_bytes([buf[30], buf[31]]) as usize;
        let comment_len = u16::from_le_bytes([buf[32], buf[33]]) as usize;
        let disk_number_start = u16::from_le_bytes([buf[34], buf[35]]);
        let internal_attributes = u16::from_le_bytes([buf[36], buf[37]]);
        let external_attributes = u32::from_le_bytes([buf[38], buf[39], buf[40], buf[41]]);
        let local_header_offset = u32::from_le_bytes([buf[42], buf[43], buf[44], buf[45]]);

        let mut raw_name = vec![0u8; name_len];
        reader.read_exact(&mut raw_name)?;
        let mut extra = vec![0u8; extra_len];
        reader.read_exact(&mut extra)?;
        let mut comment = vec![0u8; comment_len];
        reader.read_exact(&mut comment)?;

        let name = decode_name(&raw_name, flags, decoding)?;

        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            dos_time,
            dos_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_number_start,
            internal_attributes,
            external_attributes,
            local_header_offset,
            name,
            raw_name,
            extra,
            comment,
        })
    }

    /// On-disk size of this record including variable fields.
    pub(crate) fn record_size(&self) -> u64 {
        (CENTRAL_DIR_FIXED_SIZE + self.raw_name.len() + self.extra.len() + self.comment.len()) as u64
    }

    /// The DOS time and date packed as one u32 (time in the low half).
    pub fn dos_datetime(&self) -> u32 {
        (self.dos_date as u32) << 16 | self.dos_time as u32
    }

    /// Whether the entry is a directory (name ends with `/`).
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Whether sizes/CRC were unknown at write time (flag bit 3).
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Whether the entry is encrypted (flag bit 0).
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Convert the DOS date/time to a `SystemTime`.
    pub fn modified_time(&self) -> SystemTime {
        let seconds = (self.dos_time & 0x1F) as u64 * 2;
        let minutes = ((self.dos_time >> 5) & 0x3F) as u64;
        let hours = ((self.dos_time >> 11) & 0x1F) as u64;
        let day = (self.dos_date & 0x1F) as u64;
        let month = ((self.dos_date >> 5) & 0x0F) as u64;
        let year = ((self.dos_date >> 9) & 0x7F) as u64 + 1980;

        // Approximate: days since the Unix epoch
        let days = (year - 1970) * 365 + (year - 1969) / 4 + (month.max(1) - 1) * 30 + day;
        let total_seconds = days * 86400 + hours * 3600 + minutes * 60 + seconds;

        UNIX_EPOCH + Duration::from_secs(total_seconds)
    }

    /// Validate the entry path for extraction.
    ///
    /// Rejects absolute paths, parent-directory components and embedded
    /// null bytes.
    pub fn validate_path(&self) -> Result<()> {
        let path = std::path::Path::new(&self.name);

        if path.is_absolute() {
            return Err(CartonError::bad_zip(format!(
                "unsafe entry path: {}",
                self.name
            )));
        }

        for component in path.components() {
            match component {
                std::path::Component::ParentDir => {
                    return Err(CartonError::bad_zip(format!(
                        "unsafe entry path: {}",
                        self.name
                    )));
                }
                std::path::Component::Normal(part) => {
                    if part.to_string_lossy().contains('\0') {
                        return Err(CartonError::bad_zip(format!(
                            "unsafe entry path: {}",
                            self.name
                        )));
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// A path that is safe for extraction.
    ///
    /// Strips absolute prefixes, `..` components and null bytes; keeps
    /// the trailing `/` convention intact for directories.
    pub fn sanitized_name(&self) -> String {
        let mut result = String::new();

        for component in std::path::Path::new(&self.name).components() {
            match component {
                std::path::Component::Normal(part) => {
                    if !result.is_empty() && !result.ends_with('/') {
                        result.push('/');
                    }
                    result.push_str(&part.to_string_lossy().replace('\0', "_"));
                }
                std::path::Component::CurDir
                | std::path::Component::ParentDir
                | std::path::Component::RootDir
                | std::path::Component::Prefix(_) => {}
            }
        }

        if self.is_dir() && !result.is_empty() {
            result.push('/');
        }

        result
    }
}

/// The local file header copy of an entry's metadata, read only to
/// cross-check against the central directory.
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    /// Minimum version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Compression method.
    pub method: u16,
    /// Last modification time, DOS format.
    pub dos_time: u16,
    /// Last modification date, DOS format.
    pub dos_date: u16,
    /// CRC-32 of the uncompressed data (zero under flag bit 3).
    pub crc32: u32,
    /// Compressed payload size (zero under flag bit 3).
    pub compressed_size: u32,
    /// Uncompressed size (zero under flag bit 3).
    pub uncompressed_size: u32,
    /// Length of the name that follows the fixed header.
    pub name_len: u16,
    /// Length of the extra field that follows the name.
    pub extra_len: u16,
}

impl LocalFileHeader {
    /// Parse the fixed 30-byte header, reader positioned at the
    /// signature. The name and extra field are left unread; their
    /// lengths locate the payload.
    pub(crate) fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; LOCAL_HEADER_FIXED_SIZE as usize];
        reader.read_exact(&mut buf)?;

        let signature = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if signature != LOCAL_FILE_HEADER_SIG {
            return Err(CartonError::bad_zip("local file header signature mismatch"));
        }

        Ok(Self {
            version_needed: u16::from_le_bytes([buf[4], buf[5]]),
            flags: u16::from_le_bytes([buf[6], buf[7]]),
            method: u16::from_le_bytes([buf[8], buf[9]]),
            dos_time: u16::from_le_bytes([buf[10], buf[11]]),
            dos_date: u16::from_le_bytes([buf[12], buf[13]]),
            crc32: u32::from_le_bytes([buf[14], buf[15], buf[16], buf[17]]),
            compressed_size: u32::from_le_bytes([buf[18], buf[19], buf[20], buf[21]]),
            uncompressed_size: u32::from_le_bytes([buf[22], buf[23], buf[24], buf[25]]),
            name_len: u16::from_le_bytes([buf[26], buf[27]]),
            extra_len: u16::from_le_bytes([buf[28], buf[29]]),
        })
    }
}
