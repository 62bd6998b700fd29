//! Listing and extraction orchestration.
//!
//! Thin drivers over the archive cursor and entry sessions: open an
//! entry, loop reads, close (surfacing the CRC verdict), in enumeration
//! order. Entry names pass through [`CentralDirEntry::sanitized_name`]
//! before touching the filesystem.

use crate::archive::ZipArchive;
use crate::records::CentralDirEntry;
use carton_core::error::Result;
use std::fs;
use std::io::{Read, Seek, Write};
use std::path::Path;

/// Read one entry to a writer, verifying its CRC.
///
/// Returns the number of bytes written.
pub fn read_entry_to<R: Read + Seek, W: Write>(
    archive: &mut ZipArchive<R>,
    entry: &CentralDirEntry,
    writer: &mut W,
) -> Result<u64> {
    let mut session = archive.open_entry(entry)?;
    let mut buf = [0u8; 16384];
    let mut written = 0u64;

    loop {
        let n = session.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        written += n as u64;
    }

    session.close()?;
    Ok(written)
}

/// Read one entry into a fresh buffer, verifying its CRC.
pub fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    entry: &CentralDirEntry,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
    read_entry_to(archive, entry, &mut out)?;
    Ok(out)
}

/// Extract every entry under `dest`, creating directories as needed.
///
/// Entry names are sanitized, so absolute paths and `..` components
/// cannot escape `dest`; entries whose names sanitize to nothing are
/// skipped. Returns the number of files written. A structural or CRC
/// failure aborts with the error.
pub fn extract_all<R: Read + Seek>(archive: &mut ZipArchive<R>, dest: &Path) -> Result<usize> {
    let mut files_written = 0usize;

    let mut next = archive.first_entry()?;
    while let Some(entry) = next {
        let safe_name = entry.sanitized_name();
        if safe_name.is_empty() {
            next = archive.next_entry()?;
            continue;
        }

        let path = dest.join(&safe_name);
        if entry.is_dir() {
            fs::create_dir_all(&path)?;
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&path)?;
            read_entry_to(archive, &entry, &mut file)?;
            files_written += 1;
        }

        next = archive.next_entry()?;
    }

    Ok(files_written)
}
