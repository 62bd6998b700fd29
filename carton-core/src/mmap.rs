//! Memory-mapped byte source.
//!
//! Maps a file read-only and exposes it through `Read + Seek`, so a
//! mapping can serve as the archive byte source without copying the file
//! into memory first. Enabled with the `mmap` feature.

use crate::error::Result;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// A read-only memory-mapped file usable as an archive byte source.
#[derive(Debug)]
pub struct MmapSource {
    mmap: Mmap,
    pos: u64,
}

impl MmapSource {
    /// Map the file at `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only; mutation of the underlying
        // file by other processes is outside this crate's contract.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap, pos: 0 })
    }

    /// Length of the mapped file in bytes.
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Check whether the mapped file is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// The full mapped contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

impl Read for MmapSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.pos.min(self.len()) as usize;
        let remaining = &self.mmap[start..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MmapSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match new_pos {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of mapping",
            )),
        }
    }
}
