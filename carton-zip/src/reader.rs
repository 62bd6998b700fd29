//! Per-entry decompression sessions.

use crate::archive::ZipArchive;
use crate::records::{CentralDirEntry, METHOD_DEFLATE};
use carton_core::checksum::Crc32;
use carton_core::error::{CartonError, Result};
use carton_core::slide::SlideBuffer;
use carton_inflate::{InflateFlags, InflateStatus, Inflater, WINDOW_SIZE};
use std::io::{self, Read, Seek, SeekFrom};

/// Size of the compressed read-ahead buffer.
const INPUT_BUFFER_SIZE: usize = 16384;

/// An open read session for one archive entry.
///
/// Created by [`ZipArchive::open_entry`]; holds the archive's mutable
/// borrow for its lifetime, so the session is exclusive and enumeration
/// resumes only after it is dropped or closed. The session maintains a
/// running CRC-32 over delivered bytes; [`EntryReader::close`] verifies
/// it against the stored value.
#[derive(Debug)]
pub struct EntryReader<'a, R: Read + Seek> {
    archive: &'a mut ZipArchive<R>,
    entry: CentralDirEntry,
    /// Source offset of the next compressed byte to fetch.
    fetch_offset: u64,
    /// Compressed bytes not yet fetched from the source.
    rest_compressed: u64,
    /// Uncompressed bytes not yet delivered to the caller.
    rest_uncompressed: u64,
    crc: Crc32,
    /// Read-ahead for compressed bytes (deflate only).
    input: SlideBuffer,
    inflater: Inflater,
    /// Wrapping output window (deflate only).
    window: Vec<u8>,
    /// Next write position in the window.
    window_pos: usize,
    /// Next window byte to hand to the caller.
    deliver_pos: usize,
    /// The inflate engine reported end of stream.
    stream_done: bool,
}

impl<'a, R: Read + Seek> EntryReader<'a, R> {
    pub(crate) fn new(
        archive: &'a mut ZipArchive<R>,
        entry: CentralDirEntry,
        payload_offset: u64,
    ) -> Self {
        let deflate = entry.method == METHOD_DEFLATE;
        let rest_compressed = entry.compressed_size as u64;
        let rest_uncompressed = entry.uncompressed_size as u64;
        Self {
            archive,
            entry,
            fetch_offset: payload_offset,
            rest_compressed,
            rest_uncompressed,
            crc: Crc32::new(),
            input: SlideBuffer::new(if deflate { INPUT_BUFFER_SIZE } else { 1 }),
            inflater: Inflater::new(),
            window: if deflate { vec![0u8; WINDOW_SIZE] } else { Vec::new() },
            window_pos: 0,
            deliver_pos: 0,
            stream_done: false,
        }
    }

    /// The entry this session reads.
    pub fn entry(&self) -> &CentralDirEntry {
        &self.entry
    }

    /// Uncompressed bytes not yet delivered.
    pub fn remaining(&self) -> u64 {
        self.rest_uncompressed
    }

    /// Read decompressed bytes into `buf`.
    ///
    /// Returns 0 at end of stream. The total delivered over a session
    /// never exceeds the entry's declared uncompressed size.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || self.rest_uncompressed == 0 {
            return Ok(0);
        }
        if self.entry.method == METHOD_DEFLATE {
            self.read_deflate(buf)
        } else {
            self.read_stored(buf)
        }
    }

    /// Verify the running CRC against the stored value and end the
    /// session.
    ///
    /// The comparison happens only if every byte was delivered and the
    /// entry does not use flag bit 3 (under which the header CRC was
    /// unknowable at write time).
    pub fn close(self) -> Result<()> {
        if self.rest_uncompressed == 0 && !self.entry.has_data_descriptor() {
            let computed = self.crc.value();
            if computed != self.entry.crc32 {
                return Err(CartonError::crc_mismatch(self.entry.crc32, computed));
            }
        }
        Ok(())
    }

    /// Stored entries copy straight from the source.
    fn read_stored(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = (buf.len() as u64).min(self.rest_uncompressed) as usize;

        self.archive.reader.seek(SeekFrom::Start(self.fetch_offset))?;
        self.archive.reader.read_exact(&mut buf[..n])?;

        self.fetch_offset += n as u64;
        self.rest_compressed = self.rest_compressed.saturating_sub(n as u64);
        self.rest_uncompressed -= n as u64;
        self.crc.update(&buf[..n]);
        Ok(n)
    }

    /// Deflate entries drive the inflate engine through the window.
    fn read_deflate(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            // Deliver bytes already decoded into the window
            if self.deliver_pos < self.window_pos {
                let n = (self.window_pos - self.deliver_pos)
                    .min(buf.len())
                    .min(self.rest_uncompressed as usize);
                buf[..n].copy_from_slice(&self.window[self.deliver_pos..self.deliver_pos + n]);
                self.crc.update(&buf[..n]);
                self.deliver_pos += n;
                self.rest_uncompressed -= n as u64;

                // Window fully drained after filling up: wrap around
                if self.deliver_pos == self.window.len() && self.window_pos == self.window.len() {
                    self.deliver_pos = 0;
                    self.window_pos = 0;
                }
                return Ok(n);
            }

            if self.stream_done {
                if self.rest_uncompressed > 0 {
                    return Err(CartonError::decompress(
                        "compressed stream ended before the entry's declared size",
                    ));
                }
                return Ok(0);
            }

            // Refill the read-ahead, never past the compressed payload
            if self.input.is_empty() && self.rest_compressed > 0 {
                self.archive.reader.seek(SeekFrom::Start(self.fetch_offset))?;
                let limit = self.rest_compressed.min(usize::MAX as u64) as usize;
                let fetched = self.input.refill(&mut self.archive.reader, limit)?;
                if fetched == 0 {
                    return Err(CartonError::bad_zip("entry payload is truncated"));
                }
                self.fetch_offset += fetched as u64;
                self.rest_compressed -= fetched as u64;
            }

            let flags = InflateFlags {
                has_more_input: self.rest_compressed > 0,
                ..InflateFlags::default()
            };
            let (consumed, produced, status) = self.inflater.inflate(
                self.input.as_slice(),
                &mut self.window,
                self.window_pos,
                flags,
            )?;
            self.input.consume(consumed);
            self.window_pos += produced;

            let pending = (self.window_pos - self.deliver_pos) as u64;
            if pending > self.rest_uncompressed {
                return Err(CartonError::bad_zip(
                    "entry decompressed to more than its declared size",
                ));
            }

            match status {
                InflateStatus::Done => self.stream_done = true,
                InflateStatus::HasMoreOutput | InflateStatus::NeedsMoreInput => {}
            }
        }
    }
}

impl<R: Read + Seek> Read for EntryReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        EntryReader::read(self, buf).map_err(io::Error::other)
    }
}
