//! Test-local ZIP builder and minimal DEFLATE emitters.
//!
//! The library has no writer path, so tests construct archives byte by
//! byte: local headers, payloads, central directory, and the end record,
//! with hooks for the awkward shapes real archives come in (flag bit 3,
//! self-extracting prefixes, odd methods).

use carton_core::checksum::Crc32;

const LOCAL_SIG: u32 = 0x04034B50;
const CENTRAL_SIG: u32 = 0x02014B50;
const EOCD_SIG: u32 = 0x06054B50;
const DESCRIPTOR_SIG: u32 = 0x08074B50;

pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
pub const FLAG_ENCRYPTED: u16 = 0x0001;

const DOS_TIME: u16 = (12 << 11) | (30 << 5) | 5;
const DOS_DATE: u16 = ((2024 - 1980) << 9) | (6 << 5) | 15;

struct EntrySpec {
    name: String,
    data: Vec<u8>,
    stream: Vec<u8>,
    method: u16,
    flags: u16,
    /// Write zeros for CRC/sizes in the local header and append a data
    /// descriptor, as streaming writers do.
    streamed: bool,
}

/// Byte offsets of one entry in the built archive.
#[derive(Debug, Clone, Copy)]
pub struct EntryLayout {
    /// Absolute offset of the local header.
    pub local_offset: usize,
    /// Absolute offset of the payload.
    pub payload_offset: usize,
}

/// Offsets of the whole-archive records.
#[derive(Debug)]
pub struct ZipFixture {
    pub bytes: Vec<u8>,
    pub entries: Vec<EntryLayout>,
    /// Absolute offset of the central directory.
    pub central_dir_offset: usize,
    /// Absolute offset of the end-of-central-directory record.
    pub eocd_offset: usize,
}

pub struct ZipBuilder {
    prefix: Vec<u8>,
    comment: Vec<u8>,
    entries: Vec<EntrySpec>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            prefix: Vec::new(),
            comment: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Prepend bytes before the archive (self-extracting stub).
    pub fn prefix(mut self, bytes: &[u8]) -> Self {
        self.prefix = bytes.to_vec();
        self
    }

    /// Set the archive comment.
    pub fn comment(mut self, bytes: &[u8]) -> Self {
        self.comment = bytes.to_vec();
        self
    }

    /// Add a stored (method 0) entry.
    pub fn add_stored(self, name: &str, data: &[u8]) -> Self {
        self.add_raw(name, data, data, 0, 0, false)
    }

    /// Add a deflate (method 8) entry with the given compressed stream.
    pub fn add_deflate(self, name: &str, data: &[u8], stream: &[u8]) -> Self {
        self.add_raw(name, data, stream, 8, 0, false)
    }

    /// Full control over method, flags, and streamed (bit 3) layout.
    pub fn add_raw(
        mut self,
        name: &str,
        data: &[u8],
        stream: &[u8],
        method: u16,
        flags: u16,
        streamed: bool,
    ) -> Self {
        self.entries.push(EntrySpec {
            name: name.to_string(),
            data: data.to_vec(),
            stream: stream.to_vec(),
            method,
            flags: if streamed {
                flags | FLAG_DATA_DESCRIPTOR
            } else {
                flags
            },
            streamed,
        });
        self
    }

    pub fn build(self) -> ZipFixture {
        let mut out = self.prefix.clone();
        let prefix_len = self.prefix.len();
        let mut layouts = Vec::new();

        // Local headers and payloads
        let mut local_offsets = Vec::new();
        for entry in &self.entries {
            let local_offset = out.len();
            local_offsets.push((out.len() - prefix_len) as u32);

            let crc = Crc32::compute(&entry.data);
            let (l_crc, l_csize, l_usize) = if entry.streamed {
                (0u32, 0u32, 0u32)
            } else {
                (crc, entry.stream.len() as u32, entry.data.len() as u32)
            };

            push_u32(&mut out, LOCAL_SIG);
            push_u16(&mut out, 20); // version needed
            push_u16(&mut out, entry.flags);
            push_u16(&mut out, entry.method);
            push_u16(&mut out, DOS_TIME);
            push_u16(&mut out, DOS_DATE);
            push_u32(&mut out, l_crc);
            push_u32(&mut out, l_csize);
            push_u32(&mut out, l_usize);
            push_u16(&mut out, entry.name.len() as u16);
            push_u16(&mut out, 0); // extra length

            out.extend_from_slice(entry.name.as_bytes());

            let payload_offset = out.len();
            out.extend_from_slice(&entry.stream);

            if entry.streamed {
                push_u32(&mut out, DESCRIPTOR_SIG);
                push_u32(&mut out, crc);
                push_u32(&mut out, entry.stream.len() as u32);
                push_u32(&mut out, entry.data.len() as u32);
            }

            layouts.push(EntryLayout {
                local_offset,
                payload_offset,
            });
        }

        // Central directory
        let central_dir_offset = out.len();
        let cd_rel = (out.len() - prefix_len) as u32;
        for (entry, &local_rel) in self.entries.iter().zip(&local_offsets) {
            push_u32(&mut out, CENTRAL_SIG);
            push_u16(&mut out, 20); // version made by
            push_u16(&mut out, 20); // version needed
            push_u16(&mut out, entry.flags);
            push_u16(&mut out, entry.method);
            push_u16(&mut out, DOS_TIME);
            push_u16(&mut out, DOS_DATE);
            push_u32(&mut out, Crc32::compute(&entry.data));
            push_u32(&mut out, entry.stream.len() as u32);
            push_u32(&mut out, entry.data.len() as u32);
            push_u16(&mut out, entry.name.len() as u16);
            push_u16(&mut out, 0); // extra length
            push_u16(&mut out, 0); // comment length
            push_u16(&mut out, 0); // disk number start
            push_u16(&mut out, 0); // internal attributes
            push_u32(&mut out, 0); // external attributes
            push_u32(&mut out, local_rel);
            out.extend_from_slice(entry.name.as_bytes());
        }
        let cd_size = (out.len() - central_dir_offset) as u32;

        // End of central directory
        let eocd_offset = out.len();
        let count = self.entries.len() as u16;
        push_u32(&mut out, EOCD_SIG);
        push_u16(&mut out, 0); // this disk
        push_u16(&mut out, 0); // central dir disk
        push_u16(&mut out, count);
        push_u16(&mut out, count);
        push_u32(&mut out, cd_size);
        push_u32(&mut out, cd_rel);
        push_u16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);

        ZipFixture {
            bytes: out,
            entries: layouts,
            central_dir_offset,
            eocd_offset,
        }
    }
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Wrap data in stored DEFLATE blocks (a valid method-8 stream).
pub fn deflate_stored(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    if data.is_empty() {
        out.extend_from_slice(&[0x01, 0x00, 0x00, 0xFF, 0xFF]);
        return out;
    }
    let mut chunks = data.chunks(0xFFFF).peekable();
    while let Some(chunk) = chunks.next() {
        out.push(chunks.peek().is_none() as u8);
        let len = chunk.len() as u16;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(chunk);
    }
    out
}

/// A fixed-Huffman DEFLATE stream producing `total` copies of `byte`
/// through distance-1 back-references.
pub fn deflate_repeated(byte: u8, total: usize) -> Vec<u8> {
    assert!(total >= 1);
    let mut bits: Vec<bool> = Vec::new();

    fn push_code(bits: &mut Vec<bool>, code: u16, len: u32) {
        for i in (0..len).rev() {
            bits.push((code >> i) & 1 != 0);
        }
    }
    fn push_extra(bits: &mut Vec<bool>, value: u16, count: u32) {
        for i in 0..count {
            bits.push((value >> i) & 1 != 0);
        }
    }
    fn litlen_code(symbol: u16) -> (u16, u32) {
        match symbol {
            0..=143 => (0x30 + symbol, 8),
            144..=255 => (0x190 + (symbol - 144), 9),
            256..=279 => (symbol - 256, 7),
            _ => (0xC0 + (symbol - 280), 8),
        }
    }
    fn length_symbol(length: u16) -> (u16, u32, u16) {
        const BASE: [u16; 29] = [
            3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99,
            115, 131, 163, 195, 227, 258,
        ];
        const EXTRA: [u32; 29] = [
            0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
        ];
        let idx = if length == 258 {
            28
        } else {
            BASE[..28].iter().rposition(|&b| b <= length).unwrap()
        };
        (257 + idx as u16, EXTRA[idx], length - BASE[idx])
    }

    bits.push(true); // BFINAL
    bits.push(true); // BTYPE = 01 (low bit first)
    bits.push(false);

    let (code, len) = litlen_code(byte as u16);
    push_code(&mut bits, code, len);

    let mut remaining = total - 1;
    while remaining > 0 {
        let run = remaining.min(258);
        if run < 3 {
            for _ in 0..run {
                let (code, len) = litlen_code(byte as u16);
                push_code(&mut bits, code, len);
            }
        } else {
            let (symbol, extra_bits, extra) = length_symbol(run as u16);
            let (code, len) = litlen_code(symbol);
            push_code(&mut bits, code, len);
            push_extra(&mut bits, extra, extra_bits);
            push_code(&mut bits, 0, 5); // distance code 0 = distance 1
        }
        remaining -= run;
    }
    push_code(&mut bits, 0, 7); // end of block

    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}
