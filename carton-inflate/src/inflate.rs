//! Resumable DEFLATE decompression (RFC 1951, optionally RFC 1950).
//!
//! [`Inflater`] decodes a DEFLATE bitstream one call at a time,
//! suspending whenever input is exhausted or output space is full and
//! resuming exactly where it left off. The original implementation of
//! this engine was a single function full of numbered resume points; here
//! every suspend point is a variant of the private `Phase` enum carrying
//! the minimal locals needed to continue.
//!
//! The caller owns both buffers. Output is either:
//!
//! - a **wrapping window** (the default): a power-of-two buffer of at
//!   least the stream's window size, filled round-robin, which the caller
//!   drains between calls; or
//! - a **non-wrapping buffer** ([`InflateFlags::non_wrapping_output`]):
//!   one buffer holding the entire output from the start of the stream.
//!
//! Back-references resolve against bytes already written to the output
//! buffer, which is why the engine needs the cursor position rather than
//! a bare slice.

use crate::huffman::{HuffmanDecode, HuffmanTable};
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS, decode_distance, decode_length,
    fixed_distance_lengths, fixed_litlen_lengths,
};
use carton_core::checksum::Adler32;
use carton_core::error::{CartonError, Result};

/// DEFLATE window size (32 KB); the minimum wrapping output buffer.
pub const WINDOW_SIZE: usize = 32768;

/// Per-call behavior flags for [`Inflater::inflate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InflateFlags {
    /// The stream starts with a zlib header (RFC 1950) and ends with an
    /// Adler-32 trailer.
    pub parse_zlib_header: bool,
    /// More input may arrive in later calls. When clear, running out of
    /// input mid-stream is a hard error instead of a suspension.
    pub has_more_input: bool,
    /// The output buffer holds the whole stream from offset 0 and never
    /// wraps. When clear, the buffer is a power-of-two window filled
    /// round-robin.
    pub non_wrapping_output: bool,
    /// Maintain a running Adler-32 over produced bytes and verify the
    /// zlib trailer against it.
    pub compute_adler32: bool,
}

/// Outcome of one [`Inflater::inflate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflateStatus {
    /// The stream is complete; no more bytes will be produced.
    Done,
    /// Input was exhausted mid-stream; call again with more input.
    NeedsMoreInput,
    /// The output buffer filled up; drain it and call again.
    HasMoreOutput,
}

/// Resume point of the decode state machine, with the saved locals each
/// suspend point needs.
#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Before anything has been read.
    Start,
    /// Reading the 2-byte zlib header.
    ZlibHeader,
    /// Reading the 3-bit block header.
    BlockHeader,
    /// Reading LEN/NLEN of a stored block (after byte alignment).
    StoredHeader,
    /// Copying the raw bytes of a stored block.
    StoredCopy { remaining: u16 },
    /// Reading the 14-bit dynamic table header.
    DynHeader,
    /// Reading 3-bit code lengths of the code-length alphabet.
    DynCodeLengths { index: usize },
    /// Decoding run-length-encoded literal/length + distance lengths.
    DynSymbols,
    /// Reading the extra bits of a repeat code (16/17/18).
    DynRepeat { symbol: u16 },
    /// Decoding literal/length symbols.
    Symbols,
    /// Reading the extra bits of a length code.
    LengthExtra { code: u16 },
    /// Decoding the distance symbol that follows a length.
    DistanceSym { length: u16 },
    /// Reading the extra bits of a distance code.
    DistanceExtra { length: u16, code: u16 },
    /// Copying a back-reference.
    MatchCopy { length: u16, distance: u16 },
    /// Reading the 4-byte Adler-32 trailer.
    ZlibTrailer,
    /// Stream complete.
    Finished,
}

/// Streaming DEFLATE decompressor.
#[derive(Debug)]
pub struct Inflater {
    phase: Phase,
    /// Bit buffer, LSB-first; the next stream bit is bit 0.
    bit_buf: u64,
    /// Number of valid bits in `bit_buf`.
    num_bits: u32,
    /// The current block had the final-block flag set.
    final_block: bool,
    /// Total bytes produced since the start of the stream.
    total_out: u64,
    /// Dynamic header: literal/length code count (HLIT + 257).
    hlit: usize,
    /// Dynamic header: distance code count (HDIST + 1).
    hdist: usize,
    /// Dynamic header: code-length code count (HCLEN + 4).
    hclen: usize,
    /// Code lengths of the code-length alphabet, in symbol order.
    cl_lengths: [u8; 19],
    /// Literal/length + distance code lengths being decoded.
    code_lengths: Vec<u8>,
    /// Next index to fill in `code_lengths`.
    len_index: usize,
    cl_table: HuffmanTable,
    litlen_table: HuffmanTable,
    dist_table: HuffmanTable,
    /// Running Adler-32 over produced bytes.
    adler: Adler32,
}

impl Inflater {
    /// Create a decompressor positioned at the start of a stream.
    pub fn new() -> Self {
        Self {
            phase: Phase::Start,
            bit_buf: 0,
            num_bits: 0,
            final_block: false,
            total_out: 0,
            hlit: 0,
            hdist: 0,
            hclen: 0,
            cl_lengths: [0; 19],
            code_lengths: Vec::new(),
            len_index: 0,
            cl_table: HuffmanTable::empty(),
            litlen_table: HuffmanTable::empty(),
            dist_table: HuffmanTable::empty(),
            adler: Adler32::new(),
        }
    }

    /// Reset to the start of a new stream.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Total bytes produced since the start of the stream.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// The running Adler-32 over produced bytes (meaningful only when
    /// calls pass [`InflateFlags::compute_adler32`]).
    pub fn adler32(&self) -> u32 {
        self.adler.finish()
    }

    /// Whether the stream has been fully decoded.
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished)
    }

    /// Pull input bytes into the bit buffer while there is room.
    #[inline]
    fn fill_bits(&mut self, input: &[u8], in_pos: &mut usize) {
        while self.num_bits <= 56 && *in_pos < input.len() {
            self.bit_buf |= (input[*in_pos] as u64) << self.num_bits;
            *in_pos += 1;
            self.num_bits += 8;
        }
    }

    /// Discard `count` bits from the bit buffer.
    #[inline]
    fn drop_bits(&mut self, count: u32) {
        debug_assert!(count <= self.num_bits);
        self.bit_buf >>= count;
        self.num_bits -= count;
    }

    /// Read `count` bits, filling from input as needed. `None` means the
    /// input is exhausted and the bits are not yet available; nothing is
    /// consumed in that case.
    #[inline]
    fn take_bits(&mut self, input: &[u8], in_pos: &mut usize, count: u32) -> Option<u32> {
        if count == 0 {
            return Some(0);
        }
        if self.num_bits < count {
            self.fill_bits(input, in_pos);
            if self.num_bits < count {
                return None;
            }
        }
        let value = (self.bit_buf & ((1u64 << count) - 1)) as u32;
        self.drop_bits(count);
        Some(value)
    }

    /// Suspend if the caller can supply more input; otherwise the stream
    /// is truncated, which is fatal.
    fn stalled(flags: InflateFlags) -> Result<InflateStatus> {
        if flags.has_more_input {
            Ok(InflateStatus::NeedsMoreInput)
        } else {
            Err(CartonError::decompress(
                "compressed stream ended unexpectedly",
            ))
        }
    }

    /// Phase that follows a completed block.
    fn end_of_block_phase(&self, flags: InflateFlags) -> Phase {
        if self.final_block {
            if flags.parse_zlib_header {
                Phase::ZlibTrailer
            } else {
                Phase::Finished
            }
        } else {
            Phase::BlockHeader
        }
    }

    /// Decompress as much as possible.
    ///
    /// Consumes bytes from `input`, writes decoded bytes to
    /// `output[out_pos..]`, and returns `(bytes_consumed, bytes_written,
    /// status)`. The same stream may be decoded with any split of input
    /// and output across calls; behavior is identical.
    ///
    /// In wrapping mode (the default) `output` must be a power-of-two
    /// window of at least the stream's window size, and the caller must
    /// keep `out_pos` congruent to the total bytes produced so far
    /// modulo the window length — i.e. drain the window exactly when it
    /// fills and restart at 0.
    pub fn inflate(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        out_pos: usize,
        flags: InflateFlags,
    ) -> Result<(usize, usize, InflateStatus)> {
        if out_pos > output.len() {
            return Err(CartonError::bad_param("output cursor past end of buffer"));
        }
        let wrapping = !flags.non_wrapping_output;
        if wrapping && !output.len().is_power_of_two() {
            return Err(CartonError::bad_param(
                "wrapping output buffer length must be a power of two",
            ));
        }
        let mask = output.len().wrapping_sub(1);

        let mut in_pos = 0usize;
        let mut pos = out_pos;
        let start_pos = out_pos;
        let mut adler_mark = out_pos;

        let status = 'machine: loop {
            match self.phase {
                Phase::Start => {
                    self.phase = if flags.parse_zlib_header {
                        Phase::ZlibHeader
                    } else {
                        Phase::BlockHeader
                    };
                }

                Phase::ZlibHeader => {
                    let Some(header) = self.take_bits(input, &mut in_pos, 16) else {
                        break Self::stalled(flags)?;
                    };
                    let cmf = header & 0xFF;
                    let flg = header >> 8;
                    if (cmf * 256 + flg) % 31 != 0 {
                        return Err(CartonError::decompress("zlib header check bits failed"));
                    }
                    if cmf & 0x0F != 8 {
                        return Err(CartonError::decompress(
                            "unsupported zlib compression method",
                        ));
                    }
                    if flg & 0x20 != 0 {
                        return Err(CartonError::decompress(
                            "zlib preset dictionary not supported",
                        ));
                    }
                    let cinfo = cmf >> 4;
                    if cinfo > 7 {
                        return Err(CartonError::decompress("invalid zlib window size"));
                    }
                    if wrapping && (1usize << (8 + cinfo)) > output.len() {
                        return Err(CartonError::decompress(
                            "declared window size exceeds output buffer",
                        ));
                    }
                    self.phase = Phase::BlockHeader;
                }

                Phase::BlockHeader => {
                    let Some(bits) = self.take_bits(input, &mut in_pos, 3) else {
                        break Self::stalled(flags)?;
                    };
                    self.final_block = bits & 1 != 0;
                    match bits >> 1 {
                        0 => self.phase = Phase::StoredHeader,
                        1 => {
                            self.litlen_table =
                                HuffmanTable::from_code_lengths(&fixed_litlen_lengths())?;
                            self.dist_table =
                                HuffmanTable::from_code_lengths(&fixed_distance_lengths())?;
                            self.phase = Phase::Symbols;
                        }
                        2 => self.phase = Phase::DynHeader,
                        _ => return Err(CartonError::decompress("reserved block type 3")),
                    }
                }

                Phase::StoredHeader => {
                    // Discard bits up to the byte boundary; idempotent
                    // across suspensions because fills add whole bytes.
                    let partial = self.num_bits % 8;
                    if partial != 0 {
                        self.drop_bits(partial);
                    }
                    let Some(v) = self.take_bits(input, &mut in_pos, 32) else {
                        break Self::stalled(flags)?;
                    };
                    let len = v & 0xFFFF;
                    let nlen = v >> 16;
                    if len != !nlen & 0xFFFF {
                        return Err(CartonError::decompress(
                            "stored block LEN/NLEN check failed",
                        ));
                    }
                    self.phase = Phase::StoredCopy {
                        remaining: len as u16,
                    };
                }

                Phase::StoredCopy { mut remaining } => {
                    // Bytes already pulled into the bit buffer come first
                    while remaining > 0 && self.num_bits >= 8 {
                        if pos >= output.len() {
                            self.phase = Phase::StoredCopy { remaining };
                            break 'machine InflateStatus::HasMoreOutput;
                        }
                        output[pos] = (self.bit_buf & 0xFF) as u8;
                        self.drop_bits(8);
                        pos += 1;
                        self.total_out += 1;
                        remaining -= 1;
                    }

                    // Then straight from the input slice
                    let n = (remaining as usize)
                        .min(input.len() - in_pos)
                        .min(output.len() - pos);
                    if n > 0 {
                        output[pos..pos + n].copy_from_slice(&input[in_pos..in_pos + n]);
                        in_pos += n;
                        pos += n;
                        self.total_out += n as u64;
                        remaining -= n as u16;
                    }

                    if remaining == 0 {
                        self.phase = self.end_of_block_phase(flags);
                    } else if pos >= output.len() {
                        self.phase = Phase::StoredCopy { remaining };
                        break InflateStatus::HasMoreOutput;
                    } else {
                        self.phase = Phase::StoredCopy { remaining };
                        break Self::stalled(flags)?;
                    }
                }

                Phase::DynHeader => {
                    let Some(v) = self.take_bits(input, &mut in_pos, 14) else {
                        break Self::stalled(flags)?;
                    };
                    self.hlit = (v & 0x1F) as usize + 257;
                    self.hdist = ((v >> 5) & 0x1F) as usize + 1;
                    self.hclen = ((v >> 10) & 0x0F) as usize + 4;
                    if self.hlit > 286 || self.hdist > 30 {
                        return Err(CartonError::decompress(
                            "too many literal/length or distance symbols",
                        ));
                    }
                    self.cl_lengths = [0; 19];
                    self.phase = Phase::DynCodeLengths { index: 0 };
                }

                Phase::DynCodeLengths { mut index } => {
                    while index < self.hclen {
                        let Some(v) = self.take_bits(input, &mut in_pos, 3) else {
                            self.phase = Phase::DynCodeLengths { index };
                            break 'machine Self::stalled(flags)?;
                        };
                        self.cl_lengths[CODE_LENGTH_ORDER[index]] = v as u8;
                        index += 1;
                    }
                    self.cl_table = HuffmanTable::from_code_lengths(&self.cl_lengths)?;
                    self.code_lengths.clear();
                    self.code_lengths.resize(self.hlit + self.hdist, 0);
                    self.len_index = 0;
                    self.phase = Phase::DynSymbols;
                }

                Phase::DynSymbols => {
                    if self.len_index < self.code_lengths.len() {
                        self.fill_bits(input, &mut in_pos);
                        let word = self.bit_buf as u32;
                        let available = self.num_bits.min(32);
                        match self.cl_table.decode(word, available) {
                            HuffmanDecode::NeedMoreBits => break Self::stalled(flags)?,
                            HuffmanDecode::Invalid => {
                                return Err(CartonError::decompress("invalid code-length code"));
                            }
                            HuffmanDecode::Symbol { symbol, length } => {
                                self.drop_bits(length);
                                match symbol {
                                    0..=15 => {
                                        self.code_lengths[self.len_index] = symbol as u8;
                                        self.len_index += 1;
                                    }
                                    16..=18 => self.phase = Phase::DynRepeat { symbol },
                                    _ => {
                                        return Err(CartonError::decompress(
                                            "invalid code-length code",
                                        ));
                                    }
                                }
                            }
                        }
                    } else {
                        if self.code_lengths[256] == 0 {
                            return Err(CartonError::decompress("missing end-of-block code"));
                        }
                        self.litlen_table =
                            HuffmanTable::from_code_lengths(&self.code_lengths[..self.hlit])?;
                        self.dist_table =
                            HuffmanTable::from_code_lengths(&self.code_lengths[self.hlit..])?;
                        self.phase = Phase::Symbols;
                    }
                }

                Phase::DynRepeat { symbol } => {
                    let (extra_bits, base) = match symbol {
                        16 => (2u32, 3usize),
                        17 => (3, 3),
                        _ => (7, 11),
                    };
                    let Some(v) = self.take_bits(input, &mut in_pos, extra_bits) else {
                        break Self::stalled(flags)?;
                    };
                    let repeat = base + v as usize;
                    let value = if symbol == 16 {
                        if self.len_index == 0 {
                            return Err(CartonError::decompress(
                                "length repeat with no previous length",
                            ));
                        }
                        self.code_lengths[self.len_index - 1]
                    } else {
                        0
                    };
                    if self.len_index + repeat > self.code_lengths.len() {
                        return Err(CartonError::decompress("code length repeat overflows table"));
                    }
                    for _ in 0..repeat {
                        self.code_lengths[self.len_index] = value;
                        self.len_index += 1;
                    }
                    self.phase = Phase::DynSymbols;
                }

                Phase::Symbols => {
                    self.fill_bits(input, &mut in_pos);
                    let word = self.bit_buf as u32;
                    let available = self.num_bits.min(32);
                    match self.litlen_table.decode(word, available) {
                        HuffmanDecode::NeedMoreBits => break Self::stalled(flags)?,
                        HuffmanDecode::Invalid => {
                            return Err(CartonError::decompress("invalid literal/length code"));
                        }
                        HuffmanDecode::Symbol { symbol, length } => {
                            if symbol < 256 {
                                // Check space before committing the bits
                                if pos >= output.len() {
                                    break InflateStatus::HasMoreOutput;
                                }
                                self.drop_bits(length);
                                output[pos] = symbol as u8;
                                pos += 1;
                                self.total_out += 1;
                            } else if symbol == 256 {
                                self.drop_bits(length);
                                self.phase = self.end_of_block_phase(flags);
                            } else if symbol <= 285 {
                                self.drop_bits(length);
                                self.phase = Phase::LengthExtra { code: symbol };
                            } else {
                                return Err(CartonError::decompress("invalid literal/length code"));
                            }
                        }
                    }
                }

                Phase::LengthExtra { code } => {
                    let extra_bits = LENGTH_EXTRA_BITS[(code - 257) as usize] as u32;
                    let Some(extra) = self.take_bits(input, &mut in_pos, extra_bits) else {
                        break Self::stalled(flags)?;
                    };
                    let length = decode_length(code, extra as u16);
                    self.phase = Phase::DistanceSym { length };
                }

                Phase::DistanceSym { length } => {
                    self.fill_bits(input, &mut in_pos);
                    let word = self.bit_buf as u32;
                    let available = self.num_bits.min(32);
                    match self.dist_table.decode(word, available) {
                        HuffmanDecode::NeedMoreBits => break Self::stalled(flags)?,
                        HuffmanDecode::Invalid => {
                            return Err(CartonError::decompress("invalid distance code"));
                        }
                        HuffmanDecode::Symbol { symbol, length: bits } => {
                            if symbol > 29 {
                                return Err(CartonError::decompress("invalid distance code"));
                            }
                            self.drop_bits(bits);
                            self.phase = Phase::DistanceExtra {
                                length,
                                code: symbol,
                            };
                        }
                    }
                }

                Phase::DistanceExtra { length, code } => {
                    let extra_bits = DISTANCE_EXTRA_BITS[code as usize] as u32;
                    let Some(extra) = self.take_bits(input, &mut in_pos, extra_bits) else {
                        break Self::stalled(flags)?;
                    };
                    let distance = decode_distance(code, extra as u16);
                    if distance as u64 > self.total_out {
                        return Err(CartonError::decompress(
                            "back-reference before start of stream",
                        ));
                    }
                    if wrapping {
                        if distance as usize > output.len() {
                            return Err(CartonError::decompress(
                                "back-reference exceeds window size",
                            ));
                        }
                    } else if distance as usize > pos {
                        return Err(CartonError::decompress(
                            "back-reference before start of output buffer",
                        ));
                    }
                    self.phase = Phase::MatchCopy { length, distance };
                }

                Phase::MatchCopy {
                    mut length,
                    distance,
                } => {
                    // Byte at a time: a distance shorter than the length
                    // replays bytes written earlier in this same copy.
                    while length > 0 {
                        if pos >= output.len() {
                            self.phase = Phase::MatchCopy { length, distance };
                            break 'machine InflateStatus::HasMoreOutput;
                        }
                        let src = if wrapping {
                            pos.wrapping_sub(distance as usize) & mask
                        } else {
                            pos - distance as usize
                        };
                        output[pos] = output[src];
                        pos += 1;
                        self.total_out += 1;
                        length -= 1;
                    }
                    self.phase = Phase::Symbols;
                }

                Phase::ZlibTrailer => {
                    let partial = self.num_bits % 8;
                    if partial != 0 {
                        self.drop_bits(partial);
                    }
                    let Some(v) = self.take_bits(input, &mut in_pos, 32) else {
                        break Self::stalled(flags)?;
                    };
                    // The trailer is stored big-endian
                    let stored = v.swap_bytes();
                    self.phase = Phase::Finished;
                    if flags.compute_adler32 {
                        if pos > adler_mark {
                            self.adler.update(&output[adler_mark..pos]);
                            adler_mark = pos;
                        }
                        let computed = self.adler.finish();
                        if stored != computed {
                            return Err(CartonError::adler32_mismatch(stored, computed));
                        }
                    }
                }

                Phase::Finished => {
                    // Return whole unread bytes sitting in the bit buffer
                    // so the caller sees the exact compressed length.
                    let rewind = ((self.num_bits / 8) as usize).min(in_pos);
                    in_pos -= rewind;
                    self.num_bits -= rewind as u32 * 8;
                    self.bit_buf &= (1u64 << self.num_bits) - 1;
                    break InflateStatus::Done;
                }
            }
        };

        if flags.compute_adler32 && pos > adler_mark {
            self.adler.update(&output[adler_mark..pos]);
        }

        Ok((in_pos, pos - start_pos, status))
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

/// Decompress a complete raw DEFLATE stream into a fresh buffer.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    inflate_with_flags(data, InflateFlags {
        non_wrapping_output: true,
        ..InflateFlags::default()
    })
}

/// One-shot decompression on a growing non-wrapping buffer.
pub(crate) fn inflate_with_flags(data: &[u8], flags: InflateFlags) -> Result<Vec<u8>> {
    debug_assert!(flags.non_wrapping_output && !flags.has_more_input);

    let mut inflater = Inflater::new();
    let mut out = vec![0u8; data.len().saturating_mul(3).max(128)];
    let mut in_pos = 0usize;
    let mut out_pos = 0usize;

    loop {
        let (consumed, produced, status) =
            inflater.inflate(&data[in_pos..], &mut out, out_pos, flags)?;
        in_pos += consumed;
        out_pos += produced;

        match status {
            InflateStatus::Done => {
                out.truncate(out_pos);
                return Ok(out);
            }
            InflateStatus::HasMoreOutput => {
                let grown = out.len().saturating_mul(2);
                out.resize(grown, 0);
            }
            // Unreachable with has_more_input clear; the engine fails
            // instead of suspending.
            InflateStatus::NeedsMoreInput => {
                return Err(CartonError::decompress(
                    "compressed stream ended unexpectedly",
                ));
            }
        }
    }
}
