//! Canonical Huffman decoding for DEFLATE.
//!
//! DEFLATE transmits Huffman codes as canonical code lengths: the
//! codeword assignment is fully determined by scanning lengths 1..=15 and
//! assigning sequential values per length in symbol order (RFC 1951
//! Section 3.2.2).
//!
//! # Alphabets
//!
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29 (back-reference distances)
//! - **Code Length**: 0-18 (for transmitting dynamic tables)
//!
//! Decoding here operates on a caller-supplied bit word instead of an I/O
//! stream: the decompression engine peeks its bit buffer, asks the table
//! for a symbol, and only then consumes bits. A decode that cannot
//! complete with the available bits reports [`HuffmanDecode::NeedMoreBits`]
//! without consuming anything, which is what makes the engine resumable
//! with no partial-symbol state.

use crate::tables::MAX_CODE_LENGTH;
use carton_core::error::{CartonError, Result};

/// Outcome of a single table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanDecode {
    /// A symbol was identified; consume `length` bits to commit it.
    Symbol {
        /// The decoded symbol.
        symbol: u16,
        /// Number of bits the codeword occupies.
        length: u32,
    },
    /// The available bits do not yet complete any codeword.
    NeedMoreBits,
    /// The bits do not correspond to any codeword in this table.
    Invalid,
}

/// A canonical Huffman decode table.
///
/// Codes up to `FAST_BITS` (9) bits resolve through a direct lookup
/// table; longer codes fall back to a bit-by-bit canonical walk over
/// per-length first codes and symbol offsets. All tree storage is
/// index-based and bounds-checked.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    /// Direct lookup over the low `fast_bits` stream bits.
    /// Entry: (symbol, code length); length 0 means "not a short code".
    fast: Vec<(u16, u8)>,
    /// Number of bits indexed by the fast table.
    fast_bits: u32,
    /// Longest code length in this table (0 for an empty table).
    max_len: u32,
    /// Number of codes per length.
    counts: [u16; MAX_CODE_LENGTH + 1],
    /// First canonical code of each length.
    base_codes: [u32; MAX_CODE_LENGTH + 1],
    /// Offset of each length's first symbol in `symbols`.
    offsets: [u16; MAX_CODE_LENGTH + 1],
    /// Symbols ordered by (length, canonical code).
    symbols: Vec<u16>,
}

impl HuffmanTable {
    /// Number of bits resolved by the direct lookup table.
    const FAST_BITS: u32 = 9;

    /// An empty table. Building is always possible (dynamic blocks may
    /// carry an unused distance table) but every decode is `Invalid`.
    pub fn empty() -> Self {
        Self {
            fast: Vec::new(),
            fast_bits: 0,
            max_len: 0,
            counts: [0; MAX_CODE_LENGTH + 1],
            base_codes: [0; MAX_CODE_LENGTH + 1],
            offsets: [0; MAX_CODE_LENGTH + 1],
            symbols: Vec::new(),
        }
    }

    /// Build a decode table from code lengths.
    ///
    /// `code_lengths[i]` is the bit length for symbol `i`; 0 means the
    /// symbol is unused. The lengths must describe a complete prefix code
    /// (the per-length counts must cover the code space exactly), with
    /// the single-code exception: a table using exactly one symbol may be
    /// incomplete, matching zlib's handling of one-code distance tables.
    pub fn from_code_lengths(code_lengths: &[u8]) -> Result<Self> {
        if code_lengths.is_empty() {
            return Err(CartonError::decompress("empty Huffman code lengths"));
        }

        let mut counts = [0u16; MAX_CODE_LENGTH + 1];
        let mut max_len = 0u32;
        let mut used = 0usize;

        for &len in code_lengths {
            if len > 0 {
                if len as usize > MAX_CODE_LENGTH {
                    return Err(CartonError::decompress(format!(
                        "Huffman code length {} exceeds maximum {}",
                        len, MAX_CODE_LENGTH
                    )));
                }
                counts[len as usize] += 1;
                used += 1;
                max_len = max_len.max(len as u32);
            }
        }

        if used == 0 {
            return Ok(Self::empty());
        }

        // Compute the first code of each length (RFC 1951 Section 3.2.2)
        // and the code-space coverage in 1/32768 units.
        let mut next_code = [0u32; MAX_CODE_LENGTH + 1];
        let mut code = 0u32;
        let mut total = 0u32;
        for bits in 1..=MAX_CODE_LENGTH {
            code = (code + counts[bits - 1] as u32) << 1;
            next_code[bits] = code;
            total += (counts[bits] as u32) << (MAX_CODE_LENGTH - bits);
        }

        if total != (1 << MAX_CODE_LENGTH) && used > 1 {
            return Err(CartonError::decompress(
                "invalid Huffman code lengths (incomplete or over-subscribed)",
            ));
        }

        // Symbol table ordered by (length, canonical code)
        let mut offsets = [0u16; MAX_CODE_LENGTH + 1];
        let mut base_codes = [0u32; MAX_CODE_LENGTH + 1];
        let mut offset = 0u16;
        for bits in 1..=MAX_CODE_LENGTH {
            offsets[bits] = offset;
            base_codes[bits] = next_code[bits];
            offset += counts[bits];
        }

        let mut symbols = vec![0u16; used];
        let mut assign = next_code;
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len > 0 {
                let len = len as usize;
                let idx = offsets[len] as usize + (assign[len] - base_codes[len]) as usize;
                symbols[idx] = symbol as u16;
                assign[len] += 1;
            }
        }

        // Direct lookup table over the low fast_bits stream bits.
        // Stream bits arrive LSB-first, so each code is stored reversed
        // and every index sharing its low bits maps to the same entry.
        let fast_bits = Self::FAST_BITS.min(max_len);
        let mut fast = vec![(0u16, 0u8); 1usize << fast_bits];
        let mut fill = next_code;
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len > 0 && (len as u32) <= fast_bits {
                let reversed = reverse_bits(fill[len as usize] as u16, len);
                fill[len as usize] += 1;

                let stride = 1usize << len;
                let mut index = reversed as usize;
                while index < fast.len() {
                    fast[index] = (symbol as u16, len);
                    index += stride;
                }
            }
        }

        Ok(Self {
            fast,
            fast_bits,
            max_len,
            counts,
            base_codes,
            offsets,
            symbols,
        })
    }

    /// Longest code length in this table; 0 means the table is empty.
    pub fn max_code_length(&self) -> u32 {
        self.max_len
    }

    /// Try to decode one symbol from `bits`.
    ///
    /// `bits` holds up to 32 upcoming stream bits LSB-first; `available`
    /// says how many of them are real. Nothing is consumed — on
    /// [`HuffmanDecode::Symbol`] the caller drops `length` bits.
    #[inline]
    pub fn decode(&self, bits: u32, available: u32) -> HuffmanDecode {
        if self.max_len == 0 {
            return HuffmanDecode::Invalid;
        }

        if available >= self.fast_bits {
            let index = (bits & ((1u32 << self.fast_bits) - 1)) as usize;
            let (symbol, length) = self.fast[index];
            if length > 0 {
                return HuffmanDecode::Symbol {
                    symbol,
                    length: length as u32,
                };
            }
            // Longer than fast_bits: canonical walk
        }

        self.decode_slow(bits, available)
    }

    /// Bit-by-bit canonical walk for codes the fast table cannot resolve.
    fn decode_slow(&self, bits: u32, available: u32) -> HuffmanDecode {
        let mut code = 0u32;

        for len in 1..=self.max_len as usize {
            if len as u32 > available {
                return HuffmanDecode::NeedMoreBits;
            }
            code = (code << 1) | ((bits >> (len - 1)) & 1);

            let count = self.counts[len] as u32;
            if count > 0 && code >= self.base_codes[len] {
                let rel = code - self.base_codes[len];
                if rel < count {
                    let idx = self.offsets[len] as usize + rel as usize;
                    return HuffmanDecode::Symbol {
                        symbol: self.symbols[idx],
                        length: len as u32,
                    };
                }
            }
        }

        HuffmanDecode::Invalid
    }
}

/// Reverse the low `length` bits of a code.
fn reverse_bits(mut code: u16, length: u8) -> u16 {
    let mut reversed = 0u16;
    for _ in 0..length {
        reversed = (reversed << 1) | (code & 1);
        code >>= 1;
    }
    reversed
}
