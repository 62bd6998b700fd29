//! Zlib wrapper handling (RFC 1950).
//!
//! The zlib format wraps raw DEFLATE data with a 2-byte header and a
//! trailing Adler-32 checksum:
//!
//! ```text
//! +---+---+============+---+---+---+---+
//! |CMF|FLG| compressed |    ADLER32    |
//! +---+---+============+---+---+---+---+
//! ```
//!
//! - CMF: compression method (low nibble, must be 8 for DEFLATE) and
//!   CINFO (high nibble, log2(window size) - 8)
//! - FLG: FCHECK bits making `(CMF * 256 + FLG) % 31 == 0`, the FDICT
//!   preset-dictionary bit, and the FLEVEL hint
//! - ADLER32: checksum of the uncompressed data, big-endian
//!
//! The decompression engine handles the wrapper itself when
//! [`InflateFlags::parse_zlib_header`](crate::InflateFlags) is set; this
//! module provides the one-shot convenience entry point. Preset
//! dictionaries (FDICT) are rejected — extraction never uses them.

use crate::inflate::{InflateFlags, inflate_with_flags};
use carton_core::error::Result;

/// Size of the zlib header in bytes.
pub const HEADER_SIZE: usize = 2;

/// Size of the Adler-32 trailer in bytes.
pub const TRAILER_SIZE: usize = 4;

/// Mask of the FDICT bit in the FLG byte.
pub const FLG_FDICT: u8 = 0x20;

/// Decompress a complete zlib stream, verifying the Adler-32 trailer.
pub fn zlib_decompress(data: &[u8]) -> Result<Vec<u8>> {
    inflate_with_flags(data, InflateFlags {
        parse_zlib_header: true,
        non_wrapping_output: true,
        compute_adler32: true,
        ..InflateFlags::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use carton_core::checksum::Adler32;
    use carton_core::error::CartonError;

    /// Wrap a raw deflate stream in a zlib header and trailer.
    fn zlib_wrap(deflate_stream: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        // CMF 0x78 (32KB window, method 8), FLG 0x01 satisfies the check
        out.extend_from_slice(&[0x78, 0x01]);
        out.extend_from_slice(deflate_stream);
        out.extend_from_slice(&Adler32::checksum(payload).to_be_bytes());
        out
    }

    #[test]
    fn test_zlib_roundtrip_stored() {
        let deflate_stream = [0x01, 0x05, 0x00, 0xFA, 0xFF, b'H', b'e', b'l', b'l', b'o'];
        let wrapped = zlib_wrap(&deflate_stream, b"Hello");
        assert_eq!(zlib_decompress(&wrapped).unwrap(), b"Hello");
    }

    #[test]
    fn test_zlib_bad_check_bits() {
        let mut wrapped = zlib_wrap(&[0x01, 0x00, 0x00, 0xFF, 0xFF], b"");
        wrapped[1] ^= 0x01;
        assert!(zlib_decompress(&wrapped).is_err());
    }

    #[test]
    fn test_zlib_wrong_method() {
        // CMF method nibble 7; FLG chosen so the check bits pass:
        // 0x77 * 256 = 30464, 30464 % 31 = 22, FLG = 31 - 22 = 9
        let data = [0x77, 0x09, 0x01, 0x00, 0x00, 0xFF, 0xFF, 0, 0, 0, 1];
        assert!(zlib_decompress(&data).is_err());
    }

    #[test]
    fn test_zlib_adler_mismatch() {
        let deflate_stream = [0x01, 0x05, 0x00, 0xFA, 0xFF, b'H', b'e', b'l', b'l', b'o'];
        let mut wrapped = zlib_wrap(&deflate_stream, b"Hello");
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0xFF;
        let err = zlib_decompress(&wrapped).unwrap_err();
        assert!(matches!(err, CartonError::Adler32Mismatch { .. }));
    }

    #[test]
    fn test_zlib_fdict_rejected() {
        // CMF 0x78 with FDICT set: (0x78 * 256 + 0x20) % 31 == 0
        let data = [0x78, 0x20, 0, 0, 0, 0, 0x01, 0x00, 0x00, 0xFF, 0xFF];
        let err = zlib_decompress(&data).unwrap_err();
        assert!(err.to_string().contains("dictionary"));
    }
}
