//! Error types for Carton operations.
//!
//! This module provides a single error type covering all failure modes of
//! archive reading and decompression: I/O errors, structural validation
//! failures, malformed compressed streams, and checksum mismatches.

use std::io;
use thiserror::Error;

/// The main error type for Carton operations.
#[derive(Debug, Error)]
pub enum CartonError {
    /// I/O error from the underlying byte source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The end-of-central-directory record was not found; the input is
    /// not a ZIP archive (or is truncated before the central directory).
    #[error("Not a ZIP archive: end of central directory not found")]
    NotAnArchive,

    /// Structural cross-check failure in the archive container.
    #[error("Bad ZIP file: {message}")]
    BadZipFile {
        /// Description of the structural failure.
        message: String,
    },

    /// Unsupported compression method for an entry.
    #[error("Unsupported compression method: {method}")]
    UnsupportedMethod {
        /// The raw method identifier from the archive.
        method: u16,
    },

    /// Caller misuse of a streaming API (bad cursor, bad buffer shape).
    #[error("Bad parameter: {message}")]
    BadParam {
        /// Description of the invalid parameter.
        message: String,
    },

    /// The compressed stream is malformed and cannot be decoded.
    #[error("Decompression failed: {message}")]
    DecompressFailed {
        /// Description of the stream defect.
        message: String,
    },

    /// Adler-32 mismatch on a zlib-wrapped stream.
    #[error("Adler-32 mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    Adler32Mismatch {
        /// Checksum stored in the stream trailer.
        expected: u32,
        /// Checksum computed over the decompressed bytes.
        computed: u32,
    },

    /// CRC-32 mismatch on an archive entry.
    #[error("CRC mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// CRC value stored in the archive.
        expected: u32,
        /// CRC value computed over the extracted bytes.
        computed: u32,
    },

    /// Entry not found in the archive.
    #[error("Entry not found: {name}")]
    EntryNotFound {
        /// Name of the missing entry.
        name: String,
    },

    /// Entry-name decoding failure under a strict decoding policy.
    #[error("Encoding error: {message}")]
    Encoding {
        /// Description of the decoding failure.
        message: String,
    },
}

/// Result type alias for Carton operations.
pub type Result<T> = std::result::Result<T, CartonError>;

impl CartonError {
    /// Create a bad-zip-file error.
    pub fn bad_zip(message: impl Into<String>) -> Self {
        Self::BadZipFile {
            message: message.into(),
        }
    }

    /// Create an unsupported-method error.
    pub fn unsupported_method(method: u16) -> Self {
        Self::UnsupportedMethod { method }
    }

    /// Create a bad-parameter error.
    pub fn bad_param(message: impl Into<String>) -> Self {
        Self::BadParam {
            message: message.into(),
        }
    }

    /// Create a decompression-failure error.
    pub fn decompress(message: impl Into<String>) -> Self {
        Self::DecompressFailed {
            message: message.into(),
        }
    }

    /// Create an Adler-32 mismatch error.
    pub fn adler32_mismatch(expected: u32, computed: u32) -> Self {
        Self::Adler32Mismatch { expected, computed }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(expected: u32, computed: u32) -> Self {
        Self::CrcMismatch { expected, computed }
    }

    /// Create an entry-not-found error.
    pub fn entry_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound { name: name.into() }
    }

    /// Create an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }
}
