//! # Carton Inflate
//!
//! Pure Rust, resumable DEFLATE decompression (RFC 1951), with optional
//! zlib wrapping (RFC 1950).
//!
//! This crate decodes all three DEFLATE block types:
//!
//! - Stored (uncompressed) blocks
//! - Fixed Huffman codes
//! - Dynamic Huffman codes
//!
//! The engine is a suspendable state machine: a call consumes as much
//! input and produces as much output as the caller's buffers allow, then
//! reports whether it needs more input, more output space, or is done.
//! Feeding the same stream one byte at a time produces exactly the same
//! bytes as feeding it in one call.
//!
//! ## Example
//!
//! ```rust
//! use carton_inflate::inflate;
//!
//! // A stored (uncompressed) DEFLATE block containing "Hello"
//! let compressed = [0x01, 0x05, 0x00, 0xFA, 0xFF, b'H', b'e', b'l', b'l', b'o'];
//! assert_eq!(inflate(&compressed).unwrap(), b"Hello");
//! ```
//!
//! For streaming use, drive [`Inflater`] directly with a 32 KB wrapping
//! window (see [`WINDOW_SIZE`]) or a whole-output buffer.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod huffman;
pub mod inflate;
pub mod tables;
pub mod zlib;

// Re-exports
pub use huffman::{HuffmanDecode, HuffmanTable};
pub use inflate::{Inflater, InflateFlags, InflateStatus, WINDOW_SIZE, inflate};
pub use zlib::zlib_decompress;
