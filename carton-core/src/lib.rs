//! # Carton Core
//!
//! Core components for the Carton archive-reading library.
//!
//! This crate provides the building blocks shared by the decompression
//! engine and the container parser:
//!
//! - [`checksum`]: CRC-32 and Adler-32, incremental and one-shot
//! - [`slide`]: compacting read-ahead buffer for compressed input
//! - [`error`]: the common error type
//! - [`mmap`]: memory-mapped byte source (feature `mmap`)
//!
//! ## Architecture
//!
//! Carton is a small layered stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ carton-zip: container                               │
//! │     EOCD scan, central directory, entry sessions    │
//! ├─────────────────────────────────────────────────────┤
//! │ carton-inflate: codec                               │
//! │     resumable DEFLATE/zlib state machine            │
//! ├─────────────────────────────────────────────────────┤
//! │ carton-core (this crate)                            │
//! │     checksums, buffers, errors                      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The byte-source capability is plain `std::io::Read + Seek`; anything
//! seekable (a file, an in-memory cursor, a mapped file) can back an
//! archive.
//!
//! ## Example
//!
//! ```rust
//! use carton_core::checksum::{Adler32, Crc32};
//!
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! assert_eq!(Adler32::checksum(b"Wikipedia"), 0x11E60398);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod checksum;
pub mod error;
#[cfg(feature = "mmap")]
pub mod mmap;
pub mod slide;

// Re-exports for convenience
pub use checksum::{Adler32, Crc32};
pub use error::{CartonError, Result};
#[cfg(feature = "mmap")]
pub use mmap::MmapSource;
pub use slide::SlideBuffer;
