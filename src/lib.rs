#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
//! A streaming decoder/encoder for the Windows and OS/2 BMP bitmap container.
//!
//! The crate is organized around three subsystems that together make up
//! [`bmp::BmpReader`] and [`bmp::BmpWriter`]: a header parser/classifier, a
//! pixel-decode engine, and a pixel-encode engine (the mirror, with an RLE
//! literal/repeat optimiser and a Huffman encoder). Callers never hand over
//! ownership of their byte stream — they implement (or reuse) a
//! [`sink::ByteSource`] / [`sink::ByteSink`] and bind a handle to it.

#[cfg(feature = "alloc")]
extern crate alloc;

mod ascii_array;
mod bit_reader;
pub mod bmp;
pub mod error;
mod huffman;
pub mod log;
pub mod sink;
mod util;

pub use ascii_array::AsciiArray;
pub use error::{BmpError, BmpResultCode};
