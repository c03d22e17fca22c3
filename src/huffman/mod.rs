//! CCITT T.4 1-dimensional modified-Huffman run-length coding, as used by
//! the OS/2 `BI_HUFFMAN1D` / `BCA_HUFFMAN1D` 1-bpp compression mode
//! (§4.3.4, §4.4.3, GLOSSARY "Huffman line").

mod codec;
pub(crate) mod tables;

pub(crate) use codec::{HuffmanCodec, RunDecode};
