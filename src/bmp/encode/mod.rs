//! The pixel-encode engine: packed-RGB, indexed, RLE, and Huffman line
//! writers sharing one cursor and one numeric-format converter, the
//! write-side mirror of [`crate::bmp::decode`] (§4.4).

#[cfg(feature = "alloc")]
mod huffman_line;
mod indexed;
mod packed_rgb;
#[cfg(feature = "alloc")]
mod rle;

#[cfg(feature = "alloc")]
pub(crate) use huffman_line::{encode_huffman_row, finish_huffman_stream};
pub(crate) use indexed::encode_indexed_row;
pub(crate) use packed_rgb::{encode_64bpp_row, encode_packed_rgb_row};
#[cfg(feature = "alloc")]
pub(crate) use rle::encode_rle_row;

use crate::bmp::numeric::{float_to_s2_13, pack_float, pack_s2_13, rescale_int, rescale_s2_13, ResultFormat};

/// The shape a to-be-encoded channel value is read out of the caller's
/// buffer as, the write-side mirror of
/// [`crate::bmp::decode::OutputSpec`] (§4.4).
#[derive(Debug, Clone, Copy)]
pub(crate) struct InputSpec {
  pub format: ResultFormat,
  /// The width of [`ResultFormat::Int`] source channels (8, 16, or 32);
  /// ignored for the other two formats.
  pub int_width: u32,
  /// 3 (RGB) or 4 (RGBA).
  pub channel_count: u8,
  /// When set, the source buffer already holds one raw palette-index byte
  /// per pixel rather than expanded channels.
  pub source_indexed: bool,
}

impl InputSpec {
  #[inline]
  #[must_use]
  pub(crate) const fn bytes_per_channel(self) -> usize {
    match self.format {
      ResultFormat::Int => (self.int_width / 8) as usize,
      ResultFormat::Float => 4,
      ResultFormat::S2_13 => 2,
    }
  }

  #[inline]
  #[must_use]
  pub(crate) const fn pixel_stride(self) -> usize {
    if self.source_indexed {
      1
    } else {
      self.channel_count as usize * self.bytes_per_channel()
    }
  }

  /// Reads one channel value out of `buf[offset..]` and rescales it to
  /// `to_bits`, the inverse of
  /// [`crate::bmp::decode::OutputSpec::write_channel`] (§4.4).
  pub(crate) fn read_channel(self, buf: &[u8], offset: usize, to_bits: u32) -> u32 {
    match self.format {
      ResultFormat::Int => {
        let raw = match self.int_width {
          8 => u32::from(buf[offset]),
          16 => u32::from(u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap())),
          _ => u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()),
        };
        rescale_int(raw, self.int_width, to_bits)
      }
      ResultFormat::Float => {
        let f = f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
        pack_float(f, to_bits)
      }
      ResultFormat::S2_13 => {
        let bits = i16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap());
        pack_s2_13(bits, to_bits)
      }
    }
  }

  /// Reads a channel straight into its s2.13 bit pattern, for the 64-bpp
  /// writer which stores every channel that way regardless of `self.format`
  /// (§4.3.1, §4.4).
  pub(crate) fn read_s2_13_bits(self, buf: &[u8], offset: usize) -> i16 {
    match self.format {
      ResultFormat::S2_13 => i16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap()),
      ResultFormat::Float => float_to_s2_13(f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())) as i16,
      ResultFormat::Int => {
        let raw = match self.int_width {
          8 => u32::from(buf[offset]),
          16 => u32::from(u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap())),
          _ => u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()),
        };
        rescale_s2_13(raw, self.int_width)
      }
    }
  }
}

/// State carried across line writes for one `save_image`/`save_line` call
/// sequence, the write-side mirror of
/// [`crate::bmp::decode::DecodeCursor`] (§9 "coroutine-like line-by-line
/// reading", mirrored for writing).
#[derive(Debug, Default)]
pub(crate) struct EncodeCursor {
  pub file_y: u32,
  /// Built lazily on the first Huffman row and reused for the rest of the
  /// image.
  #[cfg(feature = "alloc")]
  pub huffman: Option<crate::huffman::HuffmanCodec>,
  /// MSB-first bit accumulator shared across rows for the Huffman
  /// bitstream; flushed a byte at a time as it fills.
  pub bit_acc: u32,
  pub bit_acc_bits: u32,
}
