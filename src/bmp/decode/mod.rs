//! The pixel-decode engine: packed-RGB, indexed, RLE, and Huffman line
//! readers sharing one cursor and one numeric-format converter (§4.3).

mod huffman_line;
mod indexed;
mod packed_rgb;
mod rle;

pub(crate) use rle::RowOutcome;

use crate::{
  bmp::{
    classify::BmpCompression,
    colormask::BmpColorMask,
    numeric::{rescale_float, rescale_int, rescale_s2_13, Conv64Mode, ResultFormat, UndefinedPixelPolicy},
    palette::BmpPalette,
  },
  log::ErrorLatches,
};

/// The output shape a decoded pixel is converted into, fixed once per
/// `load_image`/`load_line` call (§3 "Numeric result format").
#[derive(Debug, Clone, Copy)]
pub(crate) struct OutputSpec {
  pub format: ResultFormat,
  /// The width chosen for [`ResultFormat::Int`] (8, 16, or 32); ignored for
  /// the other two formats.
  pub int_width: u32,
  /// 3 (RGB) or 4 (RGBA). Forced to 4 when `undefined_policy` is
  /// [`UndefinedPixelPolicy::ToAlpha`].
  pub channel_count: u8,
  pub undefined_policy: UndefinedPixelPolicy,
  /// When set, an indexed source writes the raw palette index byte instead
  /// of expanding to RGB (requires [`ResultFormat::Int`] at 8-bit width;
  /// enforced by the handle before decode starts).
  pub result_indexed: bool,
  pub conv64: Conv64Mode,
  /// Which Huffman run-length index value (0 or 1) means white, per the
  /// handle's codec-side polarity flag (§3 "Handle").
  pub huffman_zero_is_white: bool,
}

impl OutputSpec {
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
    if self.result_indexed {
      1
    } else {
      self.channel_count as usize * self.bytes_per_channel()
    }
  }

  /// Writes one converted channel value at `buf[offset..]`, using the
  /// identical rescale formulas for every caller (§4.3.1, §4.3.5).
  fn write_channel(self, buf: &mut [u8], offset: usize, value: u32, from_bits: u32) {
    match self.format {
      ResultFormat::Int => {
        let v = rescale_int(value, from_bits, self.int_width);
        match self.int_width {
          8 => buf[offset] = v as u8,
          16 => buf[offset..offset + 2].copy_from_slice(&(v as u16).to_le_bytes()),
          _ => buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
        }
      }
      ResultFormat::Float => {
        let f = rescale_float(value, from_bits);
        buf[offset..offset + 4].copy_from_slice(&f.to_le_bytes());
      }
      ResultFormat::S2_13 => {
        let s = rescale_s2_13(value, from_bits);
        buf[offset..offset + 2].copy_from_slice(&s.to_le_bytes());
      }
    }
  }

  /// Writes a fully-opaque alpha value at max brightness, for sources that
  /// carry no alpha channel.
  fn write_opaque_alpha(self, buf: &mut [u8], offset: usize) {
    self.write_channel(buf, offset, (1_u32 << 8) - 1, 8);
  }
}

/// State carried across line reads for one `load_image`/`load_line` call
/// sequence (§4.3 "Shared decode state"; §9 "coroutine-like line-by-line
/// reading").
#[derive(Debug, Clone, Default)]
pub(crate) struct DecodeCursor {
  pub x: u32,
  pub y: u32,
  /// Races ahead of `y` under RLE vertical deltas.
  pub file_y: u32,
  pub bits: crate::bit_reader::BitReader32,
  /// Carries the "no pixels written this row and the previous row also
  /// ended by an explicit EOL" RLE tolerance across row boundaries.
  pub previous_row_was_bare_eol: bool,
  /// Built lazily on the first Huffman row and reused for the rest of the
  /// image, rather than rebuilding the decode tree on every call.
  pub huffman: Option<crate::huffman::HuffmanCodec>,
}

pub(crate) use huffman_line::decode_huffman_row;
pub(crate) use indexed::decode_indexed_row;
pub(crate) use packed_rgb::decode_packed_rgb_row;
pub(crate) use rle::decode_rle_row;

/// Dispatches one row's worth of decode, per the row's compression kind.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_row(
  src: &mut dyn crate::sink::ByteSource, out_row: &mut [u8], width: u32, bitcount: u16, compression: BmpCompression,
  mask: &BmpColorMask, palette: &BmpPalette, output: OutputSpec, cursor: &mut DecodeCursor, latches: &mut ErrorLatches,
) -> RowOutcome {
  use BmpCompression::*;
  match compression {
    Rgb | Bitfields | AlphaBitfields if bitcount > 8 => {
      packed_rgb::decode_packed_rgb_row(src, out_row, width, bitcount, mask, output, latches)
    }
    Os2Rle24 => rle::decode_rle_row(src, out_row, width, 24, palette, output, cursor, latches),
    Rgb => indexed::decode_indexed_row(src, out_row, width, bitcount, palette, output, latches),
    Rle4 => rle::decode_rle_row(src, out_row, width, 4, palette, output, cursor, latches),
    Rle8 => rle::decode_rle_row(src, out_row, width, 8, palette, output, cursor, latches),
    Os2Huffman => huffman_line::decode_huffman_row(src, out_row, width, palette, output, cursor, latches),
    Jpeg | Png => RowOutcome::Done,
    _ => RowOutcome::Done,
  }
}
