//! OS/2 1-bpp Huffman (CCITT T.4 1D) line decode (§4.3.4).

use super::{DecodeCursor, OutputSpec};
use crate::{
  bit_reader::ByteOrder,
  bmp::palette::BmpPalette,
  huffman::{HuffmanCodec, RunDecode},
  log::ErrorLatches,
  sink::ByteSource,
};

use super::RowOutcome;

/// The twelve-bit EOL synchronisation sequence every row begins with.
const EOL_BITS: u32 = 12;
const EOL_CODE: u32 = 0b0000_0000_0001;

/// Consumes one run's worth of pixels and writes them through the palette,
/// toggling `white` for the next run. Returns `false` if the row is now
/// full (no more pixels to decode).
fn emit_run(out_row: &mut [u8], x: &mut u32, width: u32, index: u8, run: u32, palette: &BmpPalette, output: OutputSpec, latches: &mut ErrorLatches) {
  let remaining = width.saturating_sub(*x);
  let to_write = run.min(remaining);
  if to_write < run {
    latches.set_invalid_overrun();
  }
  let stride = output.pixel_stride();
  for i in 0..to_write as usize {
    let offset = (*x as usize + i) * stride;
    if output.result_indexed {
      out_row[offset] = index;
    } else {
      let entry = palette.get_clamped(u32::from(index));
      output.write_channel(out_row, offset, u32::from(entry.r), 8);
      output.write_channel(out_row, offset + output.bytes_per_channel(), u32::from(entry.g), 8);
      output.write_channel(out_row, offset + 2 * output.bytes_per_channel(), u32::from(entry.b), 8);
      if output.channel_count == 4 {
        output.write_opaque_alpha(out_row, offset + 3 * output.bytes_per_channel());
      }
    }
  }
  *x += to_write;
}

/// Scans forward for an eleven-zero prefix followed by a one bit, consuming
/// through that one bit, as the resync rule for an invalid code demands
/// (§4.3.4). Returns `false` if the input ran out first.
fn resync(reader: &mut crate::bit_reader::BitReader32, src: &mut dyn ByteSource) -> bool {
  let mut zero_run = 0_u32;
  loop {
    match reader.take_bit(src, ByteOrder::BitReversed) {
      None => return false,
      Some(0) => zero_run += 1,
      Some(_) => {
        if zero_run >= 11 {
          return true;
        }
        zero_run = 0;
      }
    }
  }
}

pub(crate) fn decode_huffman_row(
  src: &mut dyn ByteSource, out_row: &mut [u8], width: u32, palette: &BmpPalette, output: OutputSpec,
  cursor: &mut DecodeCursor, latches: &mut ErrorLatches,
) -> RowOutcome {
  if cursor.huffman.is_none() {
    cursor.huffman = Some(HuffmanCodec::new());
  }
  let codec = cursor.huffman.as_ref().expect("just initialized");

  let Some(sync) = cursor.bits.take_bits(src, ByteOrder::BitReversed, EOL_BITS) else {
    latches.set_truncated();
    return RowOutcome::Truncated;
  };
  if sync != EOL_CODE {
    latches.set_invalid_pixel();
  }

  let mut x: u32 = 0;
  let mut white = output.huffman_zero_is_white;

  while x < width {
    match codec.decode_run(white, &mut cursor.bits, src) {
      RunDecode::Eof => {
        latches.set_truncated();
        return RowOutcome::Truncated;
      }
      RunDecode::Invalid => {
        latches.set_invalid_pixel();
        if !resync(&mut cursor.bits, src) {
          latches.set_truncated();
          return RowOutcome::Truncated;
        }
        // The resync point is a fresh start; keep decoding as the same
        // color, since the aborted run never produced any pixels.
      }
      RunDecode::Run(run) => {
        let index = if white == output.huffman_zero_is_white { 0 } else { 1 };
        emit_run(out_row, &mut x, width, index, run, palette, output, latches);
        white = !white;
      }
    }
  }
  RowOutcome::Done
}
