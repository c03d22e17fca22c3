//! Indexed (non-RLE) line decode (§4.3.2).

use super::{OutputSpec, RowOutcome};
use crate::{bit_reader::BitReader32, bmp::palette::BmpPalette, log::ErrorLatches, sink::ByteSource};

pub(crate) fn decode_indexed_row(
  src: &mut dyn ByteSource, out_row: &mut [u8], width: u32, bitcount: u16, palette: &BmpPalette, output: OutputSpec,
  latches: &mut ErrorLatches,
) -> RowOutcome {
  let mut bits = BitReader32::new();
  let stride = output.pixel_stride();
  let numcolors = palette.len().max(1) as u32;

  for px in 0..width as usize {
    let Some(raw_index) = bits.take_index(src, u32::from(bitcount)) else {
      latches.set_truncated();
      return RowOutcome::Truncated;
    };
    let index = if raw_index >= numcolors {
      latches.set_invalid_index();
      numcolors - 1
    } else {
      raw_index
    };
    let offset = px * stride;
    if output.result_indexed {
      out_row[offset] = index as u8;
      continue;
    }
    let entry = palette.get_clamped(index);
    output.write_channel(out_row, offset, u32::from(entry.r), 8);
    output.write_channel(out_row, offset + output.bytes_per_channel(), u32::from(entry.g), 8);
    output.write_channel(out_row, offset + 2 * output.bytes_per_channel(), u32::from(entry.b), 8);
    if output.channel_count == 4 {
      output.write_opaque_alpha(out_row, offset + 3 * output.bytes_per_channel());
    }
  }

  // Each row is padded to a whole byte boundary, then to a 4-byte boundary;
  // consuming the remainder of the accumulator's current byte covers the
  // sub-byte part, so only whole padding bytes at 4-byte granularity remain.
  let bits_consumed = width as usize * bitcount as usize;
  let row_bytes = (bits_consumed + 7) / 8;
  let padding = crate::util::align4padding(row_bytes);
  let mut pad = [0_u8; 3];
  if padding > 0 && src.read_exact(&mut pad[..padding]).is_err() {
    latches.set_truncated();
    return RowOutcome::Truncated;
  }
  RowOutcome::Done
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bmp::{numeric::ResultFormat, palette::PaletteEntry};

  fn output_spec() -> OutputSpec {
    OutputSpec {
      format: ResultFormat::Int,
      int_width: 8,
      channel_count: 3,
      undefined_policy: Default::default(),
      result_indexed: false,
      conv64: Default::default(),
      huffman_zero_is_white: true,
    }
  }

  #[test]
  fn out_of_range_index_clamps_and_latches() {
    let palette = BmpPalette::from_entries(alloc::vec![
      PaletteEntry { r: 0, g: 0, b: 0 },
      PaletteEntry { r: 255, g: 255, b: 255 },
    ]);
    // One byte 0xFF, 4-bpp indices, width 2 -> two 4-bit indices: 15 and 15.
    let bytes = [0xFF_u8, 0, 0, 0];
    let mut src: &[u8] = &bytes;
    let mut out = [0_u8; 6];
    let mut latches = ErrorLatches::new();
    let outcome = decode_indexed_row(&mut src, &mut out, 2, 4, &palette, output_spec(), &mut latches);
    assert_eq!(outcome, RowOutcome::Done);
    assert!(latches.any());
    assert_eq!(&out[0..3], &[255, 255, 255]);
  }
}
