//! RLE4 / RLE8 / RLE24 line decode (§4.3.3).

use super::{DecodeCursor, OutputSpec};
use crate::{bmp::palette::BmpPalette, log::ErrorLatches, sink::ByteSource};

/// How a row decode ended. Distinct from [`crate::error::BmpResultCode`]:
/// this is the row-local signal the line loop above uses to decide whether
/// to keep calling into this row's decoder, move to the next row, or stop
/// the whole image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowOutcome {
  /// The row finished normally; keep going to the next row.
  Done,
  /// An explicit delta moved to a new row; `file_y` in the cursor already
  /// reflects how far the sink advanced.
  EndOfRow,
  /// `e = 1`: no more rows follow. The caller stops the whole image load.
  EndOfBitmap,
  /// Input ran out before the row could complete.
  Truncated,
}

fn read_byte_or_truncate(src: &mut dyn ByteSource, latches: &mut ErrorLatches) -> Option<u8> {
  match src.read_byte() {
    Ok(Some(b)) => Some(b),
    Ok(None) | Err(_) => {
      latches.set_truncated();
      None
    }
  }
}

/// One decoded pixel's colour, before expansion: an 8-bit palette index for
/// 4/8-bit RLE, or a raw B-G-R triple for 24-bit RLE.
enum RlePixel {
  Index(u8),
  Bgr([u8; 3]),
}

fn write_pixel(out_row: &mut [u8], x: usize, pixel: &RlePixel, palette: &BmpPalette, output: OutputSpec) {
  let offset = x * output.pixel_stride();
  match pixel {
    RlePixel::Bgr([b, g, r]) => {
      if output.result_indexed {
        out_row[offset] = *r;
      } else {
        output.write_channel(out_row, offset, u32::from(*r), 8);
        output.write_channel(out_row, offset + output.bytes_per_channel(), u32::from(*g), 8);
        output.write_channel(out_row, offset + 2 * output.bytes_per_channel(), u32::from(*b), 8);
        if output.channel_count == 4 {
          output.write_opaque_alpha(out_row, offset + 3 * output.bytes_per_channel());
        }
      }
    }
    RlePixel::Index(index) => {
      if output.result_indexed {
        out_row[offset] = *index;
      } else {
        let entry = palette.get_clamped(u32::from(*index));
        output.write_channel(out_row, offset, u32::from(entry.r), 8);
        output.write_channel(out_row, offset + output.bytes_per_channel(), u32::from(entry.g), 8);
        output.write_channel(out_row, offset + 2 * output.bytes_per_channel(), u32::from(entry.b), 8);
        if output.channel_count == 4 {
          output.write_opaque_alpha(out_row, offset + 3 * output.bytes_per_channel());
        }
      }
    }
  }
}

/// Reads a repeat run's single replicated data unit: one byte at 4/8-bit
/// (RLE4 packs two alternating indices in its high/low nibbles), three
/// bytes at 24-bit.
fn read_repeat_unit(src: &mut dyn ByteSource, bitcount: u16, latches: &mut ErrorLatches) -> Option<[u8; 3]> {
  let n = if bitcount == 24 { 3 } else { 1 };
  let mut unit = [0_u8; 3];
  if src.read_exact(&mut unit[..n]).is_err() {
    latches.set_truncated();
    return None;
  }
  Some(unit)
}

/// Picks the `i`th pixel (0-based within the run) out of a repeat unit.
fn repeat_pixel_at(unit: &[u8; 3], bitcount: u16, i: usize) -> RlePixel {
  match bitcount {
    24 => RlePixel::Bgr(*unit),
    4 => RlePixel::Index(if i % 2 == 0 { unit[0] >> 4 } else { unit[0] & 0x0F }),
    _ => RlePixel::Index(unit[0]),
  }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_rle_row(
  src: &mut dyn ByteSource, out_row: &mut [u8], width: u32, bitcount: u16, palette: &BmpPalette, output: OutputSpec,
  cursor: &mut DecodeCursor, latches: &mut ErrorLatches,
) -> RowOutcome {
  let width = width as usize;
  let mut x: usize = 0;
  let mut wrote_any = false;

  loop {
    let Some(n) = read_byte_or_truncate(src, latches) else { return RowOutcome::Truncated };

    if n > 0 {
      let Some(unit) = read_repeat_unit(src, bitcount, latches) else { return RowOutcome::Truncated };
      let run = n as usize;
      let to_write = run.min(width.saturating_sub(x));
      if to_write < run {
        latches.set_invalid_overrun();
      }
      for i in 0..to_write {
        write_pixel(out_row, x + i, &repeat_pixel_at(&unit, bitcount, i), palette, output);
      }
      x += to_write;
      wrote_any = true;
      if to_write < run {
        cursor.previous_row_was_bare_eol = false;
        return RowOutcome::Done;
      }
      continue;
    }

    // n == 0: escape byte follows.
    let Some(e) = read_byte_or_truncate(src, latches) else { return RowOutcome::Truncated };
    match e {
      0 => {
        // Tolerate a duplicate, content-free EOL immediately following
        // another bare EOL row.
        if !wrote_any && cursor.previous_row_was_bare_eol {
          continue;
        }
        cursor.previous_row_was_bare_eol = !wrote_any;
        return RowOutcome::Done;
      }
      1 => return RowOutcome::EndOfBitmap,
      2 => {
        let Some(dx) = read_byte_or_truncate(src, latches) else { return RowOutcome::Truncated };
        let Some(dy) = read_byte_or_truncate(src, latches) else { return RowOutcome::Truncated };
        if usize::from(dx) >= width.saturating_sub(x) {
          latches.set_invalid_delta();
        } else {
          x += usize::from(dx);
        }
        if dy > 0 {
          cursor.file_y += u32::from(dy);
          cursor.previous_row_was_bare_eol = false;
          return RowOutcome::EndOfRow;
        }
        continue;
      }
      literal_count @ 3..=255 => {
        let count = literal_count as usize;
        if x + count > width {
          latches.set_invalid_overrun();
        }
        let to_write = count.min(width.saturating_sub(x));

        if bitcount == 4 {
          let mut pending_high: Option<u8> = None;
          for i in 0..count {
            let nibble = if i % 2 == 0 {
              let Some(b) = read_byte_or_truncate(src, latches) else { return RowOutcome::Truncated };
              pending_high = Some(b & 0x0F);
              b >> 4
            } else {
              pending_high.take().unwrap_or(0)
            };
            if i < to_write {
              write_pixel(out_row, x + i, &RlePixel::Index(nibble), palette, output);
            }
          }
        } else {
          for i in 0..count {
            let Some(unit) = read_repeat_unit(src, bitcount, latches) else { return RowOutcome::Truncated };
            if i < to_write {
              let pixel = if bitcount == 24 { RlePixel::Bgr(unit) } else { RlePixel::Index(unit[0]) };
              write_pixel(out_row, x + i, &pixel, palette, output);
            }
          }
        }

        if consume_literal_padding(src, bitcount, count, latches).is_none() {
          return RowOutcome::Truncated;
        }
        x += to_write;
        wrote_any = true;
      }
    }
  }
}

/// Pads a literal run to an even byte count, per §4.3.3 / §4.4's mirrored
/// writer rule (a multiple of two bytes for RLE8/24, four nibbles for
/// RLE4 — both reduce to "round the byte length up to even").
fn consume_literal_padding(src: &mut dyn ByteSource, bitcount: u16, count: usize, latches: &mut ErrorLatches) -> Option<()> {
  let byte_len = if bitcount == 4 { (count + 1) / 2 } else { count * (bitcount as usize / 8) };
  if byte_len % 2 == 1 && read_byte_or_truncate(src, latches).is_none() {
    return None;
  }
  Some(())
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

  fn two_color_palette() -> BmpPalette {
    BmpPalette::from_entries(alloc::vec![
      PaletteEntry { r: 0, g: 0, b: 0 },
      PaletteEntry { r: 255, g: 255, b: 255 },
    ])
  }

  #[test]
  fn repeat_run_then_eol() {
    let bytes = [4_u8, 1, 0, 0];
    let mut src: &[u8] = &bytes;
    let palette = two_color_palette();
    let mut out = [0_u8; 4 * 3];
    let mut cursor = DecodeCursor::default();
    let mut latches = ErrorLatches::new();
    let outcome = decode_rle_row(&mut src, &mut out, 4, 8, &palette, output_spec(), &mut cursor, &mut latches);
    assert_eq!(outcome, RowOutcome::Done);
    assert!(!latches.any());
    assert_eq!(&out[0..3], &[255, 255, 255]);
  }

  #[test]
  fn delta_advances_x_and_latches_on_overflow() {
    let bytes = [0_u8, 2, 10, 0, 0, 1]; // delta dx=10 (>= width) dy=0, then end of bitmap
    let mut src: &[u8] = &bytes;
    let palette = two_color_palette();
    let mut out = [0_u8; 4 * 3];
    let mut cursor = DecodeCursor::default();
    let mut latches = ErrorLatches::new();
    let outcome = decode_rle_row(&mut src, &mut out, 4, 8, &palette, output_spec(), &mut cursor, &mut latches);
    assert_eq!(outcome, RowOutcome::EndOfBitmap);
    assert!(latches.any());
  }

  #[test]
  fn literal_run_with_odd_length_is_padded() {
    let bytes = [0_u8, 3, 1, 0, 1, 0xAA, 0, 0];
    let mut src: &[u8] = &bytes;
    let palette = two_color_palette();
    let mut out = [0_u8; 3 * 3];
    let mut cursor = DecodeCursor::default();
    let mut latches = ErrorLatches::new();
    let outcome = decode_rle_row(&mut src, &mut out, 3, 8, &palette, output_spec(), &mut cursor, &mut latches);
    assert_eq!(outcome, RowOutcome::Done);
    assert_eq!(&out[0..3], &[255, 255, 255]);
    assert_eq!(&out[3..6], &[0, 0, 0]);
  }

  #[test]
  fn rle4_literal_run_unpacks_nibbles() {
    // 3 indices packed as two bytes: [1,0] in byte 0 (high=1, low=0), [1,_] in byte 1.
    let bytes = [0_u8, 3, 0x10, 0x10, 0, 0];
    let mut src: &[u8] = &bytes;
    let palette = two_color_palette();
    let mut out = [0_u8; 3 * 3];
    let mut cursor = DecodeCursor::default();
    let mut latches = ErrorLatches::new();
    let outcome = decode_rle_row(&mut src, &mut out, 3, 4, &palette, output_spec(), &mut cursor, &mut latches);
    assert_eq!(outcome, RowOutcome::Done);
    assert_eq!(&out[0..3], &[255, 255, 255]);
    assert_eq!(&out[3..6], &[0, 0, 0]);
    assert_eq!(&out[6..9], &[255, 255, 255]);
  }
}
