//! RLE4 / RLE8 / RLE24 row writer, the inverse of
//! [`crate::bmp::decode::rle::decode_rle_row`] (§4.3.3, §4.4).

use crate::{bmp::encode::InputSpec, bmp::palette::BmpPalette, error::BmpError, sink::ByteSink};
use alloc::vec::Vec;

/// One encoded pixel's colour, before packing: a palette index for 4/8-bit
/// RLE, or a raw B-G-R triple for 24-bit RLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncPixel {
  Index(u8),
  Bgr([u8; 3]),
}

/// Nearest-colour palette lookup for a caller-supplied RGB pixel being
/// encoded against an indexed output format; squared Euclidean distance
/// over the palette's stored 24-bit entries.
fn nearest_index(palette: &BmpPalette, r: u8, g: u8, b: u8) -> u8 {
  let mut best_index = 0_u8;
  let mut best_distance = u32::MAX;
  for (i, entry) in palette.entries().iter().enumerate() {
    let dr = i32::from(entry.r) - i32::from(r);
    let dg = i32::from(entry.g) - i32::from(g);
    let db = i32::from(entry.b) - i32::from(b);
    let distance = (dr * dr + dg * dg + db * db) as u32;
    if distance < best_distance {
      best_distance = distance;
      best_index = i as u8;
    }
  }
  best_index
}

/// Reads one row's pixels out of the caller's buffer into the wire colour
/// each will be encoded as.
fn row_pixels(row_in: &[u8], width: u32, bitcount: u16, palette: Option<&BmpPalette>, spec: InputSpec) -> Vec<EncPixel> {
  let stride = spec.pixel_stride();
  let mut out = Vec::with_capacity(width as usize);
  for px in 0..width as usize {
    let offset = px * stride;
    if bitcount == 24 {
      let r = spec.read_channel(row_in, offset, 8) as u8;
      let g = spec.read_channel(row_in, offset + spec.bytes_per_channel(), 8) as u8;
      let b = spec.read_channel(row_in, offset + 2 * spec.bytes_per_channel(), 8) as u8;
      out.push(EncPixel::Bgr([b, g, r]));
    } else if spec.source_indexed {
      out.push(EncPixel::Index(row_in[offset]));
    } else {
      let r = spec.read_channel(row_in, offset, 8) as u8;
      let g = spec.read_channel(row_in, offset + spec.bytes_per_channel(), 8) as u8;
      let b = spec.read_channel(row_in, offset + 2 * spec.bytes_per_channel(), 8) as u8;
      let palette = palette.expect("indexed RLE output requires a palette");
      out.push(EncPixel::Index(nearest_index(palette, r, g, b)));
    }
  }
  out
}

/// Runs of equal pixel colour, each capped at 255 (the RLE count byte's
/// range).
fn build_groups(pixels: &[EncPixel]) -> Vec<(EncPixel, u32)> {
  let mut groups = Vec::new();
  let mut i = 0;
  while i < pixels.len() {
    let value = pixels[i];
    let mut len = 1_u32;
    let mut j = i + 1;
    while j < pixels.len() && pixels[j] == value && len < 255 {
      len += 1;
      j += 1;
    }
    groups.push((value, len));
    i = j;
  }
  groups
}

/// One planned output operation: a literal run over a group range, or a
/// repeat run of a single group.
enum RleOp {
  Literal { start: usize, end: usize },
  Repeat { index: usize },
}

/// Plans a row's literal/repeat split per §4.4's rule: accumulate groups
/// shorter than `minlen` into a literal run, absorbing a longer group that
/// appears within `small_number` groups of lookahead rather than breaking
/// the run, and falling back to a repeat run when the accumulated literal
/// would be shorter than 3 pixels.
fn plan_row(groups: &[(EncPixel, u32)], minlen: u32, small_number: usize) -> Vec<RleOp> {
  let mut ops = Vec::new();
  let n = groups.len();
  let mut i = 0;
  while i < n {
    if groups[i].1 >= minlen {
      ops.push(RleOp::Repeat { index: i });
      i += 1;
      continue;
    }
    let start = i;
    let mut literal_pixels = 0_u32;
    let mut j = i;
    while j < n {
      let (_, len) = groups[j];
      if len < minlen {
        if literal_pixels + len > 255 {
          break;
        }
        literal_pixels += len;
        j += 1;
        continue;
      }
      let window_end = (j + 1 + small_number).min(n);
      let absorbable = groups[j + 1..window_end].iter().any(|(_, l)| *l < minlen);
      if absorbable && literal_pixels + len <= 255 {
        literal_pixels += len;
        j += 1;
      } else {
        break;
      }
    }
    if literal_pixels >= 3 {
      ops.push(RleOp::Literal { start, end: j });
      i = j;
    } else {
      ops.push(RleOp::Repeat { index: i });
      i += 1;
    }
  }
  ops
}

fn write_count_and_unit(dst: &mut dyn ByteSink, count: u32, pixel: EncPixel, bitcount: u16) -> Result<u64, BmpError> {
  dst.write_all(&[count as u8])?;
  match pixel {
    EncPixel::Bgr(bgr) => {
      dst.write_all(&bgr)?;
      Ok(4)
    }
    EncPixel::Index(v) => {
      let unit = if bitcount == 4 { (v << 4) | v } else { v };
      dst.write_all(&[unit])?;
      Ok(2)
    }
  }
}

fn emit_literal(dst: &mut dyn ByteSink, values: &[EncPixel], bitcount: u16) -> Result<u64, BmpError> {
  let count = values.len();
  dst.write_all(&[0, count as u8])?;
  let mut bytes_out: u64 = 2;

  match bitcount {
    24 => {
      for v in values {
        let EncPixel::Bgr(bgr) = v else { unreachable!() };
        dst.write_all(bgr)?;
        bytes_out += 3;
      }
    }
    4 => {
      for chunk in values.chunks(2) {
        let hi = index_value(chunk[0]);
        let lo = chunk.get(1).map_or(0, |v| index_value(*v));
        dst.write_all(&[(hi << 4) | lo])?;
        bytes_out += 1;
      }
    }
    _ => {
      for v in values {
        dst.write_all(&[index_value(*v)])?;
        bytes_out += 1;
      }
    }
  }

  if bytes_out % 2 == 1 {
    dst.write_all(&[0])?;
    bytes_out += 1;
  }
  Ok(bytes_out)
}

fn index_value(pixel: EncPixel) -> u8 {
  match pixel {
    EncPixel::Index(v) => v,
    EncPixel::Bgr(_) => unreachable!("24-bit RLE never packs nibble/byte indices"),
  }
}

/// Encodes one row as RLE4/RLE8/RLE24, ending with a per-row EOL
/// (`0x00 0x00`); the caller appends the final end-of-bitmap marker after
/// the last row (§4.4).
pub(crate) fn encode_rle_row(
  dst: &mut dyn ByteSink, row_in: &[u8], width: u32, bitcount: u16, palette: Option<&BmpPalette>, spec: InputSpec,
) -> Result<u64, BmpError> {
  let (minlen, small_number) = match bitcount {
    4 => (3_u32, 7_usize),
    24 => (2, 2),
    _ => (2, 5),
  };
  let pixels = row_pixels(row_in, width, bitcount, palette, spec);
  let groups = build_groups(&pixels);
  let ops = plan_row(&groups, minlen, small_number);

  let mut bytes_out: u64 = 0;
  for op in ops {
    match op {
      RleOp::Repeat { index } => {
        let (value, len) = groups[index];
        bytes_out += write_count_and_unit(dst, len, value, bitcount)?;
      }
      RleOp::Literal { start, end } => {
        let mut values = Vec::new();
        for &(value, len) in &groups[start..end] {
          for _ in 0..len {
            values.push(value);
          }
        }
        bytes_out += emit_literal(dst, &values, bitcount)?;
      }
    }
  }
  dst.write_all(&[0, 0])?;
  bytes_out += 2;
  Ok(bytes_out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{bmp::numeric::ResultFormat, bmp::palette::PaletteEntry, sink::VecSink};

  fn two_color_palette() -> BmpPalette {
    BmpPalette::from_entries(alloc::vec![PaletteEntry { r: 0, g: 0, b: 0 }, PaletteEntry { r: 255, g: 255, b: 255 }])
  }

  fn indexed_spec() -> InputSpec {
    InputSpec { format: ResultFormat::Int, int_width: 8, channel_count: 1, source_indexed: true }
  }

  #[test]
  fn long_run_becomes_a_repeat_op() {
    let mut sink = VecSink::new();
    let row = [1_u8; 8];
    let palette = two_color_palette();
    let n = encode_rle_row(&mut sink, &row, 8, 8, Some(&palette), indexed_spec()).unwrap();
    let out = sink.into_inner();
    assert_eq!(&out[0..2], &[8, 1]);
    assert_eq!(&out[out.len() - 2..], &[0, 0]);
    assert_eq!(n as usize, out.len());
  }

  #[test]
  fn short_alternating_run_becomes_a_literal_op() {
    let mut sink = VecSink::new();
    let row = [0_u8, 1, 0, 1];
    let palette = two_color_palette();
    encode_rle_row(&mut sink, &row, 4, 8, Some(&palette), indexed_spec()).unwrap();
    let out = sink.into_inner();
    assert_eq!(&out[0..2], &[0, 4]);
    assert_eq!(&out[2..6], &[0, 1, 0, 1]);
    assert_eq!(&out[6..], &[0, 0]);
  }

  #[test]
  fn rle24_emits_bgr_repeat_units() {
    let mut sink = VecSink::new();
    let mut row = Vec::new();
    for _ in 0..3 {
      row.extend_from_slice(&[10_u8, 20, 30]);
    }
    let spec = InputSpec { format: ResultFormat::Int, int_width: 8, channel_count: 3, source_indexed: false };
    encode_rle_row(&mut sink, &row, 3, 24, None, spec).unwrap();
    let out = sink.into_inner();
    assert_eq!(&out[0..4], &[3, 30, 20, 10]);
  }
}
