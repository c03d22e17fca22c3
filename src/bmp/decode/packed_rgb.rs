//! Packed-RGB line decode (§4.3.1).

use super::OutputSpec;
use crate::{
  bmp::{colormask::BmpColorMask, numeric::{s2_13_to_float, srgb_encode, Conv64Mode, ResultFormat}},
  log::ErrorLatches,
  sink::ByteSource,
  util::align4padding,
};

use super::RowOutcome;

pub(crate) fn decode_packed_rgb_row(
  src: &mut dyn ByteSource, out_row: &mut [u8], width: u32, bitcount: u16, mask: &BmpColorMask, output: OutputSpec,
  latches: &mut ErrorLatches,
) -> RowOutcome {
  let bytes_per_pixel = bitcount as usize / 8;
  let stride = output.pixel_stride();

  for px in 0..width as usize {
    let mut raw = [0_u8; 8];
    if src.read_exact(&mut raw[..bytes_per_pixel]).is_err() {
      latches.set_truncated();
      return RowOutcome::Truncated;
    }
    let acc = u64::from_le_bytes(raw);
    let offset = px * stride;

    if bitcount == 64 {
      write_64bpp_pixel(out_row, offset, acc, output);
    } else {
      let r = ((acc as u32) & mask.red.mask) >> mask.red.shift;
      let g = ((acc as u32) & mask.green.mask) >> mask.green.shift;
      let b = ((acc as u32) & mask.blue.mask) >> mask.blue.shift;
      output.write_channel(out_row, offset, r, mask.red.width.max(1));
      output.write_channel(out_row, offset + output.bytes_per_channel(), g, mask.green.width.max(1));
      output.write_channel(out_row, offset + 2 * output.bytes_per_channel(), b, mask.blue.width.max(1));
      if mask.alpha.width > 0 {
        let a = ((acc as u32) & mask.alpha.mask) >> mask.alpha.shift;
        output.write_channel(out_row, offset + 3 * output.bytes_per_channel(), a, mask.alpha.width);
      } else if output.channel_count == 4 {
        output.write_opaque_alpha(out_row, offset + 3 * output.bytes_per_channel());
      }
    }
  }

  let padding = align4padding((width as usize * bitcount as usize + 7) / 8);
  if padding > 0 {
    let mut pad = [0_u8; 3];
    if src.read_exact(&mut pad[..padding]).is_err() {
      latches.set_truncated();
      return RowOutcome::Truncated;
    }
  }
  RowOutcome::Done
}

/// 64-bpp pixels store each channel as signed s2.13 in B, G, R, A order
/// (§4.3.1's "For 64-bpp input, treat stored values as s2.13").
fn write_64bpp_pixel(out_row: &mut [u8], offset: usize, acc: u64, output: OutputSpec) {
  let b = (acc & 0xFFFF) as u16;
  let g = ((acc >> 16) & 0xFFFF) as u16;
  let r = ((acc >> 32) & 0xFFFF) as u16;
  let a = ((acc >> 48) & 0xFFFF) as u16;
  let bpc = output.bytes_per_channel();

  let write_s2_13_channel = |out_row: &mut [u8], offset: usize, raw: u16, apply_srgb: bool| {
    let f = s2_13_to_float(raw);
    match output.conv64 {
      Conv64Mode::None => {
        // Pass the raw s2.13 bits straight through regardless of the
        // requested format's usual rescale path.
        match output.format {
          ResultFormat::S2_13 => out_row[offset..offset + 2].copy_from_slice(&raw.to_le_bytes()),
          ResultFormat::Float => out_row[offset..offset + 4].copy_from_slice(&f.to_le_bytes()),
          ResultFormat::Int => {
            let clamped = f.clamp(0.0, 1.0);
            write_unit_float(out_row, offset, clamped, output);
          }
        }
      }
      Conv64Mode::Linear => {
        let clamped = f.clamp(0.0, 1.0);
        write_unit_float(out_row, offset, clamped, output);
      }
      Conv64Mode::Srgb => {
        let clamped = f.clamp(0.0, 1.0);
        let shaped = if apply_srgb { srgb_encode(clamped) } else { clamped };
        write_unit_float(out_row, offset, shaped, output);
      }
    }
    let _ = bpc;
  };

  write_s2_13_channel(out_row, offset, r, true);
  write_s2_13_channel(out_row, offset + bpc, g, true);
  write_s2_13_channel(out_row, offset + 2 * bpc, b, true);
  if output.channel_count == 4 {
    write_s2_13_channel(out_row, offset + 3 * bpc, a, false);
  }
}

/// Writes a value already known to be in `[0, 1]` into the selected result
/// format, bypassing the integer-source rescale path (the 64-bpp input has
/// already been linearized).
fn write_unit_float(out_row: &mut [u8], offset: usize, unit: f32, output: OutputSpec) {
  match output.format {
    ResultFormat::Int => {
      let max = match output.int_width {
        8 => 255.0,
        16 => 65535.0,
        _ => u32::MAX as f32,
      };
      let v = (unit * max).round().clamp(0.0, max) as u32;
      match output.int_width {
        8 => out_row[offset] = v as u8,
        16 => out_row[offset..offset + 2].copy_from_slice(&(v as u16).to_le_bytes()),
        _ => out_row[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
      }
    }
    ResultFormat::Float => out_row[offset..offset + 4].copy_from_slice(&unit.to_le_bytes()),
    ResultFormat::S2_13 => {
      let bits = crate::bmp::numeric::float_to_s2_13(unit);
      out_row[offset..offset + 2].copy_from_slice(&bits.to_le_bytes());
    }
  }
}
