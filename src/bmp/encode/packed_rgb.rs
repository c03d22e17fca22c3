//! Packed-RGB(A) row writer, including the fixed-layout 64-bpp case: the
//! inverse of [`crate::bmp::decode::packed_rgb`] (§4.3.1, §4.4).

use crate::{
  bmp::colormask::{BmpColorMask, ChannelMask},
  bmp::encode::InputSpec,
  error::BmpError,
  sink::ByteSink,
};

/// Packs one row of `width` pixels through `mask`, `bitcount` bits per
/// pixel, 4-byte-aligned (the caller pads; every supported `bitcount` here
/// — 16/24/32 — is already a multiple of 4 bytes per row once `width` many
/// whole pixels are written, so no interior padding is needed beyond the
/// final partial word boundary `bitcount` itself guarantees).
pub(crate) fn encode_packed_rgb_row(
  dst: &mut dyn ByteSink, row_in: &[u8], width: u32, bitcount: u16, mask: BmpColorMask, spec: InputSpec,
) -> Result<u64, BmpError> {
  let stride = spec.pixel_stride();
  let bytes_per_pixel = (u32::from(bitcount) / 8) as usize;
  let mut bytes_out: u64 = 0;

  for px in 0..width as usize {
    let offset = px * stride;
    let mut packed: u32 = pack_channel(mask.red, spec, row_in, offset, 0)
      | pack_channel(mask.green, spec, row_in, offset, 1)
      | pack_channel(mask.blue, spec, row_in, offset, 2);
    if mask.alpha.width > 0 {
      packed |= if spec.channel_count >= 4 {
        pack_channel(mask.alpha, spec, row_in, offset, 3)
      } else {
        mask.alpha.mask
      };
    }
    let bytes = packed.to_le_bytes();
    dst.write_all(&bytes[..bytes_per_pixel])?;
    bytes_out += bytes_per_pixel as u64;
  }
  Ok(bytes_out)
}

fn pack_channel(channel: ChannelMask, spec: InputSpec, row_in: &[u8], pixel_offset: usize, slot: usize) -> u32 {
  if channel.width == 0 {
    return 0;
  }
  let channel_offset = pixel_offset + slot * spec.bytes_per_channel();
  let value = spec.read_channel(row_in, channel_offset, channel.width);
  (value << channel.shift) & channel.mask
}

/// Packs one 64-bpp pixel: B (bits 0-15), G (16-31), R (32-47), A (48-63),
/// each a raw s2.13 value, matching
/// [`crate::bmp::decode::packed_rgb::write_64bpp_pixel`]'s layout in
/// reverse (§4.3.1).
pub(crate) fn pack_64bpp_pixel(row_in: &[u8], pixel_offset: usize, spec: InputSpec) -> u64 {
  let stride_channel = spec.bytes_per_channel();
  let r = spec.read_s2_13_bits(row_in, pixel_offset + 0 * stride_channel) as u16;
  let g = spec.read_s2_13_bits(row_in, pixel_offset + 1 * stride_channel) as u16;
  let b = spec.read_s2_13_bits(row_in, pixel_offset + 2 * stride_channel) as u16;
  let a = if spec.channel_count >= 4 {
    spec.read_s2_13_bits(row_in, pixel_offset + 3 * stride_channel) as u16
  } else {
    0x2000
  };
  u64::from(b) | (u64::from(g) << 16) | (u64::from(r) << 32) | (u64::from(a) << 48)
}

/// Packs one row of 64-bpp pixels, each a fixed 8-byte s2.13 BGRA word
/// (§4.3.1).
pub(crate) fn encode_64bpp_row(dst: &mut dyn ByteSink, row_in: &[u8], width: u32, spec: InputSpec) -> Result<u64, BmpError> {
  let stride = spec.pixel_stride();
  let mut bytes_out: u64 = 0;
  for px in 0..width as usize {
    let word = pack_64bpp_pixel(row_in, px * stride, spec);
    dst.write_all(&word.to_le_bytes())?;
    bytes_out += 8;
  }
  Ok(bytes_out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{bmp::numeric::ResultFormat, sink::VecSink};

  fn spec_int8() -> InputSpec {
    InputSpec { format: ResultFormat::Int, int_width: 8, channel_count: 3, source_indexed: false }
  }

  #[test]
  fn packs_24bpp_bgr_in_order() {
    let mask = BmpColorMask::implicit_for_bitcount(24).unwrap();
    let mut sink = VecSink::new();
    let row = [0x10_u8, 0x20, 0x30];
    let n = encode_packed_rgb_row(&mut sink, &row, 1, 24, mask, spec_int8()).unwrap();
    assert_eq!(n, 3);
    assert_eq!(sink.into_inner(), vec![0x30, 0x20, 0x10]);
  }

  #[test]
  fn fills_opaque_alpha_when_source_has_no_alpha_channel() {
    let mask = BmpColorMask::implicit_for_bitcount(32).unwrap();
    let mut spec = spec_int8();
    spec.channel_count = 3;
    let mut sink = VecSink::new();
    let row = [0x10_u8, 0x20, 0x30];
    encode_packed_rgb_row(&mut sink, &row, 1, 32, mask, spec).unwrap();
    let out = sink.into_inner();
    assert_eq!(out, vec![0x30, 0x20, 0x10, 0xFF]);
  }

  #[test]
  fn packs_64bpp_pixel_bgra_s2_13() {
    #[cfg(feature = "alloc")]
    use alloc::vec::Vec;
    let mut spec = spec_int8();
    spec.format = ResultFormat::S2_13;
    spec.channel_count = 4;
    let mut row = Vec::new();
    row.extend_from_slice(&8192_i16.to_le_bytes());
    row.extend_from_slice(&0_i16.to_le_bytes());
    row.extend_from_slice(&(-8192_i16).to_le_bytes());
    row.extend_from_slice(&8192_i16.to_le_bytes());
    let word = pack_64bpp_pixel(&row, 0, spec);
    assert_eq!(word & 0xFFFF, 0xE000);
    assert_eq!((word >> 32) & 0xFFFF, 0x2000);
    assert_eq!((word >> 48) & 0xFFFF, 0x2000);
  }
}
