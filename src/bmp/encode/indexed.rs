//! Packed indexed-colour row writer: the inverse of
//! [`crate::bmp::decode::indexed::decode_indexed_row`] (§4.3.3, §4.4).

use crate::{bmp::encode::InputSpec, error::BmpError, sink::ByteSink, util::align4padding};

/// Packs `width` palette-index bytes from `row_in` into `bitcount`-wide
/// slots, MSB-first within each output byte, and pads the row to a 4-byte
/// boundary (§4.1 "each row padded to a multiple of 4 bytes", §4.3.3).
///
/// `row_in` holds one raw index byte per pixel regardless of `spec`, since
/// indexed output is always sourced from `INT8` index bytes (§4.3.3
/// `INDEXED` requires `INT8`).
pub(crate) fn encode_indexed_row(
  dst: &mut dyn ByteSink, row_in: &[u8], width: u32, bitcount: u16, _spec: InputSpec,
) -> Result<u64, BmpError> {
  let bitcount = u32::from(bitcount);
  let mut acc: u32 = 0;
  let mut acc_bits: u32 = 0;
  let mut bytes_out: u64 = 0;
  let mut byte = [0_u8; 1];

  for &index in row_in.iter().take(width as usize) {
    acc = (acc << bitcount) | u32::from(index);
    acc_bits += bitcount;
    while acc_bits >= 8 {
      acc_bits -= 8;
      byte[0] = ((acc >> acc_bits) & 0xFF) as u8;
      dst.write_all(&byte)?;
      bytes_out += 1;
    }
  }
  if acc_bits > 0 {
    byte[0] = ((acc << (8 - acc_bits)) & 0xFF) as u8;
    dst.write_all(&byte)?;
    bytes_out += 1;
  }

  let row_bytes = ((u64::from(width) * u64::from(bitcount)) + 7) / 8;
  let padding = align4padding(row_bytes as usize);
  if padding > 0 {
    let pad = [0_u8; 4];
    dst.write_all(&pad[..padding])?;
    bytes_out += padding as u64;
  }
  Ok(bytes_out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{bmp::numeric::ResultFormat, sink::VecSink};

  fn spec() -> InputSpec {
    InputSpec { format: ResultFormat::Int, int_width: 8, channel_count: 1, source_indexed: true }
  }

  #[test]
  fn packs_four_2bit_indices_into_one_byte_plus_padding() {
    let mut sink = VecSink::new();
    let row = [0b11_u8, 0b10, 0b01, 0b00];
    let n = encode_indexed_row(&mut sink, &row, 4, 2, spec()).unwrap();
    assert_eq!(n, 4);
    assert_eq!(sink.into_inner()[0], 0b1110_0100);
  }

  #[test]
  fn packs_8bpp_indices_one_byte_each() {
    let mut sink = VecSink::new();
    let row = [5_u8, 6, 7];
    let n = encode_indexed_row(&mut sink, &row, 3, 8, spec()).unwrap();
    assert_eq!(n, 4);
    assert_eq!(sink.into_inner(), vec![5, 6, 7, 0]);
  }
}
