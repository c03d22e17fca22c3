//! OS/2 1-bpp Huffman (CCITT T.4 1D) line encode: the inverse of
//! [`crate::bmp::decode::huffman_line::decode_huffman_row`] (§4.3.4, §4.4).

use crate::{bmp::encode::EncodeCursor, error::BmpError, huffman::{tables::REVERSED_BYTE, HuffmanCodec}, sink::ByteSink};

const EOL_BITS: u32 = 12;
const EOL_CODE: u32 = 0b0000_0000_0001;

/// Shifts `code` (`bits` wide) into the cursor's MSB-first accumulator and
/// drains whole bytes out to `dst`, bit-reversing each one the same way the
/// decoder's bit reader un-reverses it on the way in (§4.3.4).
fn push_bits(cursor: &mut EncodeCursor, dst: &mut dyn ByteSink, bits: u32, code: u32) -> Result<(), BmpError> {
  cursor.bit_acc = (cursor.bit_acc << bits) | code;
  cursor.bit_acc_bits += bits;
  while cursor.bit_acc_bits >= 8 {
    cursor.bit_acc_bits -= 8;
    let byte = ((cursor.bit_acc >> cursor.bit_acc_bits) & 0xFF) as u8;
    dst.write_all(&[REVERSED_BYTE[byte as usize]])?;
  }
  Ok(())
}

fn emit_eol(cursor: &mut EncodeCursor, dst: &mut dyn ByteSink) -> Result<(), BmpError> {
  push_bits(cursor, dst, EOL_BITS, EOL_CODE)
}

/// Runs `codec.encode_run` and pushes every emitted code into the bit
/// accumulator, propagating the first write failure encountered.
fn run_codes(codec: &HuffmanCodec, white: bool, run: u32, cursor: &mut EncodeCursor, dst: &mut dyn ByteSink) -> Result<(), BmpError> {
  let mut first_err = None;
  codec.encode_run(white, run, |bits, code| {
    if first_err.is_none() {
      if let Err(e) = push_bits(cursor, dst, u32::from(bits), u32::from(code)) {
        first_err = Some(e);
      }
    }
  });
  match first_err {
    Some(e) => Err(e),
    None => Ok(()),
  }
}

/// Encodes one row of 1-bpp palette-index pixels (`row_in`, one byte per
/// pixel) as a Huffman-coded scanline: a leading EOL sync, then alternating
/// white/black runs. The CCITT convention always starts a row expecting
/// white; when the row's actual first colour is black, a zero-length white
/// run is emitted first to resynchronise the alternation before the real
/// run (§4.3.4, §4.4).
pub(crate) fn encode_huffman_row(
  dst: &mut dyn ByteSink, row_in: &[u8], width: u32, cursor: &mut EncodeCursor, zero_is_white: bool,
) -> Result<(), BmpError> {
  let codec = cursor.huffman.take().unwrap_or_else(HuffmanCodec::new);

  let result = (|| {
    emit_eol(cursor, dst)?;

    let mut expect_white = true;
    let mut i = 0_usize;
    let width = width as usize;
    while i < width {
      let value = row_in[i];
      let mut j = i + 1;
      while j < width && row_in[j] == value {
        j += 1;
      }
      let run = (j - i) as u32;
      let actual_white = (value == 0) == zero_is_white;

      if actual_white != expect_white {
        run_codes(&codec, expect_white, 0, cursor, dst)?;
        expect_white = !expect_white;
      }
      run_codes(&codec, actual_white, run, cursor, dst)?;
      expect_white = !expect_white;
      i = j;
    }
    Ok(())
  })();

  cursor.huffman = Some(codec);
  result
}

/// Emits the six-EOL stream terminator and flushes any partial trailing
/// byte, zero-padded, per §4.4 "the stream terminates with six EOLs
/// (return-to-control)".
pub(crate) fn finish_huffman_stream(dst: &mut dyn ByteSink, cursor: &mut EncodeCursor) -> Result<(), BmpError> {
  for _ in 0..6 {
    emit_eol(cursor, dst)?;
  }
  if cursor.bit_acc_bits > 0 {
    let byte = ((cursor.bit_acc << (8 - cursor.bit_acc_bits)) & 0xFF) as u8;
    dst.write_all(&[REVERSED_BYTE[byte as usize]])?;
    cursor.bit_acc = 0;
    cursor.bit_acc_bits = 0;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    bmp::decode::{decode_huffman_row, DecodeCursor, OutputSpec},
    bmp::numeric::ResultFormat,
    bmp::palette::{BmpPalette, PaletteEntry},
    log::ErrorLatches,
    sink::VecSink,
  };

  fn bw_palette() -> BmpPalette {
    BmpPalette::from_entries(alloc::vec![
      PaletteEntry { r: 0, g: 0, b: 0 },
      PaletteEntry { r: 255, g: 255, b: 255 },
    ])
  }

  fn output_spec() -> OutputSpec {
    OutputSpec {
      format: ResultFormat::Int,
      int_width: 8,
      channel_count: 1,
      undefined_policy: Default::default(),
      result_indexed: true,
      conv64: Default::default(),
      huffman_zero_is_white: true,
    }
  }

  #[test]
  fn round_trips_an_alternating_row_through_the_decoder() {
    let row = [0_u8, 0, 0, 0, 1, 1, 1, 1];
    let mut sink = VecSink::new();
    let mut cursor = EncodeCursor::default();
    encode_huffman_row(&mut sink, &row, 8, &mut cursor, true).unwrap();
    finish_huffman_stream(&mut sink, &mut cursor).unwrap();

    let bytes = sink.into_inner();
    let mut src: &[u8] = &bytes;
    let palette = bw_palette();
    let mut out = [0_u8; 8];
    let mut decode_cursor = DecodeCursor::default();
    let mut latches = ErrorLatches::new();
    let outcome = decode_huffman_row(&mut src, &mut out, 8, &palette, output_spec(), &mut decode_cursor, &mut latches);
    assert_eq!(outcome, crate::bmp::decode::RowOutcome::Done);
    assert!(!latches.any());
    assert_eq!(out, row);
  }

  #[test]
  fn row_starting_black_resyncs_with_a_zero_length_white_run() {
    let row = [1_u8, 1, 1, 0, 0, 0, 0, 0];
    let mut sink = VecSink::new();
    let mut cursor = EncodeCursor::default();
    encode_huffman_row(&mut sink, &row, 8, &mut cursor, true).unwrap();
    finish_huffman_stream(&mut sink, &mut cursor).unwrap();

    let bytes = sink.into_inner();
    let mut src: &[u8] = &bytes;
    let palette = bw_palette();
    let mut out = [0_u8; 8];
    let mut decode_cursor = DecodeCursor::default();
    let mut latches = ErrorLatches::new();
    let outcome = decode_huffman_row(&mut src, &mut out, 8, &palette, output_spec(), &mut decode_cursor, &mut latches);
    assert_eq!(outcome, crate::bmp::decode::RowOutcome::Done);
    assert!(!latches.any());
    assert_eq!(out, row);
  }
}
