use bmpcore::{
  bmp::{
    BmpPalette, BmpReader, BmpWriter, Conv64Mode, OpenOutcome, PaletteEntry, ResultFormat,
  },
  sink::VecSink,
  BmpResultCode,
};

fn write_header(
  out: &mut Vec<u8>, tag: &[u8; 2], file_size: u32, offbits: u32, width: i32, height: i32, bitcount: u16,
  compression: u32,
) {
  out.extend_from_slice(tag);
  out.extend_from_slice(&file_size.to_le_bytes());
  out.extend_from_slice(&[0_u8; 4]); // reserved1/2
  out.extend_from_slice(&offbits.to_le_bytes());
  out.extend_from_slice(&40_u32.to_le_bytes()); // info header size (V3)
  out.extend_from_slice(&width.to_le_bytes());
  out.extend_from_slice(&height.to_le_bytes());
  out.extend_from_slice(&1_u16.to_le_bytes()); // planes
  out.extend_from_slice(&bitcount.to_le_bytes());
  out.extend_from_slice(&compression.to_le_bytes());
  out.extend_from_slice(&[0_u8; 4]); // sizeimage
  out.extend_from_slice(&[0_u8; 8]); // xpels, ypels
  out.extend_from_slice(&[0_u8; 4]); // clrused
  out.extend_from_slice(&[0_u8; 4]); // clrimportant
}

/// 2x2 24bpp BI_RGB round trip through the writer then the reader (default
/// bottom-up storage).
#[test]
fn round_trips_24bpp_bottom_up_through_writer_and_reader() {
  let mut sink = VecSink::new();
  let mut writer = BmpWriter::new(&mut sink);
  writer.set_dimensions(2, 2).unwrap();
  let pixels = [
    10_u8, 20, 30, // (0,0), top row
    40, 50, 60, // (1,0)
    70, 80, 90, // (0,1), bottom row
    100, 110, 120, // (1,1)
  ];
  let code = writer.save_image(&pixels).unwrap();
  assert_eq!(code, BmpResultCode::Ok);

  let bytes = sink.into_inner();
  let mut src: &[u8] = &bytes;
  let OpenOutcome::Bitmap(mut reader) = BmpReader::open(&mut src).unwrap() else { panic!("expected Bitmap") };
  assert_eq!(reader.width().unwrap(), 2);
  assert_eq!(reader.height().unwrap(), 2);
  assert!(!reader.is_top_down());
  let mut out = [0_u8; 2 * 2 * 3];
  let code = reader.load_image(&mut out).unwrap();
  assert_eq!(code, BmpResultCode::Ok);
  assert_eq!(out, pixels);
}

/// A 1-bpp indexed bitmap, written through an explicit palette and read back
/// expanded to RGB.
#[test]
fn one_bpp_palette_expands_to_rgb_on_read() {
  let mut sink = VecSink::new();
  let mut writer = BmpWriter::new(&mut sink);
  writer.set_dimensions(8, 1).unwrap();
  let palette =
    BmpPalette::from_entries(vec![PaletteEntry { r: 0, g: 0, b: 0 }, PaletteEntry { r: 200, g: 200, b: 200 }]);
  writer.set_palette(palette).unwrap();
  writer.set_source_indexed(true).unwrap();
  let indices = [0_u8, 1, 0, 1, 1, 1, 0, 0];
  writer.save_image(&indices).unwrap();
  let bytes = sink.into_inner();

  let mut src: &[u8] = &bytes;
  let OpenOutcome::Bitmap(mut reader) = BmpReader::open(&mut src).unwrap() else { panic!("expected Bitmap") };
  assert_eq!(reader.width().unwrap(), 8);
  let mut out = [0_u8; 8 * 3];
  let code = reader.load_image(&mut out).unwrap();
  assert_eq!(code, BmpResultCode::Ok);
  assert_eq!(&out[0..3], &[0, 0, 0]);
  assert_eq!(&out[3..6], &[200, 200, 200]);
}

/// A negative `height` marks the rows as stored top-down; the reader's
/// `load_image` always hands them back in top-down order regardless, but
/// `is_top_down` should reflect what was on disk.
#[test]
fn negative_height_marks_top_down_storage() {
  let mut bytes = Vec::new();
  let width = 2_i32;
  let height = -2_i32;
  let row_stride = 2 * 3 + 2; // 3-byte pixels padded to a multiple of 4
  let offbits = 14 + 40;
  write_header(&mut bytes, b"BM", offbits as u32 + 2 * row_stride as u32, offbits as u32, width, height, 24, 0);
  // Top row first, since the file is top-down. Pixels are stored B-G-R on
  // disk, two bytes of row padding after each 2-pixel, 6-byte row.
  bytes.extend_from_slice(&[0, 0, 255, 0, 255, 0, 0, 0]); // red, green, padding
  bytes.extend_from_slice(&[255, 0, 0, 255, 255, 255, 0, 0]); // blue, white, padding

  let mut src: &[u8] = &bytes;
  let OpenOutcome::Bitmap(mut reader) = BmpReader::open(&mut src).unwrap() else { panic!("expected Bitmap") };
  assert!(reader.is_top_down());
  assert_eq!(reader.height().unwrap(), 2);
  let mut out = [0_u8; 2 * 2 * 3];
  reader.load_image(&mut out).unwrap();
  // load_image always returns rows top-down, so the file's first row (red,
  // green) should land first in `out` regardless of storage direction.
  assert_eq!(&out[0..3], &[255, 0, 0]);
  assert_eq!(&out[3..6], &[0, 255, 0]);
}

/// A hand-built RLE8 stream exercising a repeat run, a vertical delta, and a
/// truncated tail: the reader should latch `Truncated` rather than erroring.
#[test]
fn rle8_with_delta_and_truncation_latches_truncated() {
  let width = 4_i32;
  let height = 3_i32;
  let mut bytes = Vec::new();
  let offbits = 14 + 40 + 4 * 4; // V3 header + 4-entry palette
  write_header(&mut bytes, b"BM", 0, offbits as u32, width, height, 8, 1 /* RLE8 */);
  for i in 0..4_u8 {
    bytes.extend_from_slice(&[i * 60, i * 60, i * 60, 0]); // grayscale palette, BGR + reserved
  }

  // Row 0: a repeat run of index 1, four pixels.
  bytes.extend_from_slice(&[4, 1]);
  bytes.extend_from_slice(&[0, 0]); // end of line

  // Delta of (0, 1): skip straight to row 2, leaving row 1 untouched.
  bytes.extend_from_slice(&[0, 2, 0, 1]);

  // Row 2 starts, but the stream is cut off mid-run.
  bytes.extend_from_slice(&[2]);

  let mut src: &[u8] = &bytes;
  let OpenOutcome::Bitmap(mut reader) = BmpReader::open(&mut src).unwrap() else { panic!("expected Bitmap") };
  let mut out = vec![0_u8; 4 * 3 * 3];
  let code = reader.load_image(&mut out).unwrap();
  assert_eq!(code, BmpResultCode::Truncated);
  // Bottom-up storage means the file's first row (the repeat run of index 1)
  // lands at `load_image`'s bottom (last) output row.
  let row_stride = 4 * 3;
  let last_row = 2 * row_stride;
  assert_eq!(&out[last_row..last_row + 3], &[60, 60, 60]);
}

/// An all-white 1-bpp OS/2 Huffman row, round-tripped through the writer and
/// reader.
#[test]
fn huffman_row_of_all_white_round_trips() {
  let mut sink = VecSink::new();
  let mut writer = BmpWriter::new(&mut sink);
  writer.set_dimensions(8, 1).unwrap();
  let palette =
    BmpPalette::from_entries(vec![PaletteEntry { r: 0, g: 0, b: 0 }, PaletteEntry { r: 255, g: 255, b: 255 }]);
  writer.set_palette(palette).unwrap();
  writer.set_source_indexed(true).unwrap();
  writer.set_allow_huffman(true).unwrap();
  writer.set_rle(bmpcore::bmp::RleRequest::Auto).unwrap();
  let indices = [0_u8; 8]; // all white (index 0, zero_is_white default true)
  let code = writer.save_image(&indices).unwrap();
  assert_eq!(code, BmpResultCode::Ok);

  let bytes = sink.into_inner();
  let mut src: &[u8] = &bytes;
  let OpenOutcome::Bitmap(mut reader) = BmpReader::open(&mut src).unwrap() else { panic!("expected Bitmap") };
  let mut out = [0_u8; 8 * 3];
  let code = reader.load_image(&mut out).unwrap();
  assert_eq!(code, BmpResultCode::Ok);
  for px in out.chunks(3) {
    assert_eq!(px, &[0, 0, 0]);
  }
}

/// A single 64-bpp s2.13 pixel decoded under both `SRGB` and `NONE`
/// conversion modes should differ (`SRGB` applies a transfer curve; `NONE`
/// only makes sense paired with the `S2_13` result format).
#[test]
fn sixty_four_bpp_conv64_modes_diverge() {
  let mut bytes = Vec::new();
  let offbits = 14 + 40;
  write_header(&mut bytes, b"BM", 0, offbits as u32, 1, 1, 64, 0);
  // One pixel: B, G, R, A, each a little-endian s2.13 half-intensity value.
  let half = 0x1000_i16; // 0.5 in s2.13
  let full = 0x2000_i16; // 1.0 in s2.13
  bytes.extend_from_slice(&half.to_le_bytes());
  bytes.extend_from_slice(&half.to_le_bytes());
  bytes.extend_from_slice(&half.to_le_bytes());
  bytes.extend_from_slice(&full.to_le_bytes());

  let mut src: &[u8] = &bytes;
  let OpenOutcome::Bitmap(mut reader) = BmpReader::open(&mut src).unwrap() else { panic!("expected Bitmap") };
  reader.set_result_format(ResultFormat::Float).unwrap();
  reader.set_conv64(Conv64Mode::Srgb).unwrap();
  let mut srgb_out = [0_u8; 4 * 4];
  reader.load_image(&mut srgb_out).unwrap();
  let srgb_r = f32::from_le_bytes(srgb_out[8..12].try_into().unwrap());

  let mut bytes2 = Vec::new();
  write_header(&mut bytes2, b"BM", 0, offbits as u32, 1, 1, 64, 0);
  bytes2.extend_from_slice(&half.to_le_bytes());
  bytes2.extend_from_slice(&half.to_le_bytes());
  bytes2.extend_from_slice(&half.to_le_bytes());
  bytes2.extend_from_slice(&full.to_le_bytes());
  let mut src2: &[u8] = &bytes2;
  let OpenOutcome::Bitmap(mut reader2) = BmpReader::open(&mut src2).unwrap() else { panic!("expected Bitmap") };
  reader2.set_result_format(ResultFormat::S2_13).unwrap();
  reader2.set_conv64(Conv64Mode::None).unwrap();
  let mut none_out = [0_u8; 4 * 2];
  reader2.load_image(&mut none_out).unwrap();
  let none_r = i16::from_le_bytes(none_out[4..6].try_into().unwrap());

  assert_eq!(none_r, half);
  // The sRGB transfer curve maps 0.5 linear to something other than a flat
  // 0.5, and away from the raw s2.13 bit pattern entirely.
  assert!(srgb_r > 0.0 && srgb_r < 1.0);
  assert_ne!(srgb_r, 0.5);
}
