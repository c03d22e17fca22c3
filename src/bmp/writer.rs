//! Public write-side handle: the write state machine, the §4.4
//! output-format selector, and encode orchestration — the write-side mirror
//! of [`crate::bmp::reader`] (§4.4, §4.5).

use crate::{
  bmp::{
    classify::BmpCompression,
    colormask::{BmpColorMask, ChannelMask},
    encode::{encode_64bpp_row, encode_indexed_row, encode_packed_rgb_row, EncodeCursor, InputSpec},
    file_header::BmpFileHeader,
    info_header::{BmpInfoHeader, InfoVersion},
    numeric::ResultFormat,
    palette::BmpPalette,
  },
  ascii_array::AsciiArray,
  error::{BmpError, BmpResultCode},
  sink::ByteSink,
  util::write_u32_le,
};

#[cfg(feature = "alloc")]
use crate::bmp::encode::{encode_huffman_row, encode_rle_row, finish_huffman_stream};
#[cfg(feature = "alloc")]
use crate::log::Log;

/// The write state machine (§3 "Write state").
///
/// Every setting that shapes the written header is rejected once state is
/// `SAVE_STARTED` or later (§5): the header has already gone to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
  Init,
  DimensionsSet,
  SaveStarted,
  SaveDone,
  Fatal,
}

/// How the writer's output-format selector treats run-length compression for
/// an indexed (palette) image (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum RleRequest {
  /// Plain `BI_RGB`, no compression.
  #[default]
  None,
  /// Pick RLE4 or RLE8 from the palette size (or OS/2 Huffman for a 2-colour
  /// palette, if [`BmpWriter::set_allow_huffman`] is on).
  Auto,
  /// Force RLE8 regardless of palette size.
  Rle8,
}

/// One resolved choice out of §4.4's output-format selector.
#[derive(Debug, Clone, Copy)]
struct FormatPlan {
  version: InfoVersion,
  bitcount: u16,
  compression: BmpCompression,
  mask: BmpColorMask,
}

/// A [`ByteSink`] wrapper that keeps a running total of bytes written, since
/// the sink itself is never trusted for its own position (`sink` module
/// doc). Used for the offbits/file-size/sizeimage bookkeeping the output
/// selector and the §4.4 size fix-up both need.
struct CountingSink<'a> {
  inner: &'a mut dyn ByteSink,
  count: u64,
}
impl<'a> ByteSink for CountingSink<'a> {
  #[inline]
  fn write_all(&mut self, buf: &[u8]) -> Result<(), BmpError> {
    self.inner.write_all(buf)?;
    self.count += buf.len() as u64;
    Ok(())
  }

  #[inline]
  fn can_seek(&self) -> bool {
    self.inner.can_seek()
  }

  #[inline]
  fn seek_from_start(&mut self, pos: u64) -> Result<(), BmpError> {
    self.inner.seek_from_start(pos)
  }
}

/// Minimal bits needed to fit `len` palette entries into `1|2|4|8` bitcount,
/// promoting a 2-bit fit to 4 unless the caller explicitly allows 2-bit
/// output (§4.4).
fn bitcount_for_palette_len(len: usize, allow_2bit: bool) -> u16 {
  let bits = if len <= 2 {
    1
  } else if len <= 4 {
    2
  } else if len <= 16 {
    4
  } else {
    8
  };
  if bits == 2 && !allow_2bit {
    4
  } else {
    bits
  }
}

/// A bound, stateful handle over a writable BMP bitmap (§3 "Handle", §4.5).
pub struct BmpWriter<'a> {
  dst: CountingSink<'a>,
  state: WriteState,
  #[cfg(feature = "alloc")]
  log: Log,
  huffman_zero_is_white: bool,

  width: u32,
  height: u32,
  top_down: bool,
  palette: Option<BmpPalette>,
  rle_request: RleRequest,
  allow_2bit: bool,
  allow_huffman: bool,
  allow_rle24: bool,
  requested_mask: Option<BmpColorMask>,
  set_64bit: bool,

  input_format: ResultFormat,
  input_int_width: u32,
  source_channel_count: u8,
  source_indexed: bool,

  plan: Option<FormatPlan>,
  bytes_before_pixels: u64,
  cursor: EncodeCursor,
}

impl<'a> BmpWriter<'a> {
  /// Binds a writer to a sink. No bytes are written until the first
  /// `save_image`/`save_line` call.
  #[must_use]
  pub fn new(dst: &'a mut dyn ByteSink) -> Self {
    Self {
      dst: CountingSink { inner: dst, count: 0 },
      state: WriteState::Init,
      #[cfg(feature = "alloc")]
      log: Log::new(),
      huffman_zero_is_white: true,
      width: 0,
      height: 0,
      top_down: false,
      palette: None,
      rle_request: RleRequest::default(),
      allow_2bit: false,
      allow_huffman: false,
      allow_rle24: false,
      requested_mask: None,
      set_64bit: false,
      input_format: ResultFormat::default(),
      input_int_width: 8,
      source_channel_count: 3,
      source_indexed: false,
      plan: None,
      bytes_before_pixels: 0,
      cursor: EncodeCursor::default(),
    }
  }

  #[inline]
  #[must_use]
  pub fn state(&self) -> WriteState {
    self.state
  }

  /// The log accumulated since the last `save_image`/`save_line` call (§7).
  #[cfg(feature = "alloc")]
  #[inline]
  #[must_use]
  pub fn log(&self) -> &str {
    self.log.as_str()
  }

  fn reject_after_save_started(&self) -> Result<(), BmpError> {
    if self.state as u8 >= WriteState::SaveStarted as u8 {
      Err(BmpError::WrongState)
    } else {
      Ok(())
    }
  }

  /// Sets the image dimensions. Must be called before any other setting or
  /// `save_image`/`save_line`.
  pub fn set_dimensions(&mut self, width: u32, height: u32) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.width = width;
    self.height = height;
    if self.state == WriteState::Init {
      self.state = WriteState::DimensionsSet;
    }
    Ok(())
  }

  /// Whether rows are written top-down (a negative `height` on disk). Bottom
  /// up (the BMP default) unless set.
  pub fn set_top_down(&mut self, top_down: bool) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.top_down = top_down;
    Ok(())
  }

  /// Supplies a colour table, selecting indexed output (§4.4).
  pub fn set_palette(&mut self, palette: BmpPalette) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.palette = Some(palette);
    Ok(())
  }

  /// Chooses how indexed output is (or isn't) run-length compressed (§4.4).
  pub fn set_rle(&mut self, request: RleRequest) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.rle_request = request;
    Ok(())
  }

  /// Allows a 2-colour-or-fewer palette to collapse to 2-bit indices instead
  /// of being promoted to 4-bit (§4.4).
  pub fn set_allow_2bit(&mut self, allow: bool) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.allow_2bit = allow;
    Ok(())
  }

  /// Allows [`RleRequest::Auto`] to pick OS/2 Huffman (CCITT T.4 1D) for a
  /// 2-colour palette instead of RLE4.
  pub fn set_allow_huffman(&mut self, allow: bool) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.allow_huffman = allow;
    Ok(())
  }

  /// Allows an unpaletted, 3-channel 8-bit source to be written as OS/2
  /// RLE24 instead of plain `BI_RGB` (§4.4).
  pub fn set_allow_rle24(&mut self, allow: bool) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.allow_rle24 = allow;
    Ok(())
  }

  /// Requests explicit per-channel bit widths, nudging the selector toward
  /// `BITFIELDS`/`ALPHABITFIELDS` when the widths are unequal, include
  /// alpha, or give red a width outside `{0, 5, 8}` (§4.4). `alpha = 0`
  /// means no alpha channel.
  pub fn set_channel_widths(&mut self, red: u32, green: u32, blue: u32, alpha: u32) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    let blue_m = channel_mask_for_width(blue, 0);
    let green_m = channel_mask_for_width(green, blue);
    let red_m = channel_mask_for_width(red, blue + green);
    let alpha_m = channel_mask_for_width(alpha, blue + green + red);
    self.requested_mask = Some(BmpColorMask { red: red_m, green: green_m, blue: blue_m, alpha: alpha_m });
    Ok(())
  }

  /// Forces the fixed 64-bpp s2.13 BGRA layout regardless of every other
  /// format setting (§4.4).
  pub fn set_64bit(&mut self, enabled: bool) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.set_64bit = enabled;
    Ok(())
  }

  /// The numeric shape the caller's pixel buffer is read out of (the write
  /// side's mirror of [`crate::bmp::reader::BmpReader::set_result_format`]).
  pub fn set_input_format(&mut self, format: ResultFormat) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.input_format = format;
    Ok(())
  }

  /// The bit width of [`ResultFormat::Int`] source channels (8, 16, or 32).
  pub fn set_input_int_width(&mut self, width: u32) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.input_int_width = width;
    Ok(())
  }

  /// 3 (RGB) or 4 (RGBA) channels per source pixel.
  pub fn set_source_channel_count(&mut self, count: u8) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.source_channel_count = count;
    Ok(())
  }

  /// When set, the source buffer already holds one raw palette-index byte
  /// per pixel (requires a palette).
  pub fn set_source_indexed(&mut self, indexed: bool) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.source_indexed = indexed;
    Ok(())
  }

  /// Sets the codec-side Huffman polarity flag: whether run-length index 0
  /// encodes as white (the default) or black.
  pub fn set_huffman_zero_is_white(&mut self, zero_is_white: bool) -> Result<(), BmpError> {
    self.reject_after_save_started()?;
    self.huffman_zero_is_white = zero_is_white;
    Ok(())
  }

  fn input_spec(&self) -> InputSpec {
    InputSpec {
      format: self.input_format,
      int_width: self.input_int_width,
      channel_count: self.source_channel_count,
      source_indexed: self.source_indexed,
    }
  }

  /// Runs §4.4's output-format selector precedence: `set_64bit` overrides
  /// everything; else a palette means indexed output, shaped by
  /// `rle_request`; else an unpaletted 3x8-bit source with `allow_rle24` and
  /// `RleRequest::Auto` becomes OS/2 RLE24; else explicit channel widths
  /// that need `BITFIELDS`/`ALPHABITFIELDS` get a V4 header; else plain
  /// `BI_RGB` at 16 or 24 bits per pixel.
  fn select_format(&self) -> Result<FormatPlan, BmpError> {
    if self.set_64bit {
      let mask = BmpColorMask::implicit_for_bitcount(64)?;
      return Ok(FormatPlan { version: InfoVersion::V3, bitcount: 64, compression: BmpCompression::Rgb, mask });
    }

    if let Some(palette) = &self.palette {
      let (bitcount, compression) = match self.rle_request {
        RleRequest::Rle8 => (8, BmpCompression::Rle8),
        RleRequest::Auto => {
          if palette.len() == 2 && self.allow_huffman {
            (1, BmpCompression::Os2Huffman)
          } else if palette.len() <= 16 {
            (4, BmpCompression::Rle4)
          } else {
            (8, BmpCompression::Rle8)
          }
        }
        RleRequest::None => (bitcount_for_palette_len(palette.len(), self.allow_2bit), BmpCompression::Rgb),
      };
      let version = match compression {
        BmpCompression::Os2Huffman | BmpCompression::Os2Rle24 => InfoVersion::Os22,
        _ => InfoVersion::V3,
      };
      return Ok(FormatPlan { version, bitcount, compression, mask: BmpColorMask::default() });
    }

    if self.allow_rle24 && !self.source_indexed && self.source_channel_count == 3 && self.rle_request == RleRequest::Auto
    {
      return Ok(FormatPlan {
        version: InfoVersion::Os22,
        bitcount: 24,
        compression: BmpCompression::Os2Rle24,
        mask: BmpColorMask::default(),
      });
    }

    if let Some(requested) = self.requested_mask {
      let unequal = requested.red.width != requested.green.width || requested.green.width != requested.blue.width;
      let has_alpha = requested.alpha.width > 0;
      let red_unusual = !matches!(requested.red.width, 0 | 5 | 8);
      let total = requested.red.width + requested.green.width + requested.blue.width + requested.alpha.width;
      if (unequal || has_alpha || red_unusual) && total <= 32 {
        let bitcount = if total <= 16 { 16 } else { 32 };
        requested.validate(bitcount)?;
        let compression = if has_alpha { BmpCompression::AlphaBitfields } else { BmpCompression::Bitfields };
        return Ok(FormatPlan { version: InfoVersion::V4, bitcount, compression, mask: requested });
      }
    }

    let bitcount = match &self.requested_mask {
      Some(m) if m.red.width + m.green.width + m.blue.width <= 16 => 16,
      _ => 24,
    };
    let mask = BmpColorMask::implicit_for_bitcount(bitcount)?;
    Ok(FormatPlan { version: InfoVersion::V3, bitcount, compression: BmpCompression::Rgb, mask })
  }

  /// Writes the file header, info header, and palette (if any), and moves
  /// the state machine to `SAVE_STARTED`.
  fn begin_save(&mut self) -> Result<(), BmpError> {
    let plan = self.select_format()?;

    let mut info = BmpInfoHeader::blank(plan.version);
    info.width = self.width as i32;
    info.height = if self.top_down { -(self.height as i32) } else { self.height as i32 };
    info.bitcount = plan.bitcount;
    info.compression_raw = plan.compression.to_wire_code();
    if matches!(plan.compression, BmpCompression::Bitfields | BmpCompression::AlphaBitfields) {
      info.red_mask = plan.mask.red.mask;
      info.green_mask = plan.mask.green.mask;
      info.blue_mask = plan.mask.blue.mask;
      info.alpha_mask = plan.mask.alpha.mask;
    }
    let palette_len = self.palette.as_ref().map_or(0, BmpPalette::len);
    info.clrused = palette_len as u32;

    let palette_bytes = palette_len as u64 * BmpPalette::entry_size(plan.version);
    let offbits = 14_u64 + u64::from(plan.version.declared_size()) + palette_bytes;

    let file_header =
      BmpFileHeader { tag: AsciiArray(*b"BM"), file_size: 0, reserved1: 0, reserved2: 0, offbits: offbits as u32 };
    file_header.write_to(&mut self.dst)?;
    info.write_to(&mut self.dst)?;
    if let Some(p) = &self.palette {
      p.write_to(&mut self.dst)?;
    }

    self.bytes_before_pixels = offbits;
    self.cursor = EncodeCursor::default();
    self.plan = Some(plan);
    self.state = WriteState::SaveStarted;
    Ok(())
  }

  fn encode_row(&mut self, row_in: &[u8]) -> Result<(), BmpError> {
    let plan = self.plan.ok_or(BmpError::WrongState)?;
    let input = self.input_spec();
    let width = self.width;

    match plan.compression {
      _ if plan.bitcount == 64 => {
        encode_64bpp_row(&mut self.dst, row_in, width, input)?;
      }
      BmpCompression::Bitfields | BmpCompression::AlphaBitfields => {
        encode_packed_rgb_row(&mut self.dst, row_in, width, plan.bitcount, plan.mask, input)?;
      }
      BmpCompression::Rgb if plan.bitcount > 8 => {
        encode_packed_rgb_row(&mut self.dst, row_in, width, plan.bitcount, plan.mask, input)?;
      }
      BmpCompression::Rgb => {
        encode_indexed_row(&mut self.dst, row_in, width, plan.bitcount, input)?;
      }
      #[cfg(feature = "alloc")]
      BmpCompression::Rle4 => {
        encode_rle_row(&mut self.dst, row_in, width, 4, self.palette.as_ref(), input)?;
      }
      #[cfg(feature = "alloc")]
      BmpCompression::Rle8 => {
        encode_rle_row(&mut self.dst, row_in, width, 8, self.palette.as_ref(), input)?;
      }
      #[cfg(feature = "alloc")]
      BmpCompression::Os2Rle24 => {
        encode_rle_row(&mut self.dst, row_in, width, 24, None, input)?;
      }
      #[cfg(feature = "alloc")]
      BmpCompression::Os2Huffman => {
        encode_huffman_row(&mut self.dst, row_in, width, &mut self.cursor, self.huffman_zero_is_white)?;
      }
      _ => return Err(BmpError::UnsupportedBitcountCompression),
    }
    Ok(())
  }

  /// Finishes the Huffman stream if one is in progress, then runs the §4.4
  /// size fix-up: seeks back to offset 2 (`file_size`) and 34 (`sizeimage`)
  /// and writes the now-known totals. An unseekable sink, or a total past
  /// `u32::MAX`, just leaves those fields at zero — not an error.
  fn finish_save(&mut self) -> Result<BmpResultCode, BmpError> {
    #[cfg(feature = "alloc")]
    match self.plan.map(|p| p.compression) {
      Some(BmpCompression::Os2Huffman) => finish_huffman_stream(&mut self.dst, &mut self.cursor)?,
      Some(BmpCompression::Rle4 | BmpCompression::Rle8 | BmpCompression::Os2Rle24) => {
        self.dst.write_all(&[0, 1])?;
      }
      _ => {}
    }

    let total = self.dst.count;
    if self.dst.can_seek() {
      if let Ok(total_u32) = u32::try_from(total) {
        self.dst.seek_from_start(2)?;
        write_u32_le(&mut self.dst, total_u32)?;
      }
      let sizeimage = total.saturating_sub(self.bytes_before_pixels);
      if let Ok(sizeimage_u32) = u32::try_from(sizeimage) {
        self.dst.seek_from_start(34)?;
        write_u32_le(&mut self.dst, sizeimage_u32)?;
      }
    }

    self.state = WriteState::SaveDone;
    Ok(BmpResultCode::Ok)
  }

  /// Encodes the whole image from `pixels`, given top-down regardless of
  /// how the file ends up stored on disk (§4.5, mirroring
  /// [`crate::bmp::reader::BmpReader::load_image`]).
  pub fn save_image(&mut self, pixels: &[u8]) -> Result<BmpResultCode, BmpError> {
    if self.state != WriteState::DimensionsSet {
      return Err(BmpError::WrongState);
    }
    self.begin_save()?;

    let row_bytes = self.input_spec().pixel_stride() * self.width as usize;
    let needed = row_bytes.checked_mul(self.height as usize).ok_or(BmpError::DimensionsOverflow)?;
    if pixels.len() < needed {
      self.state = WriteState::Fatal;
      return Err(BmpError::MissingRequiredBuffer);
    }

    let (top_down, height) = (self.top_down, self.height);
    for disk_row in 0..height {
      let src_row = if top_down { disk_row } else { height - 1 - disk_row };
      let start = src_row as usize * row_bytes;
      if let Err(e) = self.encode_row(&pixels[start..start + row_bytes]) {
        self.state = WriteState::Fatal;
        return Err(e);
      }
    }

    self.finish_save()
  }

  /// Encodes exactly one row, in file order (the order it will appear on
  /// disk), resuming from wherever the previous call left off (§9
  /// "coroutine-like line-by-line reading", mirrored for writing).
  pub fn save_line(&mut self, row_in: &[u8]) -> Result<BmpResultCode, BmpError> {
    if self.state == WriteState::DimensionsSet {
      self.begin_save()?;
    }
    if self.state != WriteState::SaveStarted {
      return Err(BmpError::WrongState);
    }

    let needed = self.input_spec().pixel_stride() * self.width as usize;
    if row_in.len() < needed {
      self.state = WriteState::Fatal;
      return Err(BmpError::MissingRequiredBuffer);
    }
    if let Err(e) = self.encode_row(&row_in[..needed]) {
      self.state = WriteState::Fatal;
      return Err(e);
    }

    self.cursor.file_y += 1;
    if self.cursor.file_y >= self.height {
      self.finish_save()
    } else {
      Ok(BmpResultCode::Ok)
    }
  }
}

/// Builds one packed channel mask at `shift` bits above the channels already
/// placed, matching the low-to-high B-G-R-A packing [`BmpColorMask::implicit_for_bitcount`]
/// uses (§4.2). A zero width yields an empty (absent) channel.
fn channel_mask_for_width(width: u32, shift: u32) -> ChannelMask {
  if width == 0 {
    ChannelMask::default()
  } else {
    ChannelMask { mask: ((1_u32 << width) - 1) << shift, width, shift }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{bmp::palette::PaletteEntry, sink::VecSink};

  fn two_color_palette() -> BmpPalette {
    BmpPalette::from_entries(alloc::vec![PaletteEntry { r: 0, g: 0, b: 0 }, PaletteEntry { r: 255, g: 255, b: 255 }])
  }

  #[test]
  fn plain_24bpp_round_trip_via_reader() {
    let mut sink = VecSink::new();
    let mut writer = BmpWriter::new(&mut sink);
    writer.set_dimensions(2, 2).unwrap();
    // Two rows of BGR-order-agnostic RGB8 pixels (writer reads R,G,B in
    // that channel order regardless of on-disk byte order).
    let pixels = [
      255_u8, 0, 0, // (0,0) red, row 0 (top)
      0, 255, 0, // (1,0) green
      0, 0, 255, // (0,1) blue, row 1 (bottom)
      255, 255, 255, // (1,1) white
    ];
    let code = writer.save_image(&pixels).unwrap();
    assert_eq!(code, BmpResultCode::Ok);
    let bytes = sink.into_inner();
    assert_eq!(&bytes[0..2], b"BM");

    use crate::bmp::reader::{BmpReader, OpenOutcome};
    let mut src: &[u8] = &bytes;
    let OpenOutcome::Bitmap(mut reader) = BmpReader::open(&mut src).unwrap() else { panic!("expected Bitmap") };
    assert_eq!(reader.width().unwrap(), 2);
    assert_eq!(reader.height().unwrap(), 2);
    let mut out = [0_u8; 2 * 2 * 3];
    reader.load_image(&mut out).unwrap();
    assert_eq!(&out[0..3], &[255, 0, 0]);
    assert_eq!(&out[3..6], &[0, 255, 0]);
  }

  #[test]
  fn palette_selects_indexed_rgb_with_promoted_bitcount() {
    let mut sink = VecSink::new();
    let mut writer = BmpWriter::new(&mut sink);
    writer.set_dimensions(2, 1).unwrap();
    writer.set_palette(two_color_palette()).unwrap();
    writer.set_source_indexed(true).unwrap();
    let pixels = [0_u8, 1];
    writer.save_image(&pixels).unwrap();
    let bytes = sink.into_inner();
    // offbits (bytes 10..14) should land right after a 40-byte V3 header
    // plus an 8-byte (2-entry) palette.
    let offbits = u32::from_le_bytes(bytes[10..14].try_into().unwrap());
    assert_eq!(offbits, 14 + 40 + 8);
    let bitcount = u16::from_le_bytes(bytes[28..30].try_into().unwrap());
    assert_eq!(bitcount, 4);
  }

  #[test]
  fn rle_request_auto_picks_rle4_for_small_palette() {
    let mut sink = VecSink::new();
    let mut writer = BmpWriter::new(&mut sink);
    writer.set_dimensions(4, 1).unwrap();
    writer.set_palette(two_color_palette()).unwrap();
    writer.set_source_indexed(true).unwrap();
    writer.set_rle(RleRequest::Auto).unwrap();
    let pixels = [0_u8, 0, 1, 1];
    let code = writer.save_image(&pixels).unwrap();
    assert_eq!(code, BmpResultCode::Ok);
    let bytes = sink.into_inner();
    let compression = u32::from_le_bytes(bytes[30..34].try_into().unwrap());
    assert_eq!(compression, 2); // RLE4
    let file_size = u32::from_le_bytes(bytes[2..6].try_into().unwrap());
    assert_eq!(file_size as usize, bytes.len());
    // Per-row EOL (0,0) followed by the end-of-bitmap marker (0,1).
    assert_eq!(&bytes[bytes.len() - 2..], &[0, 1]);
  }

  #[test]
  fn rle_round_trips_through_reader_including_end_of_bitmap() {
    let mut sink = VecSink::new();
    let mut writer = BmpWriter::new(&mut sink);
    writer.set_dimensions(4, 2).unwrap();
    writer.set_palette(two_color_palette()).unwrap();
    writer.set_source_indexed(true).unwrap();
    writer.set_rle(RleRequest::Rle8).unwrap();
    let pixels = [0_u8, 0, 1, 1, 1, 0, 0, 1];
    let code = writer.save_image(&pixels).unwrap();
    assert_eq!(code, BmpResultCode::Ok);
    let bytes = sink.into_inner();
    assert_eq!(&bytes[bytes.len() - 2..], &[0, 1]);

    use crate::bmp::reader::{BmpReader, OpenOutcome};
    let mut src: &[u8] = &bytes;
    let OpenOutcome::Bitmap(mut reader) = BmpReader::open(&mut src).unwrap() else { panic!("expected Bitmap") };
    let mut out = [0_u8; 4 * 2 * 3];
    let code = reader.load_image(&mut out).unwrap();
    assert_eq!(code, BmpResultCode::Ok);
    assert_eq!(&out[0..3], &[0, 0, 0]);
    assert_eq!(&out[3..6], &[0, 0, 0]);
    assert_eq!(&out[6..9], &[255, 255, 255]);
  }

  #[test]
  fn save_line_matches_save_image_header_for_same_settings() {
    let mut sink_a = VecSink::new();
    let mut sink_b = VecSink::new();
    let pixels = [10_u8, 20, 30, 40, 50, 60];

    let mut a = BmpWriter::new(&mut sink_a);
    a.set_dimensions(2, 1).unwrap();
    a.save_image(&pixels).unwrap();

    let mut b = BmpWriter::new(&mut sink_b);
    b.set_dimensions(2, 1).unwrap();
    b.save_line(&pixels).unwrap();

    assert_eq!(sink_a.into_inner(), sink_b.into_inner());
  }

  #[test]
  fn settings_rejected_once_save_started() {
    let mut sink = VecSink::new();
    let mut writer = BmpWriter::new(&mut sink);
    writer.set_dimensions(1, 1).unwrap();
    writer.save_image(&[0_u8, 0, 0]).unwrap();
    assert_eq!(writer.set_top_down(true), Err(BmpError::WrongState));
  }
}
