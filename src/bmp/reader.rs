//! Public read-side handle: the read state machine plus decode orchestration
//! (§4.5, §9's "magic-tagged opaque pointer" design note realized as a
//! lifetime-bound struct instead).

use crate::{
  bmp::{
    classify::{classify, BmpCompression, ClassifiedBmp, ClassifyOutcome},
    colormask::BmpColorMask,
    decode::{decode_row, DecodeCursor, OutputSpec, RowOutcome},
    icc::read_icc_profile,
    info_header::InfoVersion,
    numeric::{int_result_width, Conv64Mode, ResultFormat, UndefinedPixelPolicy},
    palette::BmpPalette,
  },
  error::{BmpError, BmpResultCode},
  log::{ErrorLatches, Log},
  sink::ByteSource,
  util::DEFAULT_INSANITY_LIMIT_BYTES,
};

/// The read state machine (§3 "Read state").
///
/// Transitions are monotonic except that a subset of settings (the result
/// format, the 64-bpp conversion mode, the undefined-pixel policy, and
/// result-indexed mode) regress [`ReadState::DimensionsQueried`] back to
/// [`ReadState::HeaderOk`], since they can change the answer to
/// `channel_count`/`result_bit_depth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
  Init,
  HeaderOk,
  DimensionsQueried,
  LoadStarted,
  LoadDone,
  Fatal,
}

/// What [`BmpReader::open`] found at the front of the sink.
///
/// Only the `Bitmap` variant carries a usable handle: the other four hand
/// control to an external collaborator per §1 — the bitmap-array / icon
/// boundary (§6), or an embedded JPEG/PNG payload the core does not decode.
pub enum OpenOutcome<'a> {
  /// An ordinary bitmap; pixel data can be loaded through the handle.
  Bitmap(BmpReader<'a>),
  /// A `BA` bitmap-array enclosure: a sequence of array-entry headers each
  /// introducing one embedded bitmap. `src` sits just past the common
  /// 14-byte file header; demultiplexing the entries is the caller's job
  /// (§6) — this crate only recognizes the tag and stops here.
  Array,
  /// A `CI`/`CP`/`IC`/`PT` icon or pointer enclosure not already inside an
  /// icon-mask load: a colour bitmap paired with an AND/XOR mask bitmap.
  /// A caller that understands the pairing reads the colour member via
  /// [`BmpReader::open_icon_colour_header`] and the mask member as a second,
  /// ordinary 1-bpp bitmap (§6).
  IconOrPointer,
  /// Compression is `JPEG`; `src` has been advanced to `offbits`.
  EmbeddedJpeg,
  /// Compression is `PNG`; `src` has been advanced to `offbits`.
  EmbeddedPng,
}

/// A bound, stateful handle over a readable BMP bitmap (§3 "Handle", §4.5).
pub struct BmpReader<'a> {
  src: &'a mut dyn ByteSource,
  state: ReadState,
  #[cfg(feature = "alloc")]
  log: Log,
  /// Which Huffman run-length index (0 or 1) means white; caller-settable.
  huffman_zero_is_white: bool,
  classified: ClassifiedBmp,
  mask: BmpColorMask,
  palette: BmpPalette,
  bytes_before_pixels: u64,
  latches: ErrorLatches,
  cursor: DecodeCursor,

  result_format: ResultFormat,
  undefined_policy: UndefinedPixelPolicy,
  result_indexed: bool,
  conv64: Conv64Mode,
  allow_large_images: bool,

  queried_width: bool,
  queried_height: bool,
  queried_channel_count: bool,
  queried_result_bit_depth: bool,
}

impl<'a> BmpReader<'a> {
  /// Opens an ordinary bitmap (`EXPECT_ICON_MASK` clear).
  pub fn open(src: &'a mut dyn ByteSource) -> Result<OpenOutcome<'a>, BmpError> {
    Self::open_inner(src, false)
  }

  /// Opens the colour-header member of an icon/pointer load (`EXPECT_ICON_MASK`
  /// set): a `CI`/`CP`/`IC`/`PT` tag is accepted as a plain colour header
  /// instead of being reported as [`OpenOutcome::IconOrPointer`].
  pub fn open_icon_colour_header(src: &'a mut dyn ByteSource) -> Result<OpenOutcome<'a>, BmpError> {
    Self::open_inner(src, true)
  }

  fn open_inner(src: &'a mut dyn ByteSource, expect_icon_mask: bool) -> Result<OpenOutcome<'a>, BmpError> {
    match classify(src, expect_icon_mask)? {
      ClassifyOutcome::Array => Ok(OpenOutcome::Array),
      ClassifyOutcome::IconOrPointer => Ok(OpenOutcome::IconOrPointer),
      ClassifyOutcome::EmbeddedJpeg(c) => {
        skip_to_offbits(src, c.bytes_read, c.file_header.offbits)?;
        Ok(OpenOutcome::EmbeddedJpeg)
      }
      ClassifyOutcome::EmbeddedPng(c) => {
        skip_to_offbits(src, c.bytes_read, c.file_header.offbits)?;
        Ok(OpenOutcome::EmbeddedPng)
      }
      ClassifyOutcome::Bitmap(c) => {
        let mut bytes_read = c.bytes_read;
        let mask = if c.info_header.bitcount > 8 {
          let m = BmpColorMask::resolve(&c.info_header, c.compression, src)?;
          let explicit_in_header = c.info_header.version.has_explicit_rgb_masks_in_header();
          let is_bitfields = matches!(c.compression, BmpCompression::Bitfields | BmpCompression::AlphaBitfields);
          if is_bitfields && !explicit_in_header {
            bytes_read += if matches!(c.compression, BmpCompression::AlphaBitfields) { 16 } else { 12 };
          }
          m
        } else {
          BmpColorMask::default()
        };

        let mut latches = ErrorLatches::new();
        let is_indexed_kind = matches!(
          c.compression,
          BmpCompression::Rgb | BmpCompression::Rle4 | BmpCompression::Rle8 | BmpCompression::Os2Huffman
        ) && c.info_header.bitcount <= 8;
        let palette = if is_indexed_kind {
          let pal = BmpPalette::read_from(
            src,
            c.info_header.version,
            c.info_header.bitcount,
            c.info_header.clrused,
            c.file_header.offbits,
            bytes_read,
            &mut latches,
          )?;
          bytes_read += pal.len() as u64 * BmpPalette::entry_size(c.info_header.version);
          pal
        } else {
          BmpPalette::default()
        };

        skip_to_offbits(src, bytes_read, c.file_header.offbits)?;

        Ok(OpenOutcome::Bitmap(BmpReader {
          src,
          state: ReadState::HeaderOk,
          #[cfg(feature = "alloc")]
          log: Log::new(),
          huffman_zero_is_white: true,
          classified: c,
          mask,
          palette,
          bytes_before_pixels: u64::from(c.file_header.offbits),
          latches,
          cursor: DecodeCursor::default(),
          result_format: ResultFormat::default(),
          undefined_policy: UndefinedPixelPolicy::default(),
          result_indexed: false,
          conv64: Conv64Mode::default(),
          allow_large_images: false,
          queried_width: false,
          queried_height: false,
          queried_channel_count: false,
          queried_result_bit_depth: false,
        }))
      }
    }
  }

  #[inline]
  #[must_use]
  pub fn state(&self) -> ReadState {
    self.state
  }

  /// The log accumulated since the last `load_image`/`load_line` call (§7).
  #[cfg(feature = "alloc")]
  #[inline]
  #[must_use]
  pub fn log(&self) -> &str {
    self.log.as_str()
  }

  /// Sets the codec-side Huffman polarity flag: whether run-length index 0
  /// decodes as white (the default) or black.
  pub fn set_huffman_zero_is_white(&mut self, zero_is_white: bool) {
    self.huffman_zero_is_white = zero_is_white;
  }

  /// Allows a decoded pixel buffer past the insanity limit (§6
  /// "compile-time defaults", 500 MiB by default). Off by default: a
  /// declared size past the limit fails `load_image`/`load_line` with
  /// [`BmpError::ImageTooLarge`] instead of allocating or writing into it.
  pub fn set_allow_large_images(&mut self, allow: bool) {
    self.allow_large_images = allow;
  }

  fn check_insanity_limit(&self, needed: u64) -> Result<(), BmpError> {
    if !self.allow_large_images && needed > DEFAULT_INSANITY_LIMIT_BYTES {
      Err(BmpError::ImageTooLarge)
    } else {
      Ok(())
    }
  }

  fn mark_queried_and_maybe_advance(&mut self) {
    if self.state == ReadState::HeaderOk
      && self.queried_width
      && self.queried_height
      && self.queried_channel_count
      && self.queried_result_bit_depth
    {
      self.state = ReadState::DimensionsQueried;
    }
  }

  /// Image width in pixels. Requires state ≥ `HEADER_OK`.
  pub fn width(&mut self) -> Result<u32, BmpError> {
    if self.state == ReadState::Init || self.state == ReadState::Fatal {
      return Err(BmpError::WrongState);
    }
    self.queried_width = true;
    let w = self.classified.info_header.width;
    self.mark_queried_and_maybe_advance();
    Ok(w.unsigned_abs())
  }

  /// Image height in pixels (always positive; see [`BmpReader::is_top_down`]
  /// for orientation). Requires state ≥ `HEADER_OK`.
  pub fn height(&mut self) -> Result<u32, BmpError> {
    if self.state == ReadState::Init || self.state == ReadState::Fatal {
      return Err(BmpError::WrongState);
    }
    self.queried_height = true;
    let h = self.classified.info_header.abs_height();
    self.mark_queried_and_maybe_advance();
    Ok(h)
  }

  /// Whether rows are stored top-down (a negative `height` field).
  #[inline]
  #[must_use]
  pub fn is_top_down(&self) -> bool {
    self.classified.info_header.is_top_down()
  }

  /// 3 (RGB) or 4 (RGBA), per the current settings. Requires state ≥
  /// `HEADER_OK`.
  pub fn channel_count(&mut self) -> Result<u8, BmpError> {
    if self.state == ReadState::Init || self.state == ReadState::Fatal {
      return Err(BmpError::WrongState);
    }
    let spec = self.output_spec()?;
    self.queried_channel_count = true;
    self.mark_queried_and_maybe_advance();
    Ok(spec.channel_count)
  }

  /// The per-channel bit depth of the chosen result format (8/16/32 for
  /// `INT`, 32 for `FLOAT`, 16 for `S2_13`). Requires state ≥ `HEADER_OK`.
  pub fn result_bit_depth(&mut self) -> Result<u32, BmpError> {
    if self.state == ReadState::Init || self.state == ReadState::Fatal {
      return Err(BmpError::WrongState);
    }
    let spec = self.output_spec()?;
    self.queried_result_bit_depth = true;
    self.mark_queried_and_maybe_advance();
    Ok(spec.bytes_per_channel() as u32 * 8)
  }

  fn regress_dimensions_queried(&mut self) {
    if self.state == ReadState::DimensionsQueried {
      self.state = ReadState::HeaderOk;
    }
    self.queried_channel_count = false;
    self.queried_result_bit_depth = false;
  }

  /// Sets the numeric result format. Regresses `DIMENSIONS_QUERIED` back to
  /// `HEADER_OK` (§5).
  pub fn set_result_format(&mut self, format: ResultFormat) -> Result<(), BmpError> {
    if self.state as u8 >= ReadState::LoadStarted as u8 {
      return Err(BmpError::WrongState);
    }
    self.result_format = format;
    self.regress_dimensions_queried();
    Ok(())
  }

  /// Sets the 64-bpp conversion mode.
  pub fn set_conv64(&mut self, mode: Conv64Mode) -> Result<(), BmpError> {
    if self.state as u8 >= ReadState::LoadStarted as u8 {
      return Err(BmpError::WrongState);
    }
    self.conv64 = mode;
    self.regress_dimensions_queried();
    Ok(())
  }

  /// Sets the undefined-pixel policy.
  pub fn set_undefined_pixel_policy(&mut self, policy: UndefinedPixelPolicy) -> Result<(), BmpError> {
    if self.state as u8 >= ReadState::LoadStarted as u8 {
      return Err(BmpError::WrongState);
    }
    self.undefined_policy = policy;
    self.regress_dimensions_queried();
    Ok(())
  }

  /// When set, an indexed source writes the raw palette index byte instead of
  /// expanding through the palette. Requires `INT8`.
  pub fn set_result_indexed(&mut self, indexed: bool) -> Result<(), BmpError> {
    if self.state as u8 >= ReadState::LoadStarted as u8 {
      return Err(BmpError::WrongState);
    }
    self.result_indexed = indexed;
    self.regress_dimensions_queried();
    Ok(())
  }

  fn widest_source_bits(&self) -> u32 {
    let bc = self.classified.info_header.bitcount;
    match self.classified.compression {
      BmpCompression::Rle4 | BmpCompression::Rle8 | BmpCompression::Os2Huffman | BmpCompression::Os2Rle24 => 8,
      _ if bc <= 8 => 8,
      _ if bc == 64 => 16,
      _ => [self.mask.red.width, self.mask.green.width, self.mask.blue.width, self.mask.alpha.width]
        .into_iter()
        .max()
        .unwrap_or(8)
        .max(1),
    }
  }

  fn output_spec(&self) -> Result<OutputSpec, BmpError> {
    let bc = self.classified.info_header.bitcount;
    if self.result_indexed && (bc > 8 || self.result_format != ResultFormat::Int) {
      return Err(BmpError::IndexedRequiresInt8);
    }
    if bc == 64 && matches!(self.conv64, Conv64Mode::None) && self.result_format != ResultFormat::S2_13 {
      return Err(BmpError::IncompatibleConversionMode);
    }
    let int_width = int_result_width(self.widest_source_bits());
    let channel_count = if matches!(self.undefined_policy, UndefinedPixelPolicy::ToAlpha) || self.mask.alpha.width > 0
    {
      4
    } else {
      3
    };
    Ok(OutputSpec {
      format: self.result_format,
      int_width,
      channel_count,
      undefined_policy: self.undefined_policy,
      result_indexed: self.result_indexed,
      conv64: self.conv64,
      huffman_zero_is_white: self.huffman_zero_is_white,
    })
  }

  /// Decodes the whole image into `out`, top-down regardless of the file's
  /// on-disk orientation (§4.5, §5 "line reads return rows in top-down order
  /// ... during `load_image`").
  pub fn load_image(&mut self, out: &mut [u8]) -> Result<BmpResultCode, BmpError> {
    if self.state != ReadState::DimensionsQueried {
      return Err(BmpError::WrongState);
    }
    let spec = self.output_spec()?;
    let width = self.classified.info_header.width.unsigned_abs();
    let height = self.classified.info_header.abs_height();
    let row_stride = spec.pixel_stride() * width as usize;
    let needed = row_stride.checked_mul(height as usize).ok_or(BmpError::DimensionsOverflow)?;
    self.check_insanity_limit(needed as u64)?;
    if out.len() < needed {
      return Err(BmpError::MissingRequiredBuffer);
    }

    #[cfg(feature = "alloc")]
    self.log.reset();
    self.latches = ErrorLatches::new();
    self.cursor = DecodeCursor::default();
    self.state = ReadState::LoadStarted;
    let top_down = self.classified.info_header.is_top_down();

    loop {
      if self.cursor.file_y >= height {
        break;
      }
      let target_row = if top_down { self.cursor.file_y } else { height - 1 - self.cursor.file_y };
      let row_start = target_row as usize * row_stride;
      let out_row = &mut out[row_start..row_start + row_stride];
      let outcome = decode_row(
        self.src,
        out_row,
        width,
        self.classified.info_header.bitcount,
        self.classified.compression,
        &self.mask,
        &self.palette,
        spec,
        &mut self.cursor,
        &mut self.latches,
      );
      match outcome {
        RowOutcome::Done => self.cursor.file_y += 1,
        RowOutcome::EndOfRow => {}
        RowOutcome::EndOfBitmap | RowOutcome::Truncated => break,
      }
    }

    self.state = ReadState::LoadDone;
    Ok(self.latches.result_code())
  }

  /// Decodes exactly one row, in file order (bottom-up unless the file is
  /// top-down), resuming from wherever the previous call left off (§9
  /// "coroutine-like line-by-line reading").
  pub fn load_line(&mut self, out_row: &mut [u8]) -> Result<BmpResultCode, BmpError> {
    if self.state == ReadState::DimensionsQueried {
      self.state = ReadState::LoadStarted;
      self.cursor = DecodeCursor::default();
    }
    if self.state != ReadState::LoadStarted {
      return Err(BmpError::WrongState);
    }
    let spec = self.output_spec()?;
    let width = self.classified.info_header.width.unsigned_abs();
    let height = self.classified.info_header.abs_height();
    let needed = spec.pixel_stride() * width as usize;
    let total = (needed as u64).checked_mul(u64::from(height)).ok_or(BmpError::DimensionsOverflow)?;
    self.check_insanity_limit(total)?;
    if out_row.len() < needed {
      return Err(BmpError::MissingRequiredBuffer);
    }

    #[cfg(feature = "alloc")]
    self.log.reset();
    self.latches.reset();

    let outcome = decode_row(
      self.src,
      &mut out_row[..needed],
      width,
      self.classified.info_header.bitcount,
      self.classified.compression,
      &self.mask,
      &self.palette,
      spec,
      &mut self.cursor,
      &mut self.latches,
    );
    match outcome {
      RowOutcome::Done => self.cursor.file_y += 1,
      RowOutcome::EndOfRow => {}
      RowOutcome::EndOfBitmap | RowOutcome::Truncated => self.cursor.file_y = height,
    }
    if self.cursor.file_y >= height {
      self.state = ReadState::LoadDone;
    }
    Ok(self.latches.result_code())
  }

  /// Fetches the embedded ICC profile (V5, `cstype = PROFILE_EMBEDDED`),
  /// copied verbatim (§1's colour-management non-goal: the bytes are never
  /// interpreted). Requires a seekable sink.
  #[cfg(feature = "alloc")]
  pub fn icc_profile(&mut self) -> Result<Option<alloc::vec::Vec<u8>>, BmpError> {
    read_icc_profile(self.src, &self.classified.info_header)
  }

  /// Borrows the resolved palette, if this image carries one.
  #[inline]
  #[must_use]
  pub fn palette(&self) -> &BmpPalette {
    &self.palette
  }

  /// Borrows the resolved colour mask (meaningless for palette-indexed
  /// sources).
  #[inline]
  #[must_use]
  pub fn color_mask(&self) -> &BmpColorMask {
    &self.mask
  }

  /// The resolved info-header version.
  #[inline]
  #[must_use]
  pub fn info_version(&self) -> InfoVersion {
    self.classified.info_header.version
  }

  /// The resolved compression tag, after the OS/2 wire-code disambiguation
  /// (§3, §4.1).
  #[inline]
  #[must_use]
  pub fn compression(&self) -> BmpCompression {
    self.classified.compression
  }

  /// The resolved colour-space tag (V4+; [`crate::bmp::BmpColorspace::Srgb`]
  /// for versions that don't carry one). CIE primaries and gamma are
  /// carried verbatim and never interpreted (§1).
  #[inline]
  #[must_use]
  pub fn colorspace(&self) -> crate::bmp::colorspace::BmpColorspace {
    self.classified.info_header.colorspace
  }
}

/// Advances `src` to `offbits`, reading and discarding the gap (§4.1's "advance
/// the sink to `offbits`" for embedded codecs; also used to skip any padding
/// between the palette and the first pixel byte).
fn skip_to_offbits(src: &mut dyn ByteSource, bytes_read: u64, offbits: u32) -> Result<(), BmpError> {
  let target = u64::from(offbits);
  if target <= bytes_read {
    return Ok(());
  }
  let mut remaining = target - bytes_read;
  if src.can_seek() {
    return src.seek_from_start(target);
  }
  let mut scratch = [0_u8; 64];
  while remaining > 0 {
    let chunk = remaining.min(scratch.len() as u64) as usize;
    src.read_exact(&mut scratch[..chunk])?;
    remaining -= chunk as u64;
  }
  Ok(())
}
