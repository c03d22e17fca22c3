//! The variable-length info header: version classification and the single
//! absolute-offset field layout every version is parsed through (§4.1).

use crate::{
  bmp::colorspace::BmpColorspace,
  error::BmpError,
  sink::ByteSink,
  util::{i32_le, u32_le, write_u32_le},
};

/// The eight historical info-header shapes (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum InfoVersion {
  /// 12-byte OS/2 1.x `BITMAPCOREHEADER`. 16-bit width/height.
  CoreOs21,
  /// 16..=64-byte OS/2 2.x `BITMAPINFOHEADER2`.
  Os22,
  /// 40-byte Windows `BITMAPINFOHEADER`.
  V3,
  /// 52-byte unofficial Adobe extension: adds RGB masks.
  V3Adobe1,
  /// 56-byte unofficial Adobe extension: adds an alpha mask.
  V3Adobe2,
  /// 108-byte `BITMAPV4HEADER`: adds colour-space and gamma.
  V4,
  /// 124-byte `BITMAPV5HEADER`: adds ICC-profile pointer/size and intent.
  V5,
  /// Declared size > 124; only the first 124 bytes (a V5-shaped prefix) are
  /// interpreted, the rest is skipped.
  Future,
}

impl InfoVersion {
  /// Maps a declared info-header `size` field to its version tag, per
  /// §4.1's table. Returns `None` for a size this format never used.
  #[must_use]
  pub(crate) fn from_declared_size(size: u32) -> Option<Self> {
    Some(match size {
      12 => InfoVersion::CoreOs21,
      40 => InfoVersion::V3,
      52 => InfoVersion::V3Adobe1,
      56 => InfoVersion::V3Adobe2,
      108 => InfoVersion::V4,
      124 => InfoVersion::V5,
      16..=64 => InfoVersion::Os22,
      125..=u32::MAX => InfoVersion::Future,
      _ => return None,
    })
  }

  /// How many bytes of this version's body are meaningfully populated
  /// (beyond this, the zero-padded tail of the 124-byte scratch buffer
  /// reads back as zero).
  #[must_use]
  pub(crate) const fn declared_size(self) -> u32 {
    match self {
      InfoVersion::CoreOs21 => 12,
      InfoVersion::Os22 => 64,
      InfoVersion::V3 => 40,
      InfoVersion::V3Adobe1 => 52,
      InfoVersion::V3Adobe2 => 56,
      InfoVersion::V4 => 108,
      InfoVersion::V5 | InfoVersion::Future => 124,
    }
  }

  #[must_use]
  pub(crate) const fn has_explicit_rgb_masks_in_header(self) -> bool {
    matches!(
      self,
      InfoVersion::V3Adobe1 | InfoVersion::V3Adobe2 | InfoVersion::V4 | InfoVersion::V5 | InfoVersion::Future
    )
  }

  #[must_use]
  pub(crate) const fn has_explicit_alpha_mask_in_header(self) -> bool {
    matches!(self, InfoVersion::V3Adobe2 | InfoVersion::V4 | InfoVersion::V5 | InfoVersion::Future)
  }

  #[must_use]
  pub(crate) const fn has_colorspace(self) -> bool {
    matches!(self, InfoVersion::V4 | InfoVersion::V5 | InfoVersion::Future)
  }

  #[must_use]
  pub(crate) const fn has_icc_profile_fields(self) -> bool {
    matches!(self, InfoVersion::V5 | InfoVersion::Future)
  }
}

/// The parsed info header, in the single absolute-offset layout §4.1
/// describes: fields past a version's real length simply read back as zero,
/// since the source buffer was zero-filled out to 124 bytes before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmpInfoHeader {
  pub version: InfoVersion,
  pub width: i32,
  /// As stored on disk: negative means top-down (§3, §GLOSSARY).
  pub height: i32,
  pub planes: u16,
  pub bitcount: u16,
  /// The raw wire compression code, before OS/2 disambiguation remaps it
  /// (§4.1's "rewrite compression code 3→OS2_HUFFMAN and 4→OS2_RLE24").
  pub compression_raw: u32,
  pub sizeimage: u32,
  pub xpels_per_meter: i32,
  pub ypels_per_meter: i32,
  pub clrused: u32,
  pub clrimportant: u32,

  /// Present from [`InfoVersion::V3Adobe1`] onward.
  pub red_mask: u32,
  pub green_mask: u32,
  pub blue_mask: u32,
  /// Present from [`InfoVersion::V3Adobe2`] onward.
  pub alpha_mask: u32,

  /// OS/2 halftoning fields, meaningful only for [`InfoVersion::Os22`].
  pub os2_units: u16,
  pub os2_reserved: u16,
  pub os2_recording: u16,
  pub os2_rendering: u16,
  pub os2_size1: u32,
  pub os2_size2: u32,
  pub os2_color_encoding: u32,
  pub os2_identifier: u32,

  /// Present from [`InfoVersion::V4`] onward.
  pub colorspace: BmpColorspace,

  /// Present from [`InfoVersion::V5`] onward.
  pub intent: u32,
  pub profile_data_offset: u32,
  pub profile_size: u32,
}

impl BmpInfoHeader {
  /// Parses a zero-padded 124-byte scratch buffer (the bytes after the
  /// 4-byte `size` field that began the info header) according to the
  /// absolute-offset layout for `version`.
  #[must_use]
  pub(crate) fn parse(version: InfoVersion, buf: &[u8; 124]) -> Self {
    let (width, height, planes, bitcount) = if matches!(version, InfoVersion::CoreOs21) {
      (
        i32::from(u16::from_le_bytes(buf[0..2].try_into().unwrap())),
        i32::from(u16::from_le_bytes(buf[2..4].try_into().unwrap())),
        u16::from_le_bytes(buf[4..6].try_into().unwrap()),
        u16::from_le_bytes(buf[6..8].try_into().unwrap()),
      )
    } else {
      (
        i32_le(&buf[0..4]),
        i32_le(&buf[4..8]),
        u16::from_le_bytes(buf[8..10].try_into().unwrap()),
        u16::from_le_bytes(buf[10..12].try_into().unwrap()),
      )
    };

    // For CORE_OS21 the remaining fields simply don't exist; reading them
    // out of the (zero-filled) tail yields harmless zeros.
    let compression_raw = u32_le(&buf[12..16]);
    let sizeimage = u32_le(&buf[16..20]);
    let xpels_per_meter = i32_le(&buf[20..24]);
    let ypels_per_meter = i32_le(&buf[24..28]);
    let clrused = u32_le(&buf[28..32]);
    let clrimportant = u32_le(&buf[32..36]);

    let red_mask = u32_le(&buf[36..40]);
    let green_mask = u32_le(&buf[40..44]);
    let blue_mask = u32_le(&buf[44..48]);
    let alpha_mask = u32_le(&buf[48..52]);

    let os2_units = u16::from_le_bytes(buf[36..38].try_into().unwrap());
    let os2_reserved = u16::from_le_bytes(buf[38..40].try_into().unwrap());
    let os2_recording = u16::from_le_bytes(buf[40..42].try_into().unwrap());
    let os2_rendering = u16::from_le_bytes(buf[42..44].try_into().unwrap());
    let os2_size1 = u32_le(&buf[44..48]);
    let os2_size2 = u32_le(&buf[48..52]);
    let os2_color_encoding = u32_le(&buf[52..56]);
    let os2_identifier = u32_le(&buf[56..60]);

    let mut colorspace_bytes = [0_u8; 52];
    colorspace_bytes.copy_from_slice(&buf[52..104]);
    let colorspace = BmpColorspace::from(colorspace_bytes);

    let intent = u32_le(&buf[104..108]);
    let profile_data_offset = u32_le(&buf[108..112]);
    let profile_size = u32_le(&buf[112..116]);

    Self {
      version,
      width,
      height,
      planes,
      bitcount,
      compression_raw,
      sizeimage,
      xpels_per_meter,
      ypels_per_meter,
      clrused,
      clrimportant,
      red_mask: if version.has_explicit_rgb_masks_in_header() { red_mask } else { 0 },
      green_mask: if version.has_explicit_rgb_masks_in_header() { green_mask } else { 0 },
      blue_mask: if version.has_explicit_rgb_masks_in_header() { blue_mask } else { 0 },
      alpha_mask: if version.has_explicit_alpha_mask_in_header() { alpha_mask } else { 0 },
      os2_units: if matches!(version, InfoVersion::Os22) { os2_units } else { 0 },
      os2_reserved: if matches!(version, InfoVersion::Os22) { os2_reserved } else { 0 },
      os2_recording: if matches!(version, InfoVersion::Os22) { os2_recording } else { 0 },
      os2_rendering: if matches!(version, InfoVersion::Os22) { os2_rendering } else { 0 },
      os2_size1: if matches!(version, InfoVersion::Os22) { os2_size1 } else { 0 },
      os2_size2: if matches!(version, InfoVersion::Os22) { os2_size2 } else { 0 },
      os2_color_encoding: if matches!(version, InfoVersion::Os22) { os2_color_encoding } else { 0 },
      os2_identifier: if matches!(version, InfoVersion::Os22) { os2_identifier } else { 0 },
      colorspace,
      intent: if version.has_icc_profile_fields() { intent } else { 0 },
      profile_data_offset: if version.has_icc_profile_fields() { profile_data_offset } else { 0 },
      profile_size: if version.has_icc_profile_fields() { profile_size } else { 0 },
    }
  }

  /// The effective pixel height: always positive (§GLOSSARY "Top-down /
  /// bottom-up").
  #[inline]
  #[must_use]
  pub const fn abs_height(&self) -> u32 {
    self.height.unsigned_abs()
  }

  /// Whether this file stores rows top-down (a negative `height`).
  #[inline]
  #[must_use]
  pub const fn is_top_down(&self) -> bool {
    self.height < 0
  }

  /// A header with every field zeroed except `version`, `planes` (1), and
  /// `colorspace` (sRGB) — a starting point for the writer's output-format
  /// selector to fill in.
  #[must_use]
  pub(crate) fn blank(version: InfoVersion) -> Self {
    Self {
      version,
      width: 0,
      height: 0,
      planes: 1,
      bitcount: 0,
      compression_raw: 0,
      sizeimage: 0,
      xpels_per_meter: 0,
      ypels_per_meter: 0,
      clrused: 0,
      clrimportant: 0,
      red_mask: 0,
      green_mask: 0,
      blue_mask: 0,
      alpha_mask: 0,
      os2_units: 0,
      os2_reserved: 0,
      os2_recording: 0,
      os2_rendering: 0,
      os2_size1: 0,
      os2_size2: 0,
      os2_color_encoding: 0,
      os2_identifier: 0,
      colorspace: BmpColorspace::Srgb,
      intent: 0,
      profile_data_offset: 0,
      profile_size: 0,
    }
  }

  /// Serializes this header back to its wire form, the write-side mirror of
  /// [`Self::parse`] using the same absolute-offset layout.
  pub(crate) fn write_to(&self, dst: &mut dyn ByteSink) -> Result<(), BmpError> {
    let size = self.version.declared_size();
    write_u32_le(dst, size)?;

    let mut buf = [0_u8; 124];
    if matches!(self.version, InfoVersion::CoreOs21) {
      buf[0..2].copy_from_slice(&(self.width as u16).to_le_bytes());
      buf[2..4].copy_from_slice(&(self.height as u16).to_le_bytes());
      buf[4..6].copy_from_slice(&self.planes.to_le_bytes());
      buf[6..8].copy_from_slice(&self.bitcount.to_le_bytes());
    } else {
      buf[0..4].copy_from_slice(&self.width.to_le_bytes());
      buf[4..8].copy_from_slice(&self.height.to_le_bytes());
      buf[8..10].copy_from_slice(&self.planes.to_le_bytes());
      buf[10..12].copy_from_slice(&self.bitcount.to_le_bytes());
      buf[12..16].copy_from_slice(&self.compression_raw.to_le_bytes());
      buf[16..20].copy_from_slice(&self.sizeimage.to_le_bytes());
      buf[20..24].copy_from_slice(&self.xpels_per_meter.to_le_bytes());
      buf[24..28].copy_from_slice(&self.ypels_per_meter.to_le_bytes());
      buf[28..32].copy_from_slice(&self.clrused.to_le_bytes());
      buf[32..36].copy_from_slice(&self.clrimportant.to_le_bytes());
      if self.version.has_explicit_rgb_masks_in_header() {
        buf[36..40].copy_from_slice(&self.red_mask.to_le_bytes());
        buf[40..44].copy_from_slice(&self.green_mask.to_le_bytes());
        buf[44..48].copy_from_slice(&self.blue_mask.to_le_bytes());
      }
      if self.version.has_explicit_alpha_mask_in_header() {
        buf[48..52].copy_from_slice(&self.alpha_mask.to_le_bytes());
      }
      if matches!(self.version, InfoVersion::Os22) {
        buf[36..38].copy_from_slice(&self.os2_units.to_le_bytes());
        buf[38..40].copy_from_slice(&self.os2_reserved.to_le_bytes());
        buf[40..42].copy_from_slice(&self.os2_recording.to_le_bytes());
        buf[42..44].copy_from_slice(&self.os2_rendering.to_le_bytes());
        buf[44..48].copy_from_slice(&self.os2_size1.to_le_bytes());
        buf[48..52].copy_from_slice(&self.os2_size2.to_le_bytes());
        buf[52..56].copy_from_slice(&self.os2_color_encoding.to_le_bytes());
        buf[56..60].copy_from_slice(&self.os2_identifier.to_le_bytes());
      }
      if self.version.has_colorspace() {
        let cs_bytes: [u8; 52] = self.colorspace.into();
        buf[52..104].copy_from_slice(&cs_bytes);
      }
      if self.version.has_icc_profile_fields() {
        buf[104..108].copy_from_slice(&self.intent.to_le_bytes());
        buf[108..112].copy_from_slice(&self.profile_data_offset.to_le_bytes());
        buf[112..116].copy_from_slice(&self.profile_size.to_le_bytes());
      }
    }
    let body_len = (size as usize).saturating_sub(4).min(124);
    dst.write_all(&buf[..body_len])
  }
}

/// Errors from validating [`BmpInfoHeader::planes`]; §4.1's "Reject planes
/// ≠ 1".
pub(crate) fn check_planes(planes: u16) -> Result<(), BmpError> {
  if planes == 1 {
    Ok(())
  } else {
    Err(BmpError::IllegalPlaneCount)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn declared_size_maps_to_version() {
    assert_eq!(InfoVersion::from_declared_size(12), Some(InfoVersion::CoreOs21));
    assert_eq!(InfoVersion::from_declared_size(40), Some(InfoVersion::V3));
    assert_eq!(InfoVersion::from_declared_size(52), Some(InfoVersion::V3Adobe1));
    assert_eq!(InfoVersion::from_declared_size(56), Some(InfoVersion::V3Adobe2));
    assert_eq!(InfoVersion::from_declared_size(64), Some(InfoVersion::Os22));
    assert_eq!(InfoVersion::from_declared_size(108), Some(InfoVersion::V4));
    assert_eq!(InfoVersion::from_declared_size(124), Some(InfoVersion::V5));
    assert_eq!(InfoVersion::from_declared_size(200), Some(InfoVersion::Future));
    assert_eq!(InfoVersion::from_declared_size(13), None);
  }

  #[test]
  fn core_os21_reads_16bit_dims() {
    let mut buf = [0_u8; 124];
    buf[0..2].copy_from_slice(&8_u16.to_le_bytes());
    buf[2..4].copy_from_slice(&4_u16.to_le_bytes());
    buf[4..6].copy_from_slice(&1_u16.to_le_bytes());
    buf[6..8].copy_from_slice(&24_u16.to_le_bytes());
    let ih = BmpInfoHeader::parse(InfoVersion::CoreOs21, &buf);
    assert_eq!(ih.width, 8);
    assert_eq!(ih.height, 4);
    assert_eq!(ih.planes, 1);
    assert_eq!(ih.bitcount, 24);
  }

  #[test]
  fn v3_reads_32bit_dims_and_negative_height() {
    let mut buf = [0_u8; 124];
    buf[0..4].copy_from_slice(&2_i32.to_le_bytes());
    buf[4..8].copy_from_slice(&(-2_i32).to_le_bytes());
    buf[8..10].copy_from_slice(&1_u16.to_le_bytes());
    buf[10..12].copy_from_slice(&24_u16.to_le_bytes());
    let ih = BmpInfoHeader::parse(InfoVersion::V3, &buf);
    assert_eq!(ih.width, 2);
    assert_eq!(ih.height, -2);
    assert!(ih.is_top_down());
    assert_eq!(ih.abs_height(), 2);
  }
}
