//! V4/V5 colour-space data: the `cstype` tag, CIE primaries, and per-channel
//! gamma (§3 "CIE primaries and gamma (V4+), colour-space tag and
//! ICC-profile pointer (V5)").

use crate::util::u32_le;

const LCS_CALIBRATED_RGB: u32 = 0x0000_0000;
const LCS_SRGB: u32 = 0x7352_4742; // "sRGB", little-endian FourCC
const LCS_WINDOWS_COLOR_SPACE: u32 = 0x5769_6E20; // "Win "
const PROFILE_LINKED: u32 = 0x4C49_4E4B; // "LINK"
/// The `cstype` value flagging an ICC profile embedded in the file itself
/// (§6 "Wire format — ICC profile").
pub(crate) const PROFILE_EMBEDDED: u32 = 0x4D42_4544; // "MBED"

/// Colorspace data for the BMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum BmpColorspace {
  /// The usual sRGB colorspace.
  Srgb,

  /// The windows default color space (On windows 10, this is also sRGB).
  WindowsDefault,

  /// A profile elsewhere is linked to (by name).
  LinkedProfile,

  /// A profile is embedded into the end of the bitmap itself.
  EmbeddedProfile,

  /// The colorspace is calibrated according to the info given.
  Calibrated { endpoints: CieXyzTriple, gamma_red: u32, gamma_green: u32, gamma_blue: u32 },

  /// The colorspace tag was unknown.
  ///
  /// In this case, the endpoints and gamma values are still kept for you, but
  /// the data might be nonsensical values (including possibly just zeroed).
  Unknown { raw_tag: u32, endpoints: CieXyzTriple, gamma_red: u32, gamma_green: u32, gamma_blue: u32 },
}
impl From<[u8; 52]> for BmpColorspace {
  #[inline]
  fn from(a: [u8; 52]) -> Self {
    let endpoints = || CieXyzTriple {
      red: CieXyz { x: u32_le(&a[4..8]), y: u32_le(&a[8..12]), z: u32_le(&a[12..16]) },
      green: CieXyz { x: u32_le(&a[16..20]), y: u32_le(&a[20..24]), z: u32_le(&a[24..28]) },
      blue: CieXyz { x: u32_le(&a[28..32]), y: u32_le(&a[32..36]), z: u32_le(&a[36..40]) },
    };
    let gamma_red = u32_le(&a[40..44]);
    let gamma_green = u32_le(&a[44..48]);
    let gamma_blue = u32_le(&a[48..52]);
    match u32_le(&a[0..4]) {
      LCS_CALIBRATED_RGB => BmpColorspace::Calibrated { endpoints: endpoints(), gamma_red, gamma_green, gamma_blue },
      LCS_SRGB => BmpColorspace::Srgb,
      LCS_WINDOWS_COLOR_SPACE => BmpColorspace::WindowsDefault,
      PROFILE_LINKED => BmpColorspace::LinkedProfile,
      PROFILE_EMBEDDED => BmpColorspace::EmbeddedProfile,
      raw_tag => BmpColorspace::Unknown { raw_tag, endpoints: endpoints(), gamma_red, gamma_green, gamma_blue },
    }
  }
}
impl From<BmpColorspace> for [u8; 52] {
  #[inline]
  fn from(c: BmpColorspace) -> Self {
    let mut a = [0_u8; 52];
    let mut fill_endpoints = |endpoints: CieXyzTriple, gamma_red: u32, gamma_green: u32, gamma_blue: u32| {
      a[4..8].copy_from_slice(&endpoints.red.x.to_le_bytes());
      a[8..12].copy_from_slice(&endpoints.red.y.to_le_bytes());
      a[12..16].copy_from_slice(&endpoints.red.z.to_le_bytes());
      a[16..20].copy_from_slice(&endpoints.green.x.to_le_bytes());
      a[20..24].copy_from_slice(&endpoints.green.y.to_le_bytes());
      a[24..28].copy_from_slice(&endpoints.green.z.to_le_bytes());
      a[28..32].copy_from_slice(&endpoints.blue.x.to_le_bytes());
      a[32..36].copy_from_slice(&endpoints.blue.y.to_le_bytes());
      a[36..40].copy_from_slice(&endpoints.blue.z.to_le_bytes());
      a[40..44].copy_from_slice(&gamma_red.to_le_bytes());
      a[44..48].copy_from_slice(&gamma_green.to_le_bytes());
      a[48..52].copy_from_slice(&gamma_blue.to_le_bytes());
    };
    match c {
      BmpColorspace::Srgb => a[0..4].copy_from_slice(&LCS_SRGB.to_le_bytes()),
      BmpColorspace::WindowsDefault => a[0..4].copy_from_slice(&LCS_WINDOWS_COLOR_SPACE.to_le_bytes()),
      BmpColorspace::LinkedProfile => a[0..4].copy_from_slice(&PROFILE_LINKED.to_le_bytes()),
      BmpColorspace::EmbeddedProfile => a[0..4].copy_from_slice(&PROFILE_EMBEDDED.to_le_bytes()),
      BmpColorspace::Calibrated { endpoints, gamma_red, gamma_green, gamma_blue } => {
        a[0..4].copy_from_slice(&LCS_CALIBRATED_RGB.to_le_bytes());
        fill_endpoints(endpoints, gamma_red, gamma_green, gamma_blue);
      }
      BmpColorspace::Unknown { raw_tag, endpoints, gamma_red, gamma_green, gamma_blue } => {
        a[0..4].copy_from_slice(&raw_tag.to_le_bytes());
        fill_endpoints(endpoints, gamma_red, gamma_green, gamma_blue);
      }
    }
    a
  }
}

/// CIE 1931 XYZ primaries for red, green, and blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, bytemuck::Zeroable, bytemuck::Pod)]
#[repr(C)]
pub struct CieXyzTriple {
  pub red: CieXyz,
  pub green: CieXyz,
  pub blue: CieXyz,
}

/// A single CIE 1931 XYZ coordinate, each component a [`FixedPoint2Dot30`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, bytemuck::Zeroable, bytemuck::Pod)]
#[repr(C)]
pub struct CieXyz {
  pub x: FixedPoint2Dot30,
  pub y: FixedPoint2Dot30,
  pub z: FixedPoint2Dot30,
}

/// `FXPT2DOT30`: fixed point, 2 integer bits + 30 fractional bits, stored as
/// a raw `u32` (this library does not interpret CIE primaries numerically,
/// per the colour-management non-goal — they are only carried verbatim).
pub type FixedPoint2Dot30 = u32;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn srgb_round_trips() {
    let bytes: [u8; 52] = BmpColorspace::Srgb.into();
    assert_eq!(BmpColorspace::from(bytes), BmpColorspace::Srgb);
  }

  #[test]
  fn calibrated_round_trips() {
    let endpoints = CieXyzTriple {
      red: CieXyz { x: 1, y: 2, z: 3 },
      green: CieXyz { x: 4, y: 5, z: 6 },
      blue: CieXyz { x: 7, y: 8, z: 9 },
    };
    let c = BmpColorspace::Calibrated { endpoints, gamma_red: 10, gamma_green: 11, gamma_blue: 12 };
    let bytes: [u8; 52] = c.into();
    assert_eq!(BmpColorspace::from(bytes), c);
  }
}
