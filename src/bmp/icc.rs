//! ICC profile retrieval (V5, `cstype = PROFILE_EMBEDDED`; §6 "Wire format —
//! ICC profile"). The bytes are copied verbatim and never interpreted — ICC
//! profile interpretation is a non-goal (§1).

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::{bmp::colorspace::BmpColorspace, bmp::info_header::BmpInfoHeader, error::BmpError, sink::ByteSource};

/// Hard cap on how much profile data this crate will copy out, regardless of
/// what `profile_size` declares (§6 "compile-time defaults").
const MAX_ICC_PROFILE_BYTES: usize = 1024 * 1024;

/// Fetches the embedded ICC profile, if `info` declares one. Returns `Ok(None)`
/// when the colour-space tag isn't `EmbeddedProfile` at all (not an error: most
/// bitmaps simply don't carry one).
#[cfg(feature = "alloc")]
pub(crate) fn read_icc_profile(src: &mut dyn ByteSource, info: &BmpInfoHeader) -> Result<Option<Vec<u8>>, BmpError> {
  if !matches!(info.colorspace, BmpColorspace::EmbeddedProfile) {
    return Ok(None);
  }
  if !src.can_seek() {
    return Err(BmpError::SeekUnsupported);
  }
  // Profile offset is relative to the start of the info header, which itself
  // starts 14 bytes into the file (right after the file header).
  let offset = 14_u64 + u64::from(info.profile_data_offset);
  let len = (info.profile_size as usize).min(MAX_ICC_PROFILE_BYTES);
  src.seek_from_start(offset)?;
  let mut buf = alloc::vec![0_u8; len];
  src.read_exact(&mut buf)?;
  Ok(Some(buf))
}
