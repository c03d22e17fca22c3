//! Palette reader/writer (§3, §6 "Wire format — palette").

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::{
  bmp::info_header::InfoVersion,
  error::BmpError,
  log::ErrorLatches,
  sink::{ByteSink, ByteSource},
};

/// One 24-bit colour-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Zeroable, bytemuck::Pod)]
#[repr(C)]
pub struct PaletteEntry {
  pub r: u8,
  pub g: u8,
  pub b: u8,
}

/// An ordered sequence of at most 256 colours (§3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BmpPalette {
  entries: Vec<PaletteEntry>,
}

impl BmpPalette {
  #[inline]
  #[must_use]
  pub fn entries(&self) -> &[PaletteEntry] {
    &self.entries
  }

  /// Clamps `index` into range and returns the palette entry, or a black
  /// fallback if the palette is empty (a state the classifier's support
  /// gate should never allow, but a corrupt `clrused` leaves open).
  #[inline]
  #[must_use]
  pub(crate) fn get_clamped(&self, index: u32) -> PaletteEntry {
    if self.entries.is_empty() {
      return PaletteEntry::default();
    }
    let clamped = (index as usize).min(self.entries.len() - 1);
    self.entries[clamped]
  }

  #[inline]
  #[must_use]
  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  /// On-disk entry size: 3 bytes for `CORE_OS21`, 4 bytes (with an unused
  /// pad byte) otherwise.
  #[inline]
  #[must_use]
  pub(crate) const fn entry_size(version: InfoVersion) -> u64 {
    if matches!(version, InfoVersion::CoreOs21) {
      3
    } else {
      4
    }
  }

  /// Reads the colour table, per §6: count is
  /// `min(clrused, 2^bitcount, max fitting before offbits)`, with a
  /// declared `clrused` beyond what fits treated as `INVALID` rather than a
  /// hard error (§9 open question resolution).
  pub(crate) fn read_from(
    src: &mut dyn ByteSource, version: InfoVersion, bitcount: u16, clrused: u32, offbits: u32, bytes_read: u64,
    latches: &mut ErrorLatches,
  ) -> Result<Self, BmpError> {
    let entry_size = Self::entry_size(version);
    if u64::from(offbits) < bytes_read {
      // offbits points inside (or before) the header we already consumed;
      // there is no coherent amount of room to compute a count from.
      return Err(BmpError::PaletteTooLarge);
    }
    let room = u64::from(offbits) - bytes_read;
    let max_by_room = room / entry_size;
    let max_by_bitcount: u64 = if bitcount >= 32 { u32::MAX as u64 } else { 1_u64 << bitcount };
    let declared = if clrused == 0 { max_by_bitcount } else { u64::from(clrused) };
    if declared > max_by_room {
      latches.set_invalid_palette();
    }
    let count = declared.min(max_by_bitcount).min(max_by_room).min(256) as usize;

    let mut entries = Vec::with_capacity(count);
    let mut buf = [0_u8; 4];
    for _ in 0..count {
      src.read_exact(&mut buf[..entry_size as usize])?;
      entries.push(PaletteEntry { b: buf[0], g: buf[1], r: buf[2] });
    }
    Ok(Self { entries })
  }

  /// Writes the colour table in the 4-bytes-per-entry (`B G R 0`) shape
  /// used by every version newer than `CORE_OS21`.
  pub(crate) fn write_to(&self, dst: &mut dyn ByteSink) -> Result<(), BmpError> {
    for e in &self.entries {
      dst.write_all(&[e.b, e.g, e.r, 0])?;
    }
    Ok(())
  }

  /// Builds a palette from caller-supplied entries (for the writer side).
  #[must_use]
  pub fn from_entries(entries: Vec<PaletteEntry>) -> Self {
    Self { entries }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_declared_count_when_it_fits() {
    let bytes = [0_u8, 0, 0, 0, 255, 255, 255, 0];
    let mut src: &[u8] = &bytes;
    let mut latches = ErrorLatches::new();
    let pal = BmpPalette::read_from(&mut src, InfoVersion::V3, 1, 2, 54, 14 + 40, &mut latches).unwrap();
    assert_eq!(pal.len(), 2);
    assert!(!latches.any());
    assert_eq!(pal.get_clamped(0), PaletteEntry { r: 0, g: 0, b: 0 });
    assert_eq!(pal.get_clamped(1), PaletteEntry { r: 255, g: 255, b: 255 });
  }

  #[test]
  fn oversized_clrused_is_clamped_and_latched() {
    let bytes = [10_u8, 20, 30, 0];
    let mut src: &[u8] = &bytes;
    let mut latches = ErrorLatches::new();
    // offbits leaves room for only one entry, but clrused claims 16.
    let pal = BmpPalette::read_from(&mut src, InfoVersion::V3, 4, 16, 14 + 40 + 4, 14 + 40, &mut latches).unwrap();
    assert_eq!(pal.len(), 1);
    assert!(latches.any());
    assert!(!latches.truncated());
  }

  #[test]
  fn clamped_index_past_end_returns_last_entry() {
    let bytes = [0_u8, 0, 0, 0, 255, 255, 255, 0];
    let mut src: &[u8] = &bytes;
    let mut latches = ErrorLatches::new();
    let pal = BmpPalette::read_from(&mut src, InfoVersion::V3, 1, 2, 54, 14 + 40, &mut latches).unwrap();
    assert_eq!(pal.get_clamped(0xFF), PaletteEntry { r: 255, g: 255, b: 255 });
  }
}
