use crate::{
  ascii_array::AsciiArray,
  error::BmpError,
  sink::{ByteSink, ByteSource},
  util::u32_le,
};

/// Two-letter file tags recognized at the start of a BMP file (§6).
pub const COMMON_BMP_TAGS: &[AsciiArray<2>] = &[
  AsciiArray(*b"BM"),
  AsciiArray(*b"BA"),
  AsciiArray(*b"CI"),
  AsciiArray(*b"CP"),
  AsciiArray(*b"IC"),
  AsciiArray(*b"PT"),
];

/// The header at the start of every BMP file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BmpFileHeader {
  /// This is expected to be one of the following
  ///
  /// * BM: win3.1 or later
  /// * BA: OS/2 bitmap array
  /// * CI: OS/2 color icon
  /// * CP: OS/2 color pointer
  /// * IC: OS/2 icon
  /// * PT: OS/2 pointer
  pub tag: AsciiArray<2>,

  /// The total size of the file.
  ///
  /// If this doesn't match the actual size of the file, there might be some
  /// sort of data loss or corruption. Not cross-checked against the sink's
  /// actual length on read.
  pub file_size: u32,

  /// Reserved, always written as zero.
  pub reserved1: u16,
  /// Reserved, always written as zero.
  pub reserved2: u16,

  /// The byte index within the file where the bitmap data starts.
  pub offbits: u32,
}
impl From<[u8; 14]> for BmpFileHeader {
  #[inline]
  fn from(a: [u8; 14]) -> Self {
    Self {
      tag: AsciiArray(a[0..2].try_into().unwrap()),
      file_size: u32_le(&a[2..6]),
      reserved1: u16::from_le_bytes(a[6..8].try_into().unwrap()),
      reserved2: u16::from_le_bytes(a[8..10].try_into().unwrap()),
      offbits: u32_le(&a[10..14]),
    }
  }
}
impl From<BmpFileHeader> for [u8; 14] {
  #[inline]
  fn from(h: BmpFileHeader) -> Self {
    let mut a = [0_u8; 14];
    a[0..2].copy_from_slice(&h.tag.0);
    a[2..6].copy_from_slice(&h.file_size.to_le_bytes());
    a[6..8].copy_from_slice(&h.reserved1.to_le_bytes());
    a[8..10].copy_from_slice(&h.reserved2.to_le_bytes());
    a[10..14].copy_from_slice(&h.offbits.to_le_bytes());
    a
  }
}
impl BmpFileHeader {
  /// Reads the 14-byte header straight off a sink.
  pub(crate) fn read_from(src: &mut dyn ByteSource) -> Result<Self, BmpError> {
    let mut a = [0_u8; 14];
    src.read_exact(&mut a)?;
    Ok(Self::from(a))
  }

  /// Writes the 14-byte header straight to a sink.
  pub(crate) fn write_to(self, dst: &mut dyn ByteSink) -> Result<(), BmpError> {
    let a: [u8; 14] = self.into();
    dst.write_all(&a)
  }

  /// Whether `tag` is one of [`COMMON_BMP_TAGS`].
  #[inline]
  #[must_use]
  pub(crate) fn tag_is_recognized(tag: AsciiArray<2>) -> bool {
    COMMON_BMP_TAGS.contains(&tag)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_through_bytes() {
    let h = BmpFileHeader { tag: AsciiArray(*b"BM"), file_size: 70, reserved1: 0, reserved2: 0, offbits: 54 };
    let bytes: [u8; 14] = h.into();
    assert_eq!(BmpFileHeader::from(bytes), h);
  }

  #[test]
  fn recognizes_all_common_tags() {
    for &tag in COMMON_BMP_TAGS {
      assert!(BmpFileHeader::tag_is_recognized(tag));
    }
    assert!(!BmpFileHeader::tag_is_recognized(AsciiArray(*b"XX")));
  }
}
