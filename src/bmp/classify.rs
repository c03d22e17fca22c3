//! Header parser and format classifier: reads the file header and info
//! header off a sink, resolves the OS/2 compression-code collision, and runs
//! the support gate (§4.1).

use crate::{
  bmp::{
    file_header::BmpFileHeader,
    info_header::{check_planes, BmpInfoHeader, InfoVersion},
  },
  error::BmpError,
  sink::ByteSource,
  util::u32_le,
};

/// The resolved compression tag, after OS/2's wire-value collisions with
/// Windows codes 3 and 4 have been disambiguated (§3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BmpCompression {
  Rgb,
  Rle8,
  Rle4,
  Bitfields,
  Jpeg,
  Png,
  AlphaBitfields,
  Cmyk,
  CmykRle8,
  CmykRle4,
  Os2Huffman,
  Os2Rle24,
}

impl BmpCompression {
  /// Maps a raw wire code to a tag, *before* the OS/2 disambiguation pass
  /// (so the codes 3 and 4 still mean Windows `BITFIELDS`/`JPEG` here).
  fn from_windows_wire_code(code: u32) -> Option<Self> {
    Some(match code {
      0 => BmpCompression::Rgb,
      1 => BmpCompression::Rle8,
      2 => BmpCompression::Rle4,
      3 => BmpCompression::Bitfields,
      4 => BmpCompression::Jpeg,
      5 => BmpCompression::Png,
      6 => BmpCompression::AlphaBitfields,
      11 => BmpCompression::Cmyk,
      12 => BmpCompression::CmykRle8,
      13 => BmpCompression::CmykRle4,
      _ => return None,
    })
  }

  /// The inverse of [`Self::from_windows_wire_code`] plus the OS/2 3/4 remap,
  /// for the writer to serialize a chosen tag back into `compression_raw`
  /// (§4.1, §4.4).
  pub(crate) const fn to_wire_code(self) -> u32 {
    match self {
      BmpCompression::Rgb => 0,
      BmpCompression::Rle8 => 1,
      BmpCompression::Rle4 => 2,
      BmpCompression::Bitfields => 3,
      BmpCompression::Jpeg => 4,
      BmpCompression::Png => 5,
      BmpCompression::AlphaBitfields => 6,
      BmpCompression::Cmyk => 11,
      BmpCompression::CmykRle8 => 12,
      BmpCompression::CmykRle4 => 13,
      BmpCompression::Os2Huffman => 3,
      BmpCompression::Os2Rle24 => 4,
    }
  }
}

/// The fully parsed, classified, and support-gated header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedBmp {
  pub file_header: BmpFileHeader,
  pub info_header: BmpInfoHeader,
  pub compression: BmpCompression,
  /// Bytes consumed from the sink so far (file header + info header +, for
  /// older versions, any separately-stored explicit masks).
  pub bytes_read: u64,
}

/// What the classifier found, before the caller decides how to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyOutcome {
  /// An ordinary, directly-decodable bitmap.
  Bitmap(ClassifiedBmp),
  /// `BA`: a bitmap-array enclosure. Control passes to §6's demultiplexing
  /// path; nothing past the file header has been read.
  Array,
  /// One of `CI`/`CP`/`IC`/`PT`: an OS/2 icon or pointer enclosure, and the
  /// caller was not already inside an icon-mask load. The array/icon
  /// boundary (§6) owns the AND/XOR mask dance and the colour-header re-read.
  IconOrPointer,
  /// The compression is `JPEG`; the sink sits at `offbits`.
  EmbeddedJpeg(ClassifiedBmp),
  /// The compression is `PNG`; the sink sits at `offbits`.
  EmbeddedPng(ClassifiedBmp),
}

/// Runs the full §4.1 procedure against a sink positioned at byte 0.
///
/// `expect_icon_mask` corresponds to the `EXPECT_ICON_MASK` read state: when
/// set, a `CI`/`CP`/`IC`/`PT` tag is treated as an ordinary colour header
/// rather than handed off to the icon/pointer boundary.
pub(crate) fn classify(src: &mut dyn ByteSource, expect_icon_mask: bool) -> Result<ClassifyOutcome, BmpError> {
  let file_header = BmpFileHeader::read_from(src)?;
  if !BmpFileHeader::tag_is_recognized(file_header.tag) {
    return Err(BmpError::UnrecognizedMagic);
  }
  if file_header.tag.0 == *b"BA" {
    return Ok(ClassifyOutcome::Array);
  }
  let is_icon_or_pointer = matches!(&file_header.tag.0, b"CI" | b"CP" | b"IC" | b"PT");
  if is_icon_or_pointer && !expect_icon_mask {
    return Ok(ClassifyOutcome::IconOrPointer);
  }

  let mut size_bytes = [0_u8; 4];
  src.read_exact(&mut size_bytes)?;
  let declared_size = u32_le(&size_bytes);
  let mut version = InfoVersion::from_declared_size(declared_size).ok_or(BmpError::UnknownHeaderLength)?;

  let body_len = (declared_size as usize).saturating_sub(4);
  let mut scratch = [0_u8; 124];
  let read_len = body_len.min(124);
  src.read_exact(&mut scratch[..read_len])?;
  // Drain any bytes beyond our scratch buffer (a FUTURE header longer than
  // we interpret, or any version whose declared size ran past 124+4).
  let mut remaining = body_len.saturating_sub(read_len);
  let mut drain = [0_u8; 64];
  while remaining > 0 {
    let chunk = remaining.min(drain.len());
    src.read_exact(&mut drain[..chunk])?;
    remaining -= chunk;
  }

  let mut info_header = BmpInfoHeader::parse(version, &scratch);

  // OS/2 disambiguation (§4.1): a tentative V3 gets reclassified as OS22
  // under any of these signals.
  if matches!(version, InfoVersion::V3) {
    let non_bm_magic = file_header.tag.0 != *b"BM";
    let size_54 = file_header.file_size == 54;
    let compression_3_bitcount_1 = info_header.compression_raw == 3 && info_header.bitcount == 1;
    let compression_4_bitcount_24 = info_header.compression_raw == 4 && info_header.bitcount == 24;
    if non_bm_magic || size_54 || compression_3_bitcount_1 || compression_4_bitcount_24 {
      version = InfoVersion::Os22;
      info_header.version = InfoVersion::Os22;
    }
  }

  let is_os2_or_older = matches!(version, InfoVersion::CoreOs21 | InfoVersion::Os22);
  let compression = if is_os2_or_older && info_header.compression_raw == 3 {
    BmpCompression::Os2Huffman
  } else if is_os2_or_older && info_header.compression_raw == 4 {
    BmpCompression::Os2Rle24
  } else {
    BmpCompression::from_windows_wire_code(info_header.compression_raw)
      .ok_or(BmpError::UnsupportedBitcountCompression)?
  };

  check_planes(info_header.planes)?;
  check_support_gate(info_header.bitcount, compression)?;

  let classified = ClassifiedBmp {
    file_header,
    info_header,
    compression,
    bytes_read: 14 + u64::from(declared_size),
  };

  match compression {
    BmpCompression::Jpeg => Ok(ClassifyOutcome::EmbeddedJpeg(classified)),
    BmpCompression::Png => Ok(ClassifyOutcome::EmbeddedPng(classified)),
    _ => Ok(ClassifyOutcome::Bitmap(classified)),
  }
}

/// §4.1's "Support gate": which `(bitcount, compression)` pairings this
/// format version actually allows.
fn check_support_gate(bitcount: u16, compression: BmpCompression) -> Result<(), BmpError> {
  use BmpCompression::*;
  let ok = match bitcount {
    1 => matches!(compression, Rgb | Os2Huffman),
    2 => matches!(compression, Rgb),
    4 => matches!(compression, Rgb | Rle4),
    8 => matches!(compression, Rgb | Rle8),
    16 => matches!(compression, Rgb | Bitfields | AlphaBitfields),
    24 => matches!(compression, Rgb | Bitfields | AlphaBitfields | Os2Rle24),
    32 => matches!(compression, Rgb | Bitfields | AlphaBitfields),
    64 => matches!(compression, Rgb),
    _ => false,
  };
  if ok {
    Ok(())
  } else {
    Err(BmpError::UnsupportedBitcountCompression)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ascii_array::AsciiArray;

  fn v3_bytes(tag: [u8; 2], file_size: u32, width: i32, height: i32, bitcount: u16, compression: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&tag);
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(&[0_u8; 4]); // reserved1/2
    out.extend_from_slice(&54_u32.to_le_bytes()); // offbits
    out.extend_from_slice(&40_u32.to_le_bytes()); // info header size
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&1_u16.to_le_bytes()); // planes
    out.extend_from_slice(&bitcount.to_le_bytes());
    out.extend_from_slice(&compression.to_le_bytes());
    out.extend_from_slice(&[0_u8; 20]); // sizeimage, xpels, ypels, clrused, clrimportant
    out
  }

  #[test]
  fn os2_disambiguation_by_size_54_and_compression_3_bitcount_1() {
    let bytes = v3_bytes(*b"BM", 54, 2, 2, 1, 3);
    let mut src: &[u8] = &bytes;
    let outcome = classify(&mut src, false).unwrap();
    match outcome {
      ClassifyOutcome::Bitmap(c) => {
        assert_eq!(c.info_header.version, InfoVersion::Os22);
        assert_eq!(c.compression, BmpCompression::Os2Huffman);
      }
      other => panic!("expected Bitmap, got {other:?}"),
    }
  }

  #[test]
  fn same_bytes_with_bitcount_16_is_bitfields() {
    let bytes = v3_bytes(*b"BM", 54, 2, 2, 16, 3);
    let mut src: &[u8] = &bytes;
    let outcome = classify(&mut src, false).unwrap();
    match outcome {
      ClassifyOutcome::Bitmap(c) => {
        assert_eq!(c.info_header.version, InfoVersion::Os22);
        assert_eq!(c.compression, BmpCompression::Bitfields);
      }
      other => panic!("expected Bitmap, got {other:?}"),
    }
  }

  #[test]
  fn bitmap_array_tag_short_circuits() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"BA");
    bytes.extend_from_slice(&[0_u8; 12]);
    let mut src: &[u8] = &bytes;
    assert_eq!(classify(&mut src, false).unwrap(), ClassifyOutcome::Array);
  }

  #[test]
  fn icon_tag_without_expectation_yields_icon_or_pointer() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"IC");
    bytes.extend_from_slice(&[0_u8; 12]);
    let mut src: &[u8] = &bytes;
    assert_eq!(classify(&mut src, false).unwrap(), ClassifyOutcome::IconOrPointer);
  }

  #[test]
  fn rejects_unrecognized_magic() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"ZZ");
    bytes.extend_from_slice(&[0_u8; 12]);
    let mut src: &[u8] = &bytes;
    assert_eq!(classify(&mut src, false), Err(BmpError::UnrecognizedMagic));
  }

  #[test]
  fn ordinary_24bpp_v3_is_unaffected() {
    let bytes = v3_bytes(*b"BM", 70, 2, 2, 24, 0);
    let mut src: &[u8] = &bytes;
    let outcome = classify(&mut src, false).unwrap();
    match outcome {
      ClassifyOutcome::Bitmap(c) => {
        assert_eq!(c.info_header.version, InfoVersion::V3);
        assert_eq!(c.compression, BmpCompression::Rgb);
        let _ = AsciiArray::<2>::default();
      }
      other => panic!("expected Bitmap, got {other:?}"),
    }
  }
}
