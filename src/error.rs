//! Error types.
//!
//! There are two axes here, matching §7 of the design: [`BmpError`] is a
//! terminating failure returned from a `Result`, while `ErrorLatches` (see
//! [`crate::log`]) is an accumulating, non-terminating record of recoverable
//! data errors that a decode keeps running past.

/// A terminating error from the crate.
///
/// Carries the hard/user half of the §7 taxonomy: I/O failure, allocation
/// failure, an internal invariant violation, or a caller-settings mistake.
/// Recoverable bitstream corruption does *not* appear here — see
/// [`crate::log::ErrorLatches`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BmpError {
  /// The sink ran out of bytes before a read could complete.
  UnexpectedEof,

  /// A write to the sink failed.
  WriteFailed,

  /// The sink was asked to seek but doesn't support it.
  SeekUnsupported,

  /// The two-byte file tag wasn't one of the six recognized magics.
  UnrecognizedMagic,

  /// The info-header's declared size didn't match any known version and
  /// wasn't in the `FUTURE` range either.
  UnknownHeaderLength,

  /// `planes` was something other than 1.
  IllegalPlaneCount,

  /// This `(bitcount, compression)` pairing is not a combination this format
  /// version supports.
  UnsupportedBitcountCompression,

  /// A colour mask was invalid: overlapping channels, an empty RGB union,
  /// a too-wide channel, or a width sum exceeding `bitcount`.
  IllegalColorMask,

  /// The declared palette length didn't fit in the space available before
  /// `offbits`.
  PaletteTooLarge,

  /// The handle isn't in a state that permits this operation (see the read
  /// or write state machine).
  WrongState,

  /// A null or otherwise required pointer/buffer was missing.
  MissingRequiredBuffer,

  /// The requested numeric result format can't represent indexed pixels
  /// (indexed output requires `INT8`).
  IndexedRequiresInt8,

  /// The 64-bit conversion mode is incompatible with the requested result
  /// format.
  IncompatibleConversionMode,

  /// `set_undefined_pixel_mode` was given a value outside the defined set.
  InvalidUndefinedPixelMode,

  /// The declared dimensions overflow when computing a buffer size.
  DimensionsOverflow,

  /// The image exceeds the insanity limit without explicit caller consent.
  ImageTooLarge,

  /// An allocation failed.
  #[cfg(feature = "alloc")]
  Alloc,

  /// The compression is `JPEG`; the sink has been positioned at `offbits`
  /// and decoding stops here.
  EmbeddedJpeg,

  /// The compression is `PNG`; the sink has been positioned at `offbits`
  /// and decoding stops here.
  EmbeddedPng,

  /// The file is a `BA` bitmap array; control should pass to the
  /// demultiplexing path (§6).
  IsBitmapArray,
}

impl core::fmt::Display for BmpError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    core::fmt::Debug::fmt(self, f)
  }
}

#[cfg(feature = "std")]
impl std::error::Error for BmpError {}

/// The public per-call result code (§6), distinct from [`BmpError`].
///
/// A call that encounters recoverable data corruption still returns `Ok` of
/// one of the non-`Ok` variants here, with as much of the caller's buffer
/// filled in as could be recovered — see §7's propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BmpResultCode {
  /// Nothing went wrong.
  Ok,
  /// Recoverable corruption was found, but no row was left incomplete.
  Invalid,
  /// At least one row ended early because the input ran out or a delta or
  /// overrun was mishandled. Dominates `Invalid` when both would apply.
  Truncated,
  /// The image's declared size exceeds the insanity limit.
  Insane,
  /// The pixel data is an embedded PNG payload; the sink is positioned at
  /// its first byte.
  Png,
  /// The pixel data is an embedded JPEG payload; the sink is positioned at
  /// its first byte.
  Jpeg,
  /// A hard or user error occurred; see the `Result::Err` side instead.
  Error,
  /// The file is a bitmap array (`BA`); see §6.
  Array,
}
