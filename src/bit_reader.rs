//! The bit reader: a 32-bit shift register fed one byte at a time from the
//! sink, shared by the indexed-line decoder and the Huffman-line decoder.

use crate::sink::ByteSource;

/// Byte order newly-read bytes enter the register in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ByteOrder {
  /// Indexed decode: bytes enter as-is.
  Normal,
  /// OS/2 Huffman decode: every byte drawn from the sink is bit-reversed
  /// before it enters the register (§4.3.4).
  BitReversed,
}

/// A resumable 32-bit MSB-first bit reader.
///
/// Bits live left-aligned: the top `valid_bits` bits of `register` are the
/// next bits to be consumed. This is the type behind §9's "coroutine-like
/// line-by-line reading" note — it is plain state, not a generator, so a
/// line read can stop mid-byte and a later call picks the register back up.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BitReader32 {
  register: u32,
  valid_bits: u32,
  /// Set once the sink has reported end-of-input; further refills are
  /// no-ops so callers can still drain whatever bits remain in the register.
  at_eof: bool,
}

impl BitReader32 {
  #[inline]
  pub(crate) const fn new() -> Self {
    Self { register: 0, valid_bits: 0, at_eof: false }
  }

  /// Drops all buffered bits. Used when a delta or EOL forces
  /// byte-alignment.
  #[inline]
  pub(crate) fn clear(&mut self) {
    self.register = 0;
    self.valid_bits = 0;
    self.at_eof = false;
  }

  #[inline]
  pub(crate) const fn at_eof(&self) -> bool {
    self.at_eof && self.valid_bits == 0
  }

  fn refill(&mut self, source: &mut dyn ByteSource, order: ByteOrder) {
    while self.valid_bits <= 24 && !self.at_eof {
      match source.read_byte() {
        Ok(Some(byte)) => {
          let byte = match order {
            ByteOrder::Normal => byte,
            ByteOrder::BitReversed => crate::huffman::tables::REVERSED_BYTE[byte as usize],
          };
          self.register |= (byte as u32) << (24 - self.valid_bits);
          self.valid_bits += 8;
        }
        Ok(None) => self.at_eof = true,
        Err(_) => self.at_eof = true,
      }
    }
  }

  /// Looks at the next `n` (<= 24) bits without consuming them. Bits beyond
  /// what's available (at end of input) read back as zero.
  pub(crate) fn peek_bits(&mut self, source: &mut dyn ByteSource, order: ByteOrder, n: u32) -> u32 {
    debug_assert!(n <= 24);
    if self.valid_bits < n {
      self.refill(source, order);
    }
    self.register >> (32 - n)
  }

  /// Consumes and returns the next `n` (<= 24) bits, MSB-first. Returns
  /// `None` if fewer than `n` bits remain and no more bytes are available.
  pub(crate) fn take_bits(
    &mut self, source: &mut dyn ByteSource, order: ByteOrder, n: u32,
  ) -> Option<u32> {
    if n == 0 {
      return Some(0);
    }
    if self.valid_bits < n {
      self.refill(source, order);
    }
    if self.valid_bits < n {
      return None;
    }
    let value = self.register >> (32 - n);
    self.register <<= n;
    self.valid_bits -= n;
    Some(value)
  }

  /// Consumes exactly one bit, or `None` at end of input.
  #[inline]
  pub(crate) fn take_bit(&mut self, source: &mut dyn ByteSource, order: ByteOrder) -> Option<u32> {
    self.take_bits(source, order, 1)
  }

  /// Refills a 32-bit accumulator MSB-first and extracts `bitcount` bits
  /// from its top, as §4.3.2 describes for indexed (non-RLE) lines. This is
  /// [`Self::take_bits`] specialized to the `Normal` byte order used by
  /// indexed decode.
  #[inline]
  pub(crate) fn take_index(
    &mut self, source: &mut dyn ByteSource, bitcount: u32,
  ) -> Option<u32> {
    self.take_bits(source, ByteOrder::Normal, bitcount)
  }
}
