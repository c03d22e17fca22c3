//! Numeric result formats, the 64-bpp conversion modes, and the undefined-
//! pixel policy — the caller-selected output shape a decoded channel value
//! is rescaled into (§3, §4.3.1, §4.3.5).

/// The shape of a decoded (or to-be-encoded) channel value.
///
/// `INT` picks its bit width per image (8, 16, or 32) by widening the widest
/// source channel to the next power of two, capped at 32; that width is
/// recorded on the handle once at `load_image`/`save_image` time rather than
/// carried per-call, so this enum itself only distinguishes the three shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ResultFormat {
  /// Unsigned integer channels, width chosen from the source bit depth.
  #[default]
  Int,
  /// 32-bit IEEE-754 `binary32`, nominal range `[0, 1]`.
  Float,
  /// Signed 16-bit fixed point, 2 integer bits + 13 fractional bits.
  S2_13,
}

/// How a 64-bpp (s2.13-per-channel) source is converted into the selected
/// [`ResultFormat`] (§3, §4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Conv64Mode {
  /// Apply the sRGB transfer function to R, G, B (never alpha).
  Srgb,
  /// Clamp into `[0, 1]` and scale; no gamma curve.
  #[default]
  Linear,
  /// Shorthand for `(Linear, S2_13)`: the stored bits pass straight through.
  None,
}

/// Whether undefined pixels (RLE delta jumps, truncated rows) are left at
/// the buffer's initial content or forced into a visible alpha hole (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum UndefinedPixelPolicy {
  /// Leave undefined pixels at whatever the caller's buffer already held.
  #[default]
  Leave,
  /// Force a four-channel result and write `alpha = 0` on undefined pixels.
  ToAlpha,
}

/// The integer bit width chosen for [`ResultFormat::Int`], derived once from
/// the widest source channel.
#[inline]
#[must_use]
pub(crate) const fn int_result_width(widest_source_bits: u32) -> u32 {
  if widest_source_bits <= 8 {
    8
  } else if widest_source_bits <= 16 {
    16
  } else {
    32
  }
}

/// `round(v * (2^to - 1) / (2^from - 1))`, the §4.3.1 INT rescale formula.
///
/// Monotonic non-decreasing in `v` for fixed `from`/`to`, and maps the
/// top-of-range value exactly onto the top of the target range (§8 property
/// 5). `from` and `to` must each be in `1..=32`.
#[inline]
#[must_use]
pub(crate) fn rescale_int(v: u32, from_bits: u32, to_bits: u32) -> u32 {
  if from_bits == to_bits {
    return v;
  }
  let from_max = max_value(from_bits);
  let to_max = max_value(to_bits);
  let numerator = (v as u64) * (to_max as u64);
  ((numerator + (from_max as u64) / 2) / (from_max as u64)) as u32
}

#[inline]
#[must_use]
const fn max_value(bits: u32) -> u32 {
  if bits >= 32 {
    u32::MAX
  } else {
    (1_u32 << bits) - 1
  }
}

/// `v / (2^from - 1)`, the §4.3.1 FLOAT rescale formula.
#[inline]
#[must_use]
pub(crate) fn rescale_float(v: u32, from_bits: u32) -> f32 {
  v as f32 / max_value(from_bits) as f32
}

/// `round(v * 8192 / (2^from - 1))`, the §4.3.1 S2_13 rescale formula.
#[inline]
#[must_use]
pub(crate) fn rescale_s2_13(v: u32, from_bits: u32) -> i16 {
  let from_max = max_value(from_bits) as f64;
  let scaled = (v as f64) * 8192.0 / from_max;
  scaled.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Interprets a raw 16-bit word as signed s2.13 and returns its value as an
/// `f32` (§8 property 3: round-tripping through [`float_to_s2_13`] must be
/// exact).
#[inline]
#[must_use]
pub(crate) fn s2_13_to_float(bits: u16) -> f32 {
  (bits as i16) as f32 / 8192.0
}

/// The inverse of [`s2_13_to_float`]: clamps into the representable s2.13
/// range and rounds to the nearest bit pattern.
#[inline]
#[must_use]
pub(crate) fn float_to_s2_13(v: f32) -> u16 {
  let scaled = (v * 8192.0).round().clamp(i16::MIN as f32, i16::MAX as f32);
  (scaled as i16) as u16
}

/// The sRGB transfer function (encoding direction: linear -> sRGB), per
/// §4.3.1 and §8 property 4. Defined and clamped over `x ∈ [0, 1]`.
#[inline]
#[must_use]
pub(crate) fn srgb_encode(x: f32) -> f32 {
  let x = x.clamp(0.0, 1.0);
  if x <= 0.0031308 {
    12.92 * x
  } else {
    1.055 * x.powf(1.0 / 2.4) - 0.055
  }
}

/// The inverse of [`rescale_float`]: clamps `channel` into `[0, 1]` and scales
/// up to `to_bits`, the §4.4 packed-RGB writer's float-source rule.
#[inline]
#[must_use]
pub(crate) fn pack_float(channel: f32, to_bits: u32) -> u32 {
  let clamped = channel.clamp(0.0, 1.0);
  (clamped * max_value(to_bits) as f32).round() as u32
}

/// The inverse of [`rescale_s2_13`]: negatives clamp to 0, values past 1.0
/// clamp to `to_bits`'s max, otherwise scale, per §4.4's s2.13-source writer
/// rule.
#[inline]
#[must_use]
pub(crate) fn pack_s2_13(bits: i16, to_bits: u32) -> u32 {
  let f = s2_13_to_float(bits).clamp(0.0, 1.0);
  (f * max_value(to_bits) as f32).round() as u32
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn s2_13_round_trips_every_u16() {
    for bits in 0_u32..=u16::MAX as u32 {
      let bits = bits as u16;
      let f = s2_13_to_float(bits);
      assert_eq!(float_to_s2_13(f), bits, "bits={bits:#06x} f={f}");
    }
  }

  #[test]
  fn s2_13_known_values() {
    assert_eq!(s2_13_to_float(0x2000), 1.0);
    assert_eq!(s2_13_to_float(0xE000), -1.0);
    assert!((s2_13_to_float(0x7FFF) - 3.99987793).abs() < 1e-5);
  }

  #[test]
  fn srgb_transfer_properties() {
    assert_eq!(srgb_encode(0.0), 0.0);
    assert_eq!(srgb_encode(1.0), 1.0);
    assert!((srgb_encode(0.0031308) - 0.0404482).abs() < 1e-6);
    let mut x = 0.0_f32;
    while x <= 1.0 {
      let y = srgb_encode(x);
      assert!((0.0..=1.0).contains(&y));
      x += 0.01;
    }
  }

  #[test]
  fn rescale_int_is_monotonic_and_hits_top() {
    for &(from, to) in &[(1_u32, 8_u32), (5, 8), (8, 16), (16, 8), (8, 32)] {
      let from_max = max_value(from);
      assert_eq!(rescale_int(from_max, from, to), max_value(to));
      let mut prev = 0_u32;
      for v in 0..=from_max {
        let r = rescale_int(v, from, to);
        assert!(r >= prev);
        prev = r;
      }
    }
  }

  #[test]
  fn rescale_float_and_s2_13_agree_at_extremes() {
    assert_eq!(rescale_float(0, 8), 0.0);
    assert_eq!(rescale_float(255, 8), 1.0);
    assert_eq!(rescale_s2_13(255, 8), 8192);
    assert_eq!(rescale_s2_13(0, 8), 0);
  }
}
