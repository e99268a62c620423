//! Acoustic sub-part descriptor flags.
//!
//! A feature vector can carry up to six sub-parts: static coefficients,
//! static energy, deltas, delta energy, delta-deltas and delta-delta
//! energy. [`FeatureFlags`] records which of them are present and converts
//! to and from the two legacy bit-packed stream descriptions (SPRO 3.x and
//! SPRO 4.x, which use different bit layouts for the same information).

use std::fmt;

use crate::error::{FeatureError, FeatureResult};

/// SPRO 4.x stream description bits.
pub mod spro4_bits {
    /// Energy appended.
    pub const WITH_E: u32 = 0x01;
    /// Mean normalized (carries no structural information).
    pub const WITH_Z: u32 = 0x02;
    /// Static energy suppressed.
    pub const WITH_N: u32 = 0x04;
    /// Delta coefficients appended.
    pub const WITH_D: u32 = 0x08;
    /// Delta-delta coefficients appended.
    pub const WITH_A: u32 = 0x10;
}

/// SPRO 3.x stream description bits. Same information as the 4.x bits but
/// packed in a different order.
pub mod spro3_bits {
    /// Energy appended.
    pub const WITH_E: u32 = 0x01;
    /// Delta coefficients appended.
    pub const WITH_D: u32 = 0x02;
    /// Delta-delta coefficients appended.
    pub const WITH_A: u32 = 0x04;
    /// Static energy suppressed.
    pub const WITH_N: u32 = 0x08;
}

/// Describes which acoustic sub-parts a feature vector contains.
///
/// Defaults to all-false. The string form is six characters in the order
/// static, energy, delta, delta-energy, delta-delta, delta-delta-energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Static coefficients present.
    pub use_s: bool,
    /// Static energy present.
    pub use_e: bool,
    /// Delta coefficients present.
    pub use_d: bool,
    /// Delta energy present.
    pub use_de: bool,
    /// Delta-delta coefficients present.
    pub use_dd: bool,
    /// Delta-delta energy present.
    pub use_dde: bool,
}

impl FeatureFlags {
    /// Flags for a plain static-only stream (`"100000"`).
    pub fn static_only() -> Self {
        Self {
            use_s: true,
            ..Self::default()
        }
    }

    /// Derives the six flags from the presence bits common to every legacy
    /// encoding: energy, delta, delta-delta and the "static energy
    /// suppressed" marker.
    ///
    /// Delta energy is implied by energy + delta unless suppressed;
    /// delta-delta energy follows the energy+delta branch only.
    pub(crate) fn from_presence(e: bool, d: bool, a: bool, n: bool) -> Self {
        let mut f = FeatureFlags {
            use_s: true,
            ..FeatureFlags::default()
        };
        if e {
            f.use_e = true;
        }
        if d {
            f.use_d = true;
            if !n {
                f.use_de = f.use_e;
            }
        }
        if a {
            f.use_dd = true;
            f.use_dde = f.use_de;
        }
        f
    }

    /// Decodes a SPRO 4.x stream description.
    pub fn from_spro4_bits(bits: u32) -> Self {
        Self::from_presence(
            bits & spro4_bits::WITH_E != 0,
            bits & spro4_bits::WITH_D != 0,
            bits & spro4_bits::WITH_A != 0,
            bits & spro4_bits::WITH_N != 0,
        )
    }

    /// Encodes into a SPRO 4.x stream description. Lossy: delta-delta
    /// energy has no bit of its own.
    pub fn to_spro4_bits(&self) -> u32 {
        let mut bits = 0;
        if self.use_e {
            bits |= spro4_bits::WITH_E;
        }
        if self.use_d {
            bits |= spro4_bits::WITH_D;
        }
        if self.use_e && self.use_d && !self.use_de {
            bits |= spro4_bits::WITH_N;
        }
        if self.use_dd {
            bits |= spro4_bits::WITH_A;
        }
        bits
    }

    /// Decodes a SPRO 3.x stream description.
    pub fn from_spro3_bits(bits: u32) -> Self {
        Self::from_presence(
            bits & spro3_bits::WITH_E != 0,
            bits & spro3_bits::WITH_D != 0,
            bits & spro3_bits::WITH_A != 0,
            bits & spro3_bits::WITH_N != 0,
        )
    }

    /// Encodes into a SPRO 3.x stream description. Lossy like
    /// [`to_spro4_bits`](Self::to_spro4_bits).
    pub fn to_spro3_bits(&self) -> u32 {
        let mut bits = 0;
        if self.use_e {
            bits |= spro3_bits::WITH_E;
        }
        if self.use_d {
            bits |= spro3_bits::WITH_D;
        }
        if self.use_e && self.use_d && !self.use_de {
            bits |= spro3_bits::WITH_N;
        }
        if self.use_dd {
            bits |= spro3_bits::WITH_A;
        }
        bits
    }

    /// Merges a six-character `0`/`1`/`-` string into the flags, where
    /// `-` leaves the corresponding flag unchanged.
    pub fn merge_str(&mut self, s: &str) -> FeatureResult<()> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 6 {
            return Err(FeatureError::InvalidFlags {
                reason: format!("expected 6 characters, got {}", chars.len()),
            });
        }
        let mut next = *self;
        let slots = [
            &mut next.use_s,
            &mut next.use_e,
            &mut next.use_d,
            &mut next.use_de,
            &mut next.use_dd,
            &mut next.use_dde,
        ];
        for (slot, &c) in slots.into_iter().zip(chars.iter()) {
            match c {
                '0' => *slot = false,
                '1' => *slot = true,
                '-' => {}
                other => {
                    return Err(FeatureError::InvalidFlags {
                        reason: format!("unexpected character '{other}'"),
                    });
                }
            }
        }
        *self = next;
        Ok(())
    }

    /// Parses a six-character `0`/`1` string into fresh flags. `-` keeps
    /// the default (false).
    pub fn parse(s: &str) -> FeatureResult<Self> {
        let mut f = FeatureFlags::default();
        f.merge_str(s)?;
        Ok(f)
    }

    /// Total vector width implied by these flags for `base` static
    /// coefficients: each coefficient block present multiplies the base,
    /// each energy term adds one.
    pub fn expanded_size(&self, base: usize) -> usize {
        let blocks =
            self.use_s as usize + self.use_d as usize + self.use_dd as usize;
        let energies =
            self.use_e as usize + self.use_de as usize + self.use_dde as usize;
        base * blocks + energies
    }
}

impl fmt::Display for FeatureFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in [
            self.use_s,
            self.use_e,
            self.use_d,
            self.use_de,
            self.use_dd,
            self.use_dde,
        ] {
            f.write_str(if flag { "1" } else { "0" })?;
        }
        Ok(())
    }
}
