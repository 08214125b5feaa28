//! Reversible disguising of closed-enumeration identifiers.
//!
//! Persisted structures (lock envelopes, handshake messages) carry algorithm
//! types as 32-bit identifiers. Writing raw ordinals would make the layout
//! trivially readable and would let a value from one enumeration be silently
//! accepted as another, so each identifier is passed through a Knuth
//! multiplicative hash before it is written.
//!
//! # Encoding
//!
//! ```text
//! value = (CLASS << 16) | (ordinal + 1)
//! id    = ((value + adjustment) * multiplier) XOR mask      (mod 2^32)
//! ```
//!
//! Decoding multiplies by the modular inverse of the (odd) multiplier and
//! checks both the class tag and the ordinal range, so a corrupted or foreign
//! identifier is rejected instead of mapping to some other member.
//!
//! # Security
//!
//! This is a misuse guard, not an authentication mechanism. It detects
//! accidental corruption and version or enumeration mismatches; anyone who
//! knows the constants can forge identifiers. Integrity of persisted data
//! comes from the MAC and AEAD layers that surround these identifiers.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;

/// Label used to derive personalised obfuscation constants
const PERSONALISATION_LABEL: &[u8] = b"sealwrightObfuscateV1";

/// Knuth's golden-ratio prime, used when no personalisation is supplied
const DEFAULT_MULTIPLIER: u32 = 0x9E37_79B1;

/// Default XOR mask applied after multiplication
const DEFAULT_MASK: u32 = 0x5A3C_96E1;

/// Bits reserved for the ordinal within the pre-image
const ORDINAL_BITS: u32 = 16;

/// A closed enumeration whose members can be obfuscated.
///
/// Implementors list every member exactly once in [`Obfuscatable::ALL`]; the
/// position in that table is the ordinal. Tables are append-only: reordering
/// them changes every persisted identifier.
pub trait Obfuscatable: Copy + PartialEq + Sized + 'static {
    /// Unique class tag, distinct across all obfuscatable enumerations
    const CLASS: u16;

    /// Enumeration name, used in error messages
    const NAME: &'static str;

    /// Every member in ordinal order
    const ALL: &'static [Self];

    /// Position of `self` within [`Obfuscatable::ALL`].
    fn ordinal(self) -> usize {
        Self::ALL.iter().position(|member| *member == self).unwrap_or(usize::MAX)
    }
}

/// Knuth multiplicative obfuscator.
///
/// Holds an odd multiplier, its inverse modulo 2^32, and a mask. Two
/// obfuscators built from the same personalisation produce identical
/// identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnuthObfuscator {
    multiplier: u32,
    inverse: u32,
    mask: u32,
}

impl Default for KnuthObfuscator {
    fn default() -> Self {
        Self::with_constants(DEFAULT_MULTIPLIER, DEFAULT_MASK)
    }
}

impl KnuthObfuscator {
    /// Build an obfuscator from explicit constants.
    ///
    /// The multiplier is forced odd so that it is invertible modulo 2^32.
    pub fn with_constants(multiplier: u32, mask: u32) -> Self {
        let multiplier = if multiplier | 1 == 1 { DEFAULT_MULTIPLIER } else { multiplier | 1 };
        Self { multiplier, inverse: modular_inverse(multiplier), mask }
    }

    /// Derive obfuscation constants from a personalisation seed.
    ///
    /// Different seeds disguise the same type differently; the same seed
    /// always yields the same constants.
    pub fn personalised(seed: &[u8]) -> Self {
        let hkdf = Hkdf::<Sha256>::new(None, seed);

        let mut okm = [0u8; 8];
        let Ok(()) = hkdf.expand(PERSONALISATION_LABEL, &mut okm) else {
            unreachable!("8 bytes is a valid HKDF-SHA256 output length");
        };

        let multiplier = u32::from_be_bytes([okm[0], okm[1], okm[2], okm[3]]);
        let mask = u32::from_be_bytes([okm[4], okm[5], okm[6], okm[7]]);
        Self::with_constants(multiplier, mask)
    }

    /// Encode `value` with no adjustment.
    pub fn encode<T: Obfuscatable>(&self, value: T) -> i32 {
        self.encode_adjusted(value, 0)
    }

    /// Encode `value`, shifting the pre-image by `adjustment`.
    ///
    /// The adjustment lets one enumeration be encoded differently in
    /// different persisted contexts; the same adjustment must be supplied to
    /// decode.
    pub fn encode_adjusted<T: Obfuscatable>(&self, value: T, adjustment: i32) -> i32 {
        let preimage = (u32::from(T::CLASS) << ORDINAL_BITS) | (value.ordinal() as u32 + 1);
        let id = preimage.wrapping_add(adjustment as u32).wrapping_mul(self.multiplier) ^ self.mask;
        id as i32
    }

    /// Decode an identifier written with no adjustment.
    pub fn decode<T: Obfuscatable>(&self, id: i32) -> Result<T, CryptoError> {
        self.decode_adjusted(id, 0)
    }

    /// Decode an identifier written with `adjustment`.
    ///
    /// # Errors
    ///
    /// - `UnknownIdentifier` if the class tag does not match `T` or the
    ///   ordinal is outside the enumeration
    pub fn decode_adjusted<T: Obfuscatable>(
        &self,
        id: i32,
        adjustment: i32,
    ) -> Result<T, CryptoError> {
        let preimage =
            ((id as u32) ^ self.mask).wrapping_mul(self.inverse).wrapping_sub(adjustment as u32);

        let class = preimage >> ORDINAL_BITS;
        let ordinal = (preimage & 0xFFFF) as usize;

        if class != u32::from(T::CLASS) || ordinal == 0 {
            return Err(CryptoError::UnknownIdentifier { enumeration: T::NAME, id });
        }

        T::ALL
            .get(ordinal - 1)
            .copied()
            .ok_or(CryptoError::UnknownIdentifier { enumeration: T::NAME, id })
    }
}

/// Inverse of an odd `value` modulo 2^32 by Newton iteration.
///
/// Each step doubles the number of correct low bits; an odd value is its own
/// inverse modulo 8, so five steps cover all 32 bits.
fn modular_inverse(value: u32) -> u32 {
    let mut inverse = value;
    for _ in 0..5 {
        inverse = inverse.wrapping_mul(2u32.wrapping_sub(value.wrapping_mul(inverse)));
    }
    inverse
}
