//! Asymmetric keypairs.
//!
//! A [`KeyPair`] is an algorithm family tag plus opaque encoded public and
//! (optionally) private key material. The maths behind each family belongs to
//! the provider that produced the bytes; this crate only generates X25519
//! pairs itself, which is enough to drive the agreement engine end to end.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519PrivateKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{codec, env::Environment, error::CryptoError, obfuscation::Obfuscatable};

/// X25519 key length (public and private)
pub const X25519_KEY_SIZE: usize = 32;

/// Asymmetric algorithm family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyPairType {
    /// RSA
    Rsa,
    /// Elliptic curve over prime fields (ECDSA/ECDH)
    Ec,
    /// Chinese SM2 elliptic curve
    Sm2,
    /// Ukrainian DSTU 4145 elliptic curve
    Dstu4145,
    /// Russian GOST R 34.10-2012 elliptic curve
    Gost2012,
    /// Finite-field Diffie-Hellman
    Dh,
    /// Montgomery-curve Diffie-Hellman (X25519/X448)
    Xdh,
    /// Edwards-curve signatures
    EdDsa,
    /// Finite-field DSA
    Dsa,
    /// Leighton-Micali hash-based signatures
    Lms,
    /// Classic McEliece KEM
    Cmce,
    /// FrodoKEM
    Frodo,
    /// SABER KEM
    Saber,
    /// NewHope KEM
    NewHope,
    /// HQC KEM
    Hqc,
    /// BIKE KEM
    Bike,
    /// NTRU KEM
    Ntru,
    /// NTRU Prime KEM
    NtruPrime,
}

impl KeyPairType {
    /// Canonical upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::Ec => "EC",
            Self::Sm2 => "SM2",
            Self::Dstu4145 => "DSTU4145",
            Self::Gost2012 => "GOST2012",
            Self::Dh => "DH",
            Self::Xdh => "XDH",
            Self::EdDsa => "EDDSA",
            Self::Dsa => "DSA",
            Self::Lms => "LMS",
            Self::Cmce => "CMCE",
            Self::Frodo => "FRODO",
            Self::Saber => "SABER",
            Self::NewHope => "NEWHOPE",
            Self::Hqc => "HQC",
            Self::Bike => "BIKE",
            Self::Ntru => "NTRU",
            Self::NtruPrime => "NTRUPRIME",
        }
    }

    /// True for the post-quantum key-encapsulation families.
    pub fn is_post_quantum_kem(self) -> bool {
        matches!(
            self,
            Self::Cmce
                | Self::Frodo
                | Self::Saber
                | Self::NewHope
                | Self::Hqc
                | Self::Bike
                | Self::Ntru
                | Self::NtruPrime
        )
    }

    /// True for the elliptic-curve families that share agreement rules.
    pub fn is_elliptic(self) -> bool {
        matches!(self, Self::Ec | Self::Sm2 | Self::Dstu4145 | Self::Gost2012)
    }
}

impl Obfuscatable for KeyPairType {
    const CLASS: u16 = 3;
    const NAME: &'static str = "KeyPairType";
    const ALL: &'static [Self] = &[
        Self::Rsa,
        Self::Ec,
        Self::Sm2,
        Self::Dstu4145,
        Self::Gost2012,
        Self::Dh,
        Self::Xdh,
        Self::EdDsa,
        Self::Dsa,
        Self::Lms,
        Self::Cmce,
        Self::Frodo,
        Self::Saber,
        Self::NewHope,
        Self::Hqc,
        Self::Bike,
        Self::Ntru,
        Self::NtruPrime,
    ];
}

impl fmt::Display for KeyPairType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyPairType {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CryptoError::UnknownName {
                enumeration: Self::NAME,
                name: s.to_string(),
            })
    }
}

/// An asymmetric keypair, or a public key alone.
///
/// Private key bytes are zeroized on drop.
#[derive(Clone)]
pub struct KeyPair {
    key_type: KeyPairType,
    public: Vec<u8>,
    private: Option<Zeroizing<Vec<u8>>>,
}

/// Persisted form of a keypair
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyPairRecord {
    #[zeroize(skip)]
    key_type: KeyPairType,
    public: Vec<u8>,
    private: Option<Vec<u8>>,
}

impl KeyPair {
    /// Wrap provider-encoded key material.
    pub fn new(key_type: KeyPairType, public: Vec<u8>, private: Option<Vec<u8>>) -> Self {
        Self { key_type, public, private: private.map(Zeroizing::new) }
    }

    /// Generate a fresh X25519 keypair.
    pub fn generate_x25519<E: Environment>(env: &E) -> Self {
        let seed = Zeroizing::new(env.random_array::<X25519_KEY_SIZE>());
        Self::x25519_from_seed(&seed)
    }

    /// Build an X25519 keypair from a 32-byte private scalar.
    pub fn x25519_from_seed(seed: &[u8; X25519_KEY_SIZE]) -> Self {
        let private_key = X25519PrivateKey::from(*seed);
        let public_key = X25519PublicKey::from(&private_key);

        Self {
            key_type: KeyPairType::Xdh,
            public: public_key.as_bytes().to_vec(),
            private: Some(Zeroizing::new(private_key.to_bytes().to_vec())),
        }
    }

    /// Algorithm family.
    pub fn key_type(&self) -> KeyPairType {
        self.key_type
    }

    /// Encoded public key.
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }

    /// Encoded private key. `None` for a public-only keypair.
    pub fn private_key(&self) -> Option<&[u8]> {
        self.private.as_ref().map(|key| key.as_slice())
    }

    /// True if private key material is present.
    pub fn has_private(&self) -> bool {
        self.private.is_some()
    }

    /// Copy of this keypair without the private half.
    ///
    /// This is what gets handed to the peer in an agreement.
    pub fn public_only(&self) -> Self {
        Self { key_type: self.key_type, public: self.public.clone(), private: None }
    }

    /// Serialize the keypair including any private key material.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let record = KeyPairRecord {
            key_type: self.key_type,
            public: self.public.clone(),
            private: self.private.as_ref().map(|key| key.to_vec()),
        };
        codec::encode(&record).map(Zeroizing::new)
    }

    /// Restore a keypair serialized with [`KeyPair::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let record: KeyPairRecord = codec::decode(bytes)?;
        Ok(Self {
            key_type: record.key_type,
            public: record.public.clone(),
            private: record.private.as_ref().map(|key| Zeroizing::new(key.clone())),
        })
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_type", &self.key_type)
            .field("public_len", &self.public.len())
            .field("has_private", &self.has_private())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::test_utils::SeededEnv;

    #[test]
    fn x25519_generation_produces_32_byte_keys() {
        let env = SeededEnv::new(1);
        let pair = KeyPair::generate_x25519(&env);

        assert_eq!(pair.key_type(), KeyPairType::Xdh);
        assert_eq!(pair.public_key().len(), X25519_KEY_SIZE);
        assert_eq!(pair.private_key().map(<[u8]>::len), Some(X25519_KEY_SIZE));
    }

    #[test]
    fn x25519_from_seed_is_deterministic() {
        let a = KeyPair::x25519_from_seed(&[7u8; 32]);
        let b = KeyPair::x25519_from_seed(&[7u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn public_only_strips_private() {
        let env = SeededEnv::new(2);
        let pair = KeyPair::generate_x25519(&env);
        let public = pair.public_only();

        assert!(!public.has_private());
        assert_eq!(public.public_key(), pair.public_key());
    }

    #[test]
    fn serialize_roundtrip() {
        let env = SeededEnv::new(3);
        let pair = KeyPair::generate_x25519(&env);

        let restored = KeyPair::from_bytes(&pair.to_bytes().unwrap()).unwrap();

        assert_eq!(restored.key_type(), pair.key_type());
        assert_eq!(restored.public_key(), pair.public_key());
        assert_eq!(restored.private_key(), pair.private_key());
    }

    #[test]
    fn debug_does_not_leak_private_key() {
        let pair = KeyPair::new(KeyPairType::Rsa, vec![1, 2, 3], Some(vec![0xAA; 4]));
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains("170"), "private bytes must not be printed");
        assert!(rendered.contains("has_private: true"));
    }

    #[test]
    fn post_quantum_families() {
        let pq: Vec<KeyPairType> =
            KeyPairType::ALL.iter().copied().filter(|t| t.is_post_quantum_kem()).collect();
        assert_eq!(pq.len(), 8);
        assert!(!KeyPairType::Rsa.is_post_quantum_kem());
        assert!(KeyPairType::Gost2012.is_elliptic());
    }

    #[test]
    fn key_pair_type_parses_names() {
        assert_eq!("xdh".parse::<KeyPairType>().unwrap(), KeyPairType::Xdh);
        assert_eq!("NTRUPRIME".parse::<KeyPairType>().unwrap(), KeyPairType::NtruPrime);
        assert!("ELGAMAL".parse::<KeyPairType>().is_err());
    }
}
