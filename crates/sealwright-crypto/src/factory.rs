//! Algorithm factory roots.
//!
//! A [`Factory`] is the root object a crypto provider hands out: a type tag
//! plus a 32-byte security seed. Everything the factory produces that must be
//! reproducible later (personalised obfuscation, derived keysets) is a
//! function of that seed, so persisting the seed under a password lock is
//! enough to restore the factory.

use std::fmt;

use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    codec,
    env::Environment,
    error::CryptoError,
    keyset::{KEY_SIZE, KeySet, KeySetSpec},
    obfuscation::{KnuthObfuscator, Obfuscatable},
};

/// Label used when deriving keysets from the factory seed
const KEY_SET_LABEL: &[u8] = b"sealwrightFactoryKeySetV1";

/// Size of the factory security seed
pub const SEED_SIZE: usize = 32;

/// Flavour of factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FactoryType {
    /// Identifiers use the shared default obfuscation constants
    Standard,
    /// Identifiers use obfuscation constants derived from the factory seed
    Personalised,
}

impl Obfuscatable for FactoryType {
    const CLASS: u16 = 2;
    const NAME: &'static str = "FactoryType";
    const ALL: &'static [Self] = &[Self::Standard, Self::Personalised];
}

/// Root factory: type plus security seed.
#[derive(Clone)]
pub struct Factory {
    factory_type: FactoryType,
    seed: Zeroizing<[u8; SEED_SIZE]>,
}

/// Persisted form of a factory
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct FactoryRecord {
    #[zeroize(skip)]
    factory_type: FactoryType,
    seed: [u8; SEED_SIZE],
}

impl Factory {
    /// Create a factory with a fresh random seed.
    pub fn generate<E: Environment>(factory_type: FactoryType, env: &E) -> Self {
        Self { factory_type, seed: Zeroizing::new(env.random_array()) }
    }

    /// Create a factory from a known seed.
    pub fn from_seed(factory_type: FactoryType, seed: [u8; SEED_SIZE]) -> Self {
        Self { factory_type, seed: Zeroizing::new(seed) }
    }

    /// Flavour of this factory.
    pub fn factory_type(&self) -> FactoryType {
        self.factory_type
    }

    /// Obfuscator for identifiers persisted by this factory.
    pub fn obfuscator(&self) -> KnuthObfuscator {
        match self.factory_type {
            FactoryType::Standard => KnuthObfuscator::default(),
            FactoryType::Personalised => KnuthObfuscator::personalised(&self.seed[..]),
        }
    }

    /// Derive a keyset bound to this factory and a caller label.
    ///
    /// Same factory, spec and label always yield the same keyset.
    pub fn derive_key_set(&self, spec: KeySetSpec, label: &[u8]) -> Result<KeySet, CryptoError> {
        let hkdf = Hkdf::<Sha256>::new(Some(KEY_SET_LABEL), &self.seed[..]);

        let mut seed = Zeroizing::new([0u8; KEY_SIZE]);
        let Ok(()) = hkdf.expand(label, &mut seed[..]) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };

        KeySet::from_seed(spec, &seed)
    }

    /// Serialize the factory including its seed.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let record = FactoryRecord { factory_type: self.factory_type, seed: *self.seed };
        codec::encode(&record).map(Zeroizing::new)
    }

    /// Restore a factory serialized with [`Factory::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let record: FactoryRecord = codec::decode(bytes)?;
        Ok(Self::from_seed(record.factory_type, record.seed))
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory").field("factory_type", &self.factory_type).finish_non_exhaustive()
    }
}
