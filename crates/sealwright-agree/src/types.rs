//! Agreement and KDF enumerations.

use std::{fmt, str::FromStr};

use sealwright_crypto::{CryptoError, Obfuscatable};
use serde::{Deserialize, Serialize};

/// Key-agreement scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgreementType {
    /// Client ephemeral against server static; client is anonymous
    Anon,
    /// Static-static Diffie-Hellman
    Basic,
    /// Ephemeral agreement authenticated by signatures
    Signed,
    /// Ephemeral-ephemeral plus static-static (NIST unified model)
    Unified,
    /// Menezes-Qu-Vanstone
    Mqv,
    /// SM2 key exchange
    Sm2,
    /// Key encapsulation against the server's static key
    Kem,
}

impl AgreementType {
    /// Canonical upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Anon => "ANON",
            Self::Basic => "BASIC",
            Self::Signed => "SIGNED",
            Self::Unified => "UNIFIED",
            Self::Mqv => "MQV",
            Self::Sm2 => "SM2",
            Self::Kem => "KEM",
        }
    }

    /// True if key confirmation may be layered on this scheme.
    pub fn allows_confirmation(self) -> bool {
        matches!(self, Self::Unified | Self::Mqv | Self::Sm2)
    }
}

impl Obfuscatable for AgreementType {
    const CLASS: u16 = 5;
    const NAME: &'static str = "AgreementType";
    const ALL: &'static [Self] =
        &[Self::Anon, Self::Basic, Self::Signed, Self::Unified, Self::Mqv, Self::Sm2, Self::Kem];
}

/// Key-derivation function applied to the raw shared secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KdfType {
    /// Raw shared secret, no derivation
    None,
    /// ANSI X9.63 KDF over SHA-256
    Sha256Kdf,
    /// ANSI X9.63 KDF over SHA-512
    Sha512Kdf,
    /// NIST SP 800-56 concatenation KDF over SHA-256
    Sha256Ckdf,
    /// NIST SP 800-56 concatenation KDF over SHA-512
    Sha512Ckdf,
    /// HKDF over SHA-256
    Sha256Hkdf,
    /// HKDF over SHA-512
    Sha512Hkdf,
}

/// Construction behind a [`KdfType`], ignoring the hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KdfFamily {
    /// No derivation
    None,
    /// X9.63 counter-after-secret
    X963,
    /// Concatenation KDF, counter-before-secret
    Concat,
    /// Extract-then-expand
    Hkdf,
}

impl KdfType {
    /// Canonical upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Sha256Kdf => "SHA256KDF",
            Self::Sha512Kdf => "SHA512KDF",
            Self::Sha256Ckdf => "SHA256CKDF",
            Self::Sha512Ckdf => "SHA512CKDF",
            Self::Sha256Hkdf => "SHA256HKDF",
            Self::Sha512Hkdf => "SHA512HKDF",
        }
    }

    /// Construction used by this KDF.
    pub fn family(self) -> KdfFamily {
        match self {
            Self::None => KdfFamily::None,
            Self::Sha256Kdf | Self::Sha512Kdf => KdfFamily::X963,
            Self::Sha256Ckdf | Self::Sha512Ckdf => KdfFamily::Concat,
            Self::Sha256Hkdf | Self::Sha512Hkdf => KdfFamily::Hkdf,
        }
    }
}

impl Obfuscatable for KdfType {
    const CLASS: u16 = 6;
    const NAME: &'static str = "KdfType";
    const ALL: &'static [Self] = &[
        Self::None,
        Self::Sha256Kdf,
        Self::Sha512Kdf,
        Self::Sha256Ckdf,
        Self::Sha512Ckdf,
        Self::Sha256Hkdf,
        Self::Sha512Hkdf,
    ];
}

macro_rules! named_enum {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = CryptoError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL.iter().copied().find(|t| t.name().eq_ignore_ascii_case(s)).ok_or_else(
                    || CryptoError::UnknownName { enumeration: Self::NAME, name: s.to_string() },
                )
            }
        }
    };
}

named_enum!(AgreementType);
named_enum!(KdfType);
