//! Which KDFs and agreement schemes each keypair family may be combined with.
//!
//! The matrix is a table of per-family rules rather than nested branching,
//! so each family's row can be read (and tested) on its own:
//!
//! | Family            | NONE             | SHA*KDF | *CKDF            | *HKDF          |
//! |-------------------|------------------|---------|------------------|----------------|
//! | RSA               | yes              | yes     | no               | yes            |
//! | EC, SM2, DSTU, GOST | yes            | yes     | not with KEM     | no             |
//! | DH                | BASIC, KEM only  | yes     | UNIFIED, MQV only | no            |
//! | XDH               | not with UNIFIED | yes     | not with UNIFIED | not with UNIFIED |
//! | post-quantum KEMs | KEM only         | no      | no               | no             |
//! | everything else   | yes              | yes     | yes              | yes            |

use sealwright_crypto::{KeyPairType, Obfuscatable};

use crate::types::{AgreementType, KdfFamily, KdfType};

/// Whether a KDF family is allowed, as a function of the agreement type.
#[derive(Debug, Clone, Copy)]
enum Rule {
    Always,
    Never,
    OnlyWith(&'static [AgreementType]),
    ExceptWith(&'static [AgreementType]),
}

impl Rule {
    fn permits(self, agreement: AgreementType) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::OnlyWith(allowed) => allowed.contains(&agreement),
            Self::ExceptWith(excluded) => !excluded.contains(&agreement),
        }
    }
}

/// One row of the matrix.
#[derive(Debug, Clone, Copy)]
struct FamilyRules {
    none: Rule,
    x963: Rule,
    concat: Rule,
    hkdf: Rule,
}

impl FamilyRules {
    fn rule(&self, family: KdfFamily) -> Rule {
        match family {
            KdfFamily::None => self.none,
            KdfFamily::X963 => self.x963,
            KdfFamily::Concat => self.concat,
            KdfFamily::Hkdf => self.hkdf,
        }
    }
}

const UNRESTRICTED: FamilyRules = FamilyRules {
    none: Rule::Always,
    x963: Rule::Always,
    concat: Rule::Always,
    hkdf: Rule::Always,
};

const RSA: FamilyRules =
    FamilyRules { none: Rule::Always, x963: Rule::Always, concat: Rule::Never, hkdf: Rule::Always };

const ELLIPTIC: FamilyRules = FamilyRules {
    none: Rule::Always,
    x963: Rule::Always,
    concat: Rule::ExceptWith(&[AgreementType::Kem]),
    hkdf: Rule::Never,
};

const DH: FamilyRules = FamilyRules {
    none: Rule::OnlyWith(&[AgreementType::Basic, AgreementType::Kem]),
    x963: Rule::Always,
    concat: Rule::OnlyWith(&[AgreementType::Unified, AgreementType::Mqv]),
    hkdf: Rule::Never,
};

const XDH: FamilyRules = FamilyRules {
    none: Rule::ExceptWith(&[AgreementType::Unified]),
    x963: Rule::Always,
    concat: Rule::ExceptWith(&[AgreementType::Unified]),
    hkdf: Rule::ExceptWith(&[AgreementType::Unified]),
};

const POST_QUANTUM_KEM: FamilyRules = FamilyRules {
    none: Rule::OnlyWith(&[AgreementType::Kem]),
    x963: Rule::Never,
    concat: Rule::Never,
    hkdf: Rule::Never,
};

fn rules_for(key_pair_type: KeyPairType) -> FamilyRules {
    match key_pair_type {
        KeyPairType::Rsa => RSA,
        KeyPairType::Dh => DH,
        KeyPairType::Xdh => XDH,
        kp if kp.is_elliptic() => ELLIPTIC,
        kp if kp.is_post_quantum_kem() => POST_QUANTUM_KEM,
        _ => UNRESTRICTED,
    }
}

/// True if `kdf_type` may derive keys from a `(key_pair_type,
/// agreement_type)` agreement.
pub fn is_supported_kdf(
    key_pair_type: KeyPairType,
    agreement_type: AgreementType,
    kdf_type: KdfType,
) -> bool {
    rules_for(key_pair_type).rule(kdf_type.family()).permits(agreement_type)
}

/// Every KDF allowed for `(key_pair_type, agreement_type)`, in enumeration
/// order.
pub fn supported_kdfs(key_pair_type: KeyPairType, agreement_type: AgreementType) -> Vec<KdfType> {
    KdfType::ALL
        .iter()
        .copied()
        .filter(|kdf| is_supported_kdf(key_pair_type, agreement_type, *kdf))
        .collect()
}

/// Agreement schemes a keypair family can execute at all.
pub fn supported_agreements(key_pair_type: KeyPairType) -> &'static [AgreementType] {
    use AgreementType::{Anon, Basic, Kem, Mqv, Signed, Sm2, Unified};

    match key_pair_type {
        KeyPairType::Rsa => &[Kem],
        KeyPairType::Ec | KeyPairType::Dh => &[Anon, Basic, Signed, Unified, Mqv, Kem],
        KeyPairType::Sm2 => &[Anon, Basic, Signed, Sm2, Kem],
        KeyPairType::Dstu4145 | KeyPairType::Gost2012 | KeyPairType::Xdh => {
            &[Anon, Basic, Signed, Unified, Kem]
        },
        kp if kp.is_post_quantum_kem() => &[Kem],
        _ => &[],
    }
}

/// True if `key_pair_type` keys can take part in `agreement_type`.
pub fn is_supported_agreement(key_pair_type: KeyPairType, agreement_type: AgreementType) -> bool {
    supported_agreements(key_pair_type).contains(&agreement_type)
}
