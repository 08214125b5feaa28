//! Property-based tests for the compatibility matrix and agreement specs

use proptest::prelude::*;
use sealwright_agree::{
    AgreementSpec, AgreementType, KdfType, is_supported_agreement, is_supported_kdf,
    supported_agreements, supported_kdfs,
};
use sealwright_crypto::{KeyPairType, Obfuscatable};

fn arbitrary_key_pair_type() -> impl Strategy<Value = KeyPairType> {
    prop::sample::select(KeyPairType::ALL)
}

fn arbitrary_agreement() -> impl Strategy<Value = AgreementType> {
    prop::sample::select(AgreementType::ALL)
}

fn arbitrary_kdf() -> impl Strategy<Value = KdfType> {
    prop::sample::select(KdfType::ALL)
}

proptest! {
    /// Property: supported_kdfs lists exactly the KDFs is_supported_kdf accepts
    #[test]
    fn prop_supported_kdfs_agree_with_predicate(
        kp in arbitrary_key_pair_type(),
        agreement in arbitrary_agreement(),
        kdf in arbitrary_kdf(),
    ) {
        prop_assert_eq!(
            supported_kdfs(kp, agreement).contains(&kdf),
            is_supported_kdf(kp, agreement, kdf)
        );
    }

    /// Property: a spec is valid iff its KDF is supported and any requested
    /// confirmation is allowed by the scheme
    #[test]
    fn prop_spec_validity(
        kp in arbitrary_key_pair_type(),
        agreement in arbitrary_agreement(),
        kdf in arbitrary_kdf(),
        confirm in any::<bool>(),
    ) {
        let spec = AgreementSpec::new(kp, agreement, kdf, confirm);
        let confirming =
            matches!(agreement, AgreementType::Unified | AgreementType::Mqv | AgreementType::Sm2);
        let expected = is_supported_kdf(kp, agreement, kdf) && (!confirm || confirming);

        prop_assert_eq!(spec.is_valid(), expected);
        prop_assert_eq!(spec.validate().is_ok(), expected);
    }

    /// Property: every family supporting an agreement has at least one KDF for it
    #[test]
    fn prop_supported_agreements_have_a_kdf(kp in arbitrary_key_pair_type()) {
        for agreement in supported_agreements(kp) {
            prop_assert!(is_supported_agreement(kp, *agreement));
            prop_assert!(!supported_kdfs(kp, *agreement).is_empty());
        }
    }
}

#[test]
fn documented_examples() {
    assert!(!is_supported_kdf(KeyPairType::Rsa, AgreementType::Kem, KdfType::Sha256Ckdf));
    assert!(is_supported_kdf(KeyPairType::Dh, AgreementType::Basic, KdfType::None));
    assert!(!is_supported_kdf(KeyPairType::Dh, AgreementType::Unified, KdfType::None));
    assert!(!is_supported_kdf(KeyPairType::Xdh, AgreementType::Unified, KdfType::Sha256Hkdf));
    assert!(is_supported_kdf(KeyPairType::Frodo, AgreementType::Kem, KdfType::None));
    assert!(!is_supported_kdf(KeyPairType::Frodo, AgreementType::Kem, KdfType::Sha256Kdf));
}
