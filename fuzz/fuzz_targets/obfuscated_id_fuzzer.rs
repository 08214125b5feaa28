//! Fuzz target for obfuscated identifier decoding
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary identifiers or constants
//! - Any identifier that decodes re-encodes to itself
//! - Each identifier decodes as at most one enumeration

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealwright_agree::{AgreementType, KdfType};
use sealwright_crypto::{FactoryType, KeyPairType, KnuthObfuscator, SymKeyType};

fuzz_target!(|input: (i32, u32, u32)| {
    let (id, multiplier, mask) = input;
    let obfuscator = KnuthObfuscator::with_constants(multiplier, mask);

    let mut matches = 0;
    macro_rules! check {
        ($ty:ty) => {
            if let Ok(value) = obfuscator.decode::<$ty>(id) {
                assert_eq!(obfuscator.encode(value), id);
                matches += 1;
            }
        };
    }

    check!(SymKeyType);
    check!(FactoryType);
    check!(KeyPairType);
    check!(AgreementType);
    check!(KdfType);

    assert!(matches <= 1);
});
