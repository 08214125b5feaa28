//! Fuzz target for handshake message handling
//!
//! Feeds arbitrary bytes to each side of an X25519 handshake at every
//! message-accepting state.
//!
//! # Invariants
//!
//! - NEVER panic on malformed messages
//! - A rejected message never completes the handshake

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealwright_agree::{
    AgreementSpec, AgreementStatus, AgreementType, Handshake, KdfType, X25519Engine,
};
use sealwright_crypto::{KeyPair, KeyPairType, env::test_utils::SeededEnv};

#[derive(Debug, Arbitrary)]
struct HandshakeInput {
    confirm: bool,
    client_hello: Vec<u8>,
    server_hello: Vec<u8>,
    client_confirm: Vec<u8>,
}

fuzz_target!(|input: HandshakeInput| {
    let spec = if input.confirm {
        AgreementSpec::new(KeyPairType::Xdh, AgreementType::Unified, KdfType::Sha256Kdf, true)
    } else {
        AgreementSpec::new(KeyPairType::Xdh, AgreementType::Basic, KdfType::Sha256Hkdf, false)
    };
    let client_keys = KeyPair::x25519_from_seed(&[1; 32]);
    let server_keys = KeyPair::x25519_from_seed(&[2; 32]);

    let Ok(mut server) = Handshake::new(spec, X25519Engine::new(), SeededEnv::new(1)) else {
        return;
    };
    let accepted =
        server.accept_client_hello(&client_keys.public_only(), &server_keys, &input.client_hello);
    if accepted.is_err() {
        assert_eq!(server.status(), AgreementStatus::Init);
    } else if server.status() == AgreementStatus::ServerHelloSent
        && server.accept_client_confirm(&input.client_confirm).is_err()
    {
        assert!(server.result().is_err());
    }

    let Ok(mut client) = Handshake::new(spec, X25519Engine::new(), SeededEnv::new(2)) else {
        return;
    };
    if client.create_client_hello(&client_keys).is_ok()
        && client.accept_server_hello(&server_keys.public_only(), &input.server_hello).is_err()
    {
        assert_ne!(client.status(), AgreementStatus::Complete);
    }
});
