//! Raw agreement primitives behind the handshake.
//!
//! The handshake owns sequencing, transcripts and confirmation. An engine
//! only knows which keys a scheme combines and how to combine them.

use sealwright_crypto::{KeyPair, KeyPairType, keypair::X25519_KEY_SIZE};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{error::AgreementError, types::AgreementType};

/// Side of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sends the first hello
    Client,
    /// Answers the client hello
    Server,
}

/// Keys a party contributes to one agreement.
#[derive(Debug, Clone, Copy)]
pub struct LocalKeys<'a> {
    /// Long-term keypair, private half required
    pub key_pair: &'a KeyPair,
    /// Ephemeral keypair, present when the scheme uses one for this role
    pub ephemeral: Option<&'a KeyPair>,
}

/// Public keys received from the peer.
#[derive(Debug, Clone, Copy)]
pub struct PeerKeys<'a> {
    /// Peer's long-term public key
    pub key_pair: &'a KeyPair,
    /// Peer's ephemeral public key, if it sent one
    pub ephemeral: Option<&'a [u8]>,
}

/// Computes raw shared secrets for one keypair family.
pub trait AgreementEngine {
    /// Keypair family this engine operates on.
    fn key_pair_type(&self) -> KeyPairType;

    /// True if the engine can execute `agreement`.
    fn supports(&self, agreement: AgreementType) -> bool;

    /// True if `role` contributes an ephemeral key under `agreement`.
    fn uses_ephemeral(&self, agreement: AgreementType, role: Role) -> bool;

    /// Build an ephemeral keypair from 32 bytes of fresh randomness.
    fn ephemeral_key_pair(&self, seed: &[u8; 32]) -> KeyPair;

    /// Combine local and peer keys into the raw secret `Z`.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyPair` if a local key has the wrong family or no private
    ///   half
    /// - `MalformedMessage` if peer key material is missing or unusable
    /// - `UnsupportedSpec` if the engine cannot run `agreement`
    fn shared_secret(
        &self,
        agreement: AgreementType,
        local: LocalKeys<'_>,
        peer: PeerKeys<'_>,
    ) -> Result<Zeroizing<Vec<u8>>, AgreementError>;
}

/// X25519 engine for XDH keypairs.
///
/// - ANON and KEM: the client's ephemeral key against the server's static key
/// - BASIC: static against static
/// - UNIFIED: `Z = DH(ephemeral, ephemeral') || DH(static, static')`
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519Engine;

impl X25519Engine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

impl AgreementEngine for X25519Engine {
    fn key_pair_type(&self) -> KeyPairType {
        KeyPairType::Xdh
    }

    fn supports(&self, agreement: AgreementType) -> bool {
        matches!(
            agreement,
            AgreementType::Anon | AgreementType::Basic | AgreementType::Unified | AgreementType::Kem
        )
    }

    fn uses_ephemeral(&self, agreement: AgreementType, role: Role) -> bool {
        match agreement {
            AgreementType::Anon | AgreementType::Kem => role == Role::Client,
            AgreementType::Unified => true,
            _ => false,
        }
    }

    fn ephemeral_key_pair(&self, seed: &[u8; 32]) -> KeyPair {
        KeyPair::x25519_from_seed(seed)
    }

    fn shared_secret(
        &self,
        agreement: AgreementType,
        local: LocalKeys<'_>,
        peer: PeerKeys<'_>,
    ) -> Result<Zeroizing<Vec<u8>>, AgreementError> {
        let local_ephemeral = match local.ephemeral {
            Some(pair) => Some(secret_of(pair)?),
            None => None,
        };
        let peer_ephemeral = peer.ephemeral.map(public_from_bytes).transpose()?;

        match agreement {
            // Exactly one side holds the ephemeral; the other uses its static key.
            AgreementType::Anon | AgreementType::Kem => match (local_ephemeral, peer_ephemeral) {
                (Some(own), None) => {
                    let theirs = public_of(peer.key_pair)?;
                    dh(&own, &theirs).map(|z| Zeroizing::new(z.to_vec()))
                },
                (None, Some(theirs)) => {
                    let own = secret_of(local.key_pair)?;
                    dh(&own, &theirs).map(|z| Zeroizing::new(z.to_vec()))
                },
                _ => Err(AgreementError::MalformedMessage {
                    reason: format!("{agreement} needs exactly one ephemeral key"),
                }),
            },
            AgreementType::Basic => {
                let own = secret_of(local.key_pair)?;
                let theirs = public_of(peer.key_pair)?;
                dh(&own, &theirs).map(|z| Zeroizing::new(z.to_vec()))
            },
            AgreementType::Unified => {
                let (Some(own_ephemeral), Some(their_ephemeral)) = (local_ephemeral, peer_ephemeral)
                else {
                    return Err(AgreementError::MalformedMessage {
                        reason: "UNIFIED needs ephemeral keys from both sides".to_string(),
                    });
                };
                let ephemeral = dh(&own_ephemeral, &their_ephemeral)?;
                let fixed = dh(&secret_of(local.key_pair)?, &public_of(peer.key_pair)?)?;

                let mut z = Zeroizing::new(Vec::with_capacity(2 * X25519_KEY_SIZE));
                z.extend_from_slice(&*ephemeral);
                z.extend_from_slice(&*fixed);
                Ok(z)
            },
            other => Err(AgreementError::UnsupportedSpec {
                reason: format!("X25519 engine cannot run {other}"),
            }),
        }
    }
}

fn secret_of(pair: &KeyPair) -> Result<StaticSecret, AgreementError> {
    check_family(pair)?;
    let private = pair.private_key().ok_or_else(|| AgreementError::InvalidKeyPair {
        reason: "private key required".to_string(),
    })?;
    let bytes: [u8; X25519_KEY_SIZE] = private.try_into().map_err(|_| {
        AgreementError::InvalidKeyPair {
            reason: format!("private key is {} bytes, expected {X25519_KEY_SIZE}", private.len()),
        }
    })?;
    let bytes = Zeroizing::new(bytes);
    Ok(StaticSecret::from(*bytes))
}

fn public_of(pair: &KeyPair) -> Result<PublicKey, AgreementError> {
    if pair.key_type() != KeyPairType::Xdh {
        return Err(AgreementError::MalformedMessage {
            reason: format!("peer key is {}, expected XDH", pair.key_type()),
        });
    }
    public_from_bytes(pair.public_key())
}

fn public_from_bytes(bytes: &[u8]) -> Result<PublicKey, AgreementError> {
    let array: [u8; X25519_KEY_SIZE] = bytes.try_into().map_err(|_| {
        AgreementError::MalformedMessage {
            reason: format!("public key is {} bytes, expected {X25519_KEY_SIZE}", bytes.len()),
        }
    })?;
    Ok(PublicKey::from(array))
}

fn check_family(pair: &KeyPair) -> Result<(), AgreementError> {
    if pair.key_type() == KeyPairType::Xdh {
        Ok(())
    } else {
        Err(AgreementError::InvalidKeyPair {
            reason: format!("{} keypair given to X25519 engine", pair.key_type()),
        })
    }
}

fn dh(secret: &StaticSecret, public: &PublicKey) -> Result<Zeroizing<[u8; 32]>, AgreementError> {
    let shared = secret.diffie_hellman(public);
    if !shared.was_contributory() {
        return Err(AgreementError::MalformedMessage {
            reason: "peer public key is a low-order point".to_string(),
        });
    }
    Ok(Zeroizing::new(shared.to_bytes()))
}
