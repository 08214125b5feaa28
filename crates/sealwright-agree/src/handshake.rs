//! Two-party agreement handshake.
//!
//! ```text
//! Client                                   Server
//!   │ create_client_hello                    │
//!   │ ───────────── ClientHello ───────────► │ accept_client_hello
//!   │ ◄──────────── ServerHello ──────────── │
//!   │ accept_server_hello                    │
//!   │ ──────────── ClientConfirm ──────────► │ accept_client_confirm
//!   │                                        │   (confirming specs only)
//! ```
//!
//! Without confirmation the server holds its result as soon as it answers
//! the client hello. With confirmation the server hello carries a tag the
//! client must verify, and the server waits for the client's tag before
//! exposing the result.
//!
//! Both hellos carry 32-byte random nonces. The transcript (client hello
//! bytes, server nonce, server ephemeral key) is the KDF context and the
//! input to both confirmation tags.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sealwright_crypto::{Environment, KeyPair, KeyPairType, KnuthObfuscator, codec};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{
    engine::{AgreementEngine, LocalKeys, PeerKeys, Role},
    error::AgreementError,
    kdf, matrix,
    spec::AgreementSpec,
    types::{AgreementType, KdfType},
};

type HmacSha256 = Hmac<Sha256>;

/// Handshake message format version.
pub const MESSAGE_VERSION: u8 = 1;

/// Bytes of agreed key material produced unless configured otherwise.
pub const DEFAULT_OUTPUT_LENGTH: usize = 32;

const NONCE_SIZE: usize = 32;
const TAG_SIZE: usize = 32;

const KDF_CONTEXT_LABEL: &[u8] = b"sealwrightAgreementV1";
const CONFIRM_KEY_LABEL: &[u8] = b"sealwrightConfirmKeyV1";
const SERVER_CONFIRM_LABEL: &[u8] = b"sealwrightServerConfirm";
const CLIENT_CONFIRM_LABEL: &[u8] = b"sealwrightClientConfirm";

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgreementStatus {
    /// Fresh or reset
    Init,
    /// Client sent its hello
    ClientHelloSent,
    /// Server answered and awaits the client confirmation
    ServerHelloSent,
    /// Client sent its confirmation; result available
    ClientConfirmSent,
    /// Agreement finished; result available
    Complete,
}

#[derive(Serialize, Deserialize)]
struct ClientHello {
    version: u8,
    key_pair_type: i32,
    agreement_type: i32,
    kdf_type: i32,
    with_confirm: bool,
    nonce: [u8; NONCE_SIZE],
    ephemeral: Option<Vec<u8>>,
}

#[derive(Serialize, Deserialize)]
struct ServerHello {
    version: u8,
    nonce: [u8; NONCE_SIZE],
    ephemeral: Option<Vec<u8>>,
    confirm_tag: Option<[u8; TAG_SIZE]>,
}

#[derive(Serialize, Deserialize)]
struct ClientConfirm {
    version: u8,
    tag: [u8; TAG_SIZE],
}

/// Key confirmation material held by the server between its hello and the
/// client's confirmation.
struct PendingConfirm {
    key: Zeroizing<[u8; 32]>,
    transcript: Vec<u8>,
}

/// One side of a key agreement.
///
/// The same type plays either role: a client calls
/// [`create_client_hello`](Self::create_client_hello) then
/// [`accept_server_hello`](Self::accept_server_hello); a server calls
/// [`accept_client_hello`](Self::accept_client_hello) then, when confirming,
/// [`accept_client_confirm`](Self::accept_client_confirm).
pub struct Handshake<E: Environment, G: AgreementEngine> {
    spec: AgreementSpec,
    engine: G,
    env: E,
    obfuscator: KnuthObfuscator,
    output_length: usize,
    status: AgreementStatus,
    own_key_pair: Option<KeyPair>,
    ephemeral: Option<KeyPair>,
    client_hello: Option<Vec<u8>>,
    pending_confirm: Option<PendingConfirm>,
    result: Option<Zeroizing<Vec<u8>>>,
}

impl<E: Environment, G: AgreementEngine> Handshake<E, G> {
    /// Create a handshake for `spec`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedSpec` if the spec is invalid, the keypair family cannot
    ///   run the agreement, or `engine` does not implement it
    pub fn new(spec: AgreementSpec, engine: G, env: E) -> Result<Self, AgreementError> {
        spec.validate()?;

        if !matrix::is_supported_agreement(spec.key_pair_type(), spec.agreement_type()) {
            return Err(AgreementError::UnsupportedSpec {
                reason: format!(
                    "{} keys cannot run {}",
                    spec.key_pair_type(),
                    spec.agreement_type()
                ),
            });
        }

        if engine.key_pair_type() != spec.key_pair_type() || !engine.supports(spec.agreement_type())
        {
            return Err(AgreementError::UnsupportedSpec {
                reason: format!("no engine for {spec}"),
            });
        }

        Ok(Self {
            spec,
            engine,
            env,
            obfuscator: KnuthObfuscator::default(),
            output_length: DEFAULT_OUTPUT_LENGTH,
            status: AgreementStatus::Init,
            own_key_pair: None,
            ephemeral: None,
            client_hello: None,
            pending_confirm: None,
            result: None,
        })
    }

    /// Use `obfuscator` for the identifiers in the client hello. Both sides
    /// must use the same one.
    #[must_use]
    pub fn with_obfuscator(mut self, obfuscator: KnuthObfuscator) -> Self {
        self.obfuscator = obfuscator;
        self
    }

    /// Produce `length` bytes of agreed key material.
    #[must_use]
    pub fn with_output_length(mut self, length: usize) -> Self {
        self.output_length = length;
        self
    }

    /// Agreement parameters.
    pub fn spec(&self) -> &AgreementSpec {
        &self.spec
    }

    /// Current state.
    pub fn status(&self) -> AgreementStatus {
        self.status
    }

    /// Start the handshake as client.
    ///
    /// `client_key_pair` must carry its private half; a copy is kept until the
    /// server hello arrives.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless in `Init`
    /// - `InvalidKeyPair` if the keypair family differs from the spec or has
    ///   no private key
    pub fn create_client_hello(
        &mut self,
        client_key_pair: &KeyPair,
    ) -> Result<Vec<u8>, AgreementError> {
        self.require(AgreementStatus::Init, "create_client_hello")?;
        self.check_local_key_pair(client_key_pair)?;

        let ephemeral = self.fresh_ephemeral(Role::Client);
        let hello = ClientHello {
            version: MESSAGE_VERSION,
            key_pair_type: self.obfuscator.encode(self.spec.key_pair_type()),
            agreement_type: self.obfuscator.encode(self.spec.agreement_type()),
            kdf_type: self.obfuscator.encode(self.spec.kdf_type()),
            with_confirm: self.spec.with_confirm(),
            nonce: self.env.random_array::<NONCE_SIZE>(),
            ephemeral: ephemeral.as_ref().map(|pair| pair.public_key().to_vec()),
        };
        let bytes = codec::encode(&hello)?;

        self.own_key_pair = Some(client_key_pair.clone());
        self.ephemeral = ephemeral;
        self.client_hello = Some(bytes.clone());
        self.transition(AgreementStatus::ClientHelloSent);

        Ok(bytes)
    }

    /// Answer a client hello as server.
    ///
    /// `client_key_pair` is the client's public keypair; `server_key_pair`
    /// must carry its private half. Returns the server hello.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless in `Init`
    /// - `MalformedMessage`, `UnsupportedVersion` or `Crypto` if the hello
    ///   cannot be parsed
    /// - `SpecMismatch` if the client runs a different spec
    /// - `InvalidKeyPair` if the server keypair is unusable
    pub fn accept_client_hello(
        &mut self,
        client_key_pair: &KeyPair,
        server_key_pair: &KeyPair,
        msg: &[u8],
    ) -> Result<Vec<u8>, AgreementError> {
        self.require(AgreementStatus::Init, "accept_client_hello")?;
        self.check_local_key_pair(server_key_pair)?;

        let hello: ClientHello = decode_message(msg, "client hello")?;
        check_version(hello.version)?;
        self.check_client_spec(&hello)?;
        self.check_ephemeral(hello.ephemeral.as_deref(), Role::Client)?;

        let ephemeral = self.fresh_ephemeral(Role::Server);
        let nonce = self.env.random_array::<NONCE_SIZE>();
        let ephemeral_public = ephemeral.as_ref().map(|pair| pair.public_key().to_vec());

        let secret = self.engine.shared_secret(
            self.spec.agreement_type(),
            LocalKeys { key_pair: server_key_pair, ephemeral: ephemeral.as_ref() },
            PeerKeys { key_pair: client_key_pair, ephemeral: hello.ephemeral.as_deref() },
        )?;
        let transcript = transcript(msg, &nonce, ephemeral_public.as_deref());
        let result = self.derive_result(&secret, &transcript)?;

        let confirm_tag = if self.spec.with_confirm() {
            let key = confirm_key(&secret, &transcript);
            let tag = confirm_tag(&key, SERVER_CONFIRM_LABEL, &transcript);
            self.pending_confirm = Some(PendingConfirm { key, transcript });
            Some(tag)
        } else {
            None
        };

        let reply = ServerHello {
            version: MESSAGE_VERSION,
            nonce,
            ephemeral: ephemeral_public,
            confirm_tag,
        };
        let bytes = codec::encode(&reply)?;

        self.result = Some(result);
        if self.spec.with_confirm() {
            self.transition(AgreementStatus::ServerHelloSent);
        } else {
            self.transition(AgreementStatus::Complete);
        }

        Ok(bytes)
    }

    /// Process the server hello as client.
    ///
    /// Returns the client confirmation to send when the spec confirms, or
    /// `None` when the agreement is already complete.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless in `ClientHelloSent`
    /// - `MalformedMessage` or `UnsupportedVersion` if the hello cannot be
    ///   parsed or its shape does not fit the spec
    /// - `ConfirmationFailed` if the server's tag does not verify; the
    ///   handshake is reset
    pub fn accept_server_hello(
        &mut self,
        server_key_pair: &KeyPair,
        msg: &[u8],
    ) -> Result<Option<Vec<u8>>, AgreementError> {
        self.require(AgreementStatus::ClientHelloSent, "accept_server_hello")?;

        let hello: ServerHello = decode_message(msg, "server hello")?;
        check_version(hello.version)?;
        self.check_ephemeral(hello.ephemeral.as_deref(), Role::Server)?;
        if hello.confirm_tag.is_some() != self.spec.with_confirm() {
            return Err(AgreementError::MalformedMessage {
                reason: "confirmation tag presence does not match spec".to_string(),
            });
        }

        let (Some(own_key_pair), Some(client_hello)) = (&self.own_key_pair, &self.client_hello)
        else {
            return Err(AgreementError::InvalidState {
                state: self.status,
                operation: "accept_server_hello".to_string(),
            });
        };

        let secret = self.engine.shared_secret(
            self.spec.agreement_type(),
            LocalKeys { key_pair: own_key_pair, ephemeral: self.ephemeral.as_ref() },
            PeerKeys { key_pair: server_key_pair, ephemeral: hello.ephemeral.as_deref() },
        )?;
        let transcript = transcript(client_hello, &hello.nonce, hello.ephemeral.as_deref());
        let result = self.derive_result(&secret, &transcript)?;

        let reply = match hello.confirm_tag {
            Some(server_tag) => {
                let key = confirm_key(&secret, &transcript);
                if !verify_tag(&key, SERVER_CONFIRM_LABEL, &transcript, &server_tag) {
                    tracing::warn!(spec = %self.spec, "server confirmation tag rejected");
                    self.reset();
                    return Err(AgreementError::ConfirmationFailed);
                }

                let confirm = ClientConfirm {
                    version: MESSAGE_VERSION,
                    tag: confirm_tag(&key, CLIENT_CONFIRM_LABEL, &transcript),
                };
                Some(codec::encode(&confirm)?)
            },
            None => None,
        };

        self.result = Some(result);
        self.discard_session_keys();
        if reply.is_some() {
            self.transition(AgreementStatus::ClientConfirmSent);
        } else {
            self.transition(AgreementStatus::Complete);
        }

        Ok(reply)
    }

    /// Verify the client confirmation as server.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless in `ServerHelloSent`
    /// - `MalformedMessage` or `UnsupportedVersion` if the message cannot be
    ///   parsed
    /// - `ConfirmationFailed` if the tag does not verify; the handshake is
    ///   reset
    pub fn accept_client_confirm(&mut self, msg: &[u8]) -> Result<(), AgreementError> {
        self.require(AgreementStatus::ServerHelloSent, "accept_client_confirm")?;

        let confirm: ClientConfirm = decode_message(msg, "client confirmation")?;
        check_version(confirm.version)?;

        let Some(pending) = &self.pending_confirm else {
            return Err(AgreementError::InvalidState {
                state: self.status,
                operation: "accept_client_confirm".to_string(),
            });
        };

        if !verify_tag(&pending.key, CLIENT_CONFIRM_LABEL, &pending.transcript, &confirm.tag) {
            tracing::warn!(spec = %self.spec, "client confirmation tag rejected");
            self.reset();
            return Err(AgreementError::ConfirmationFailed);
        }

        self.pending_confirm = None;
        self.transition(AgreementStatus::Complete);
        Ok(())
    }

    /// Agreed key material.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless in `Complete` or `ClientConfirmSent`
    pub fn result(&self) -> Result<&[u8], AgreementError> {
        match (self.status, &self.result) {
            (AgreementStatus::Complete | AgreementStatus::ClientConfirmSent, Some(result)) => {
                Ok(result.as_slice())
            },
            _ => Err(AgreementError::InvalidState {
                state: self.status,
                operation: "result".to_string(),
            }),
        }
    }

    /// Return to `Init`, wiping derived secrets and session keys.
    pub fn reset(&mut self) {
        self.discard_session_keys();
        self.pending_confirm = None;
        self.result = None;
        self.transition(AgreementStatus::Init);
    }

    fn discard_session_keys(&mut self) {
        self.own_key_pair = None;
        self.ephemeral = None;
        self.client_hello = None;
    }

    fn require(&self, expected: AgreementStatus, operation: &str) -> Result<(), AgreementError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(AgreementError::InvalidState {
                state: self.status,
                operation: operation.to_string(),
            })
        }
    }

    fn transition(&mut self, next: AgreementStatus) {
        tracing::debug!(from = ?self.status, to = ?next, spec = %self.spec, "handshake transition");
        self.status = next;
    }

    fn check_local_key_pair(&self, key_pair: &KeyPair) -> Result<(), AgreementError> {
        if key_pair.key_type() != self.spec.key_pair_type() {
            return Err(AgreementError::InvalidKeyPair {
                reason: format!(
                    "{} keypair for {} agreement",
                    key_pair.key_type(),
                    self.spec.key_pair_type()
                ),
            });
        }
        if !key_pair.has_private() {
            return Err(AgreementError::InvalidKeyPair {
                reason: "private key required".to_string(),
            });
        }
        Ok(())
    }

    fn check_client_spec(&self, hello: &ClientHello) -> Result<(), AgreementError> {
        let key_pair_type: KeyPairType = self.obfuscator.decode(hello.key_pair_type)?;
        let agreement_type: AgreementType = self.obfuscator.decode(hello.agreement_type)?;
        let kdf_type: KdfType = self.obfuscator.decode(hello.kdf_type)?;
        let theirs =
            AgreementSpec::new(key_pair_type, agreement_type, kdf_type, hello.with_confirm);

        if theirs == self.spec {
            Ok(())
        } else {
            Err(AgreementError::SpecMismatch {
                reason: format!("client runs {theirs}, server runs {}", self.spec),
            })
        }
    }

    fn check_ephemeral(
        &self,
        ephemeral: Option<&[u8]>,
        sender: Role,
    ) -> Result<(), AgreementError> {
        let expected = self.engine.uses_ephemeral(self.spec.agreement_type(), sender);
        if ephemeral.is_some() == expected {
            Ok(())
        } else {
            Err(AgreementError::MalformedMessage {
                reason: format!(
                    "{sender:?} ephemeral key {} for {}",
                    if expected { "missing" } else { "unexpected" },
                    self.spec.agreement_type()
                ),
            })
        }
    }

    fn fresh_ephemeral(&self, role: Role) -> Option<KeyPair> {
        if !self.engine.uses_ephemeral(self.spec.agreement_type(), role) {
            return None;
        }
        let seed = Zeroizing::new(self.env.random_array::<32>());
        Some(self.engine.ephemeral_key_pair(&seed))
    }

    fn derive_result(
        &self,
        secret: &[u8],
        transcript: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, AgreementError> {
        let mut info = Vec::with_capacity(KDF_CONTEXT_LABEL.len() + transcript.len());
        info.extend_from_slice(KDF_CONTEXT_LABEL);
        info.extend_from_slice(transcript);
        kdf::derive(self.spec.kdf_type(), secret, &info, self.output_length)
    }
}

impl<E: Environment, G: AgreementEngine> std::fmt::Debug for Handshake<E, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake")
            .field("spec", &self.spec)
            .field("status", &self.status)
            .field("output_length", &self.output_length)
            .finish_non_exhaustive()
    }
}

fn decode_message<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, AgreementError> {
    codec::decode(bytes)
        .map_err(|e| AgreementError::MalformedMessage { reason: format!("{what}: {e}") })
}

fn check_version(version: u8) -> Result<(), AgreementError> {
    if version == MESSAGE_VERSION {
        Ok(())
    } else {
        Err(AgreementError::UnsupportedVersion(version))
    }
}

fn transcript(
    client_hello: &[u8],
    server_nonce: &[u8],
    server_ephemeral: Option<&[u8]>,
) -> Vec<u8> {
    let ephemeral = server_ephemeral.unwrap_or_default();
    let mut transcript =
        Vec::with_capacity(client_hello.len() + server_nonce.len() + ephemeral.len());
    transcript.extend_from_slice(client_hello);
    transcript.extend_from_slice(server_nonce);
    transcript.extend_from_slice(ephemeral);
    transcript
}

fn confirm_key(secret: &[u8], transcript: &[u8]) -> Zeroizing<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(Some(transcript), secret);
    let mut key = Zeroizing::new([0u8; 32]);
    let Ok(()) = hkdf.expand(CONFIRM_KEY_LABEL, key.as_mut_slice()) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    key
}

fn confirm_mac(key: &[u8; 32], label: &[u8], transcript: &[u8]) -> HmacSha256 {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(label);
    mac.update(transcript);
    mac
}

fn confirm_tag(key: &[u8; 32], label: &[u8], transcript: &[u8]) -> [u8; TAG_SIZE] {
    confirm_mac(key, label, transcript).finalize().into_bytes().into()
}

fn verify_tag(key: &[u8; 32], label: &[u8], transcript: &[u8], tag: &[u8]) -> bool {
    confirm_mac(key, label, transcript).verify_slice(tag).is_ok()
}
