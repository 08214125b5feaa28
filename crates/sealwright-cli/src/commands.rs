//! Command implementations.
//!
//! Every command runs against a [`PasswordManager`], so the same code path
//! serves the terminal binary and tests driving a scripted dialog.

use std::{fs, io::Write, path::Path};

use sealwright_agree::{
    AgreementSpec, AgreementType, Handshake, KdfType, X25519Engine, supported_agreements,
    supported_kdfs,
};
use sealwright_crypto::{
    Environment, KeyPair, KeyPairType, KeySet, KeySetSpec, Obfuscatable, SymKeyType,
};
use sealwright_lock::{DialogController, PasswordManager};

use crate::error::CliError;

/// Associated data bound into file ciphertexts.
const FILE_AAD: &[u8] = b"sealwrightFileV1";

/// Generate a keyset and lock it under a new password.
pub fn new_key_set<E: Environment, D: DialogController>(
    manager: &mut PasswordManager<E, D>,
    spec: KeySetSpec,
    lock_path: &Path,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let key_set = KeySet::generate(spec, manager.cache().factory().env())?;
    let lock = manager.new_key_set_lock(&key_set, &display(lock_path))?;

    write_file(lock_path, lock.bytes())?;
    writeln!(out, "wrote {} lock ({}) to {}", lock.kind(), lock.spec(), lock_path.display())?;
    Ok(())
}

/// Generate an X25519 keypair locked with the same password as `reference`.
pub fn new_key_pair<E: Environment, D: DialogController>(
    manager: &mut PasswordManager<E, D>,
    reference: &Path,
    lock_path: &Path,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let reference_bytes = read_file(reference)?;
    let key_pair = KeyPair::generate_x25519(manager.cache().factory().env());
    let lock = manager.similar_key_pair_lock(&key_pair, &reference_bytes, &display(reference))?;

    write_file(lock_path, lock.bytes())?;
    writeln!(
        out,
        "wrote {} lock to {} (public key {})",
        lock.kind(),
        lock_path.display(),
        hex::encode(key_pair.public_key())
    )?;
    Ok(())
}

/// Describe a lock without opening it.
pub fn inspect<E: Environment, D: DialogController>(
    manager: &PasswordManager<E, D>,
    lock_path: &Path,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let bytes = read_file(lock_path)?;
    let lock = manager.cache().factory().parse_lock(&bytes)?;

    writeln!(out, "kind:       {}", lock.kind())?;
    writeln!(out, "iterations: {}", lock.spec().iterations())?;
    writeln!(out, "keyset:     {}", lock.spec().key_set_spec())?;
    writeln!(out, "size:       {} bytes", lock.bytes().len())?;
    Ok(())
}

/// Encrypt `input` with the keyset held in a lock.
pub fn encrypt<E: Environment, D: DialogController>(
    manager: &mut PasswordManager<E, D>,
    lock_path: &Path,
    input: &Path,
    output: &Path,
) -> Result<(), CliError> {
    let key_set = open_key_set(manager, lock_path)?;
    let plaintext = read_file(input)?;

    let ciphertext = key_set.encrypt(&plaintext, FILE_AAD, manager.cache().factory().env());
    write_file(output, &ciphertext)
}

/// Decrypt `input` with the keyset held in a lock.
pub fn decrypt<E: Environment, D: DialogController>(
    manager: &mut PasswordManager<E, D>,
    lock_path: &Path,
    input: &Path,
    output: &Path,
) -> Result<(), CliError> {
    let key_set = open_key_set(manager, lock_path)?;
    let ciphertext = read_file(input)?;

    let plaintext = key_set.decrypt(&ciphertext, FILE_AAD)?;
    write_file(output, &plaintext)
}

/// Print the KDFs allowed per agreement, for one family or all of them.
pub fn kdf_matrix(
    key_pair_type: Option<KeyPairType>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let families = match key_pair_type {
        Some(kp) => vec![kp],
        None => KeyPairType::ALL.to_vec(),
    };

    for kp in families {
        for agreement in supported_agreements(kp) {
            let kdfs: Vec<String> =
                supported_kdfs(kp, *agreement).iter().map(ToString::to_string).collect();
            writeln!(out, "{:<10} {:<8} {}", kp.name(), agreement.name(), kdfs.join(" "))?;
        }
    }
    Ok(())
}

/// Run a local X25519 handshake between two fresh keypairs and print the
/// agreed key.
pub fn handshake<E: Environment>(
    env: &E,
    agreement: AgreementType,
    kdf: KdfType,
    confirm: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let spec = AgreementSpec::new(KeyPairType::Xdh, agreement, kdf, confirm);
    let mut client = Handshake::new(spec, X25519Engine::new(), env.clone())?;
    let mut server = Handshake::new(spec, X25519Engine::new(), env.clone())?;

    let client_keys = KeyPair::generate_x25519(env);
    let server_keys = KeyPair::generate_x25519(env);

    let client_hello = client.create_client_hello(&client_keys)?;
    let server_hello =
        server.accept_client_hello(&client_keys.public_only(), &server_keys, &client_hello)?;
    if let Some(confirm) = client.accept_server_hello(&server_keys.public_only(), &server_hello)? {
        server.accept_client_confirm(&confirm)?;
    }

    let agreed = client.result()?;
    if agreed != server.result()? {
        return Err(CliError::Config(format!("{spec}: parties disagree")));
    }

    writeln!(out, "{spec}: {}", hex::encode(agreed))?;
    Ok(())
}

/// Keyset spec from CLI flags.
pub fn key_set_spec(sym_key_type: SymKeyType, cipher_steps: u8) -> Result<KeySetSpec, CliError> {
    let spec = KeySetSpec::new(sym_key_type, cipher_steps);
    spec.validate()?;
    Ok(spec)
}

fn open_key_set<E: Environment, D: DialogController>(
    manager: &mut PasswordManager<E, D>,
    lock_path: &Path,
) -> Result<KeySet, CliError> {
    let bytes = read_file(lock_path)?;
    Ok(manager.resolve_key_set_lock(&bytes, &display(lock_path))?)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|source| CliError::File { path: display(path), source })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    fs::write(path, bytes).map_err(|source| CliError::File { path: display(path), source })
}

#[cfg(test)]
mod tests {
    use sealwright_crypto::env::test_utils::SeededEnv;
    use sealwright_lock::{
        LockFactory, PasswordLockSpec, PasswordManagerConfig, RetryPolicy,
        manager::test_utils::ScriptedDialog,
    };

    use super::*;

    fn manager(dialog: ScriptedDialog) -> PasswordManager<SeededEnv, ScriptedDialog> {
        let config = PasswordManagerConfig {
            lock_spec: PasswordLockSpec::new(1, KeySetSpec::new(SymKeyType::ChaCha20Poly1305, 1)),
            retry: RetryPolicy::unlimited(),
        };
        PasswordManager::with_factory(LockFactory::new(SeededEnv::new(7)), dialog, config).unwrap()
    }

    #[test]
    fn file_roundtrip_through_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("vault.lock");
        let plain = dir.path().join("plain.txt");
        let sealed = dir.path().join("plain.sealed");
        let opened = dir.path().join("plain.opened");
        fs::write(&plain, b"attack at dawn").unwrap();

        let mut creator = manager(ScriptedDialog::answering([b"Sn0wy-Owl!".as_slice()]));
        let spec = key_set_spec(SymKeyType::XChaCha20Poly1305, 2).unwrap();
        new_key_set(&mut creator, spec, &lock_path, &mut Vec::new()).unwrap();

        let mut user = manager(ScriptedDialog::answering([b"Sn0wy-Owl!".as_slice()]));
        encrypt(&mut user, &lock_path, &plain, &sealed).unwrap();
        decrypt(&mut user, &lock_path, &sealed, &opened).unwrap();

        assert_eq!(fs::read(&opened).unwrap(), b"attack at dawn");
        assert_eq!(user.dialog().shown, 1);
    }

    #[test]
    fn inspect_reports_kind_and_spec() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("vault.lock");

        let mut m = manager(ScriptedDialog::answering([b"pw".as_slice()]));
        new_key_set(&mut m, KeySetSpec::default(), &lock_path, &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        inspect(&m, &lock_path, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("kind:       keyset"));
        assert!(text.contains("iterations: 1024"));
    }

    #[test]
    fn key_pair_reuses_reference_password() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("vault.lock");
        let key_pair_lock = dir.path().join("id.lock");

        let mut creator = manager(ScriptedDialog::answering([b"pw".as_slice()]));
        new_key_set(&mut creator, KeySetSpec::default(), &reference, &mut Vec::new()).unwrap();

        let mut fresh = manager(ScriptedDialog::answering([b"pw".as_slice()]));
        new_key_pair(&mut fresh, &reference, &key_pair_lock, &mut Vec::new()).unwrap();

        let bytes = fs::read(&key_pair_lock).unwrap();
        let pair = fresh.cache().factory().resolve_key_pair_lock(&bytes, b"pw").unwrap();
        assert_eq!(pair.key_type(), KeyPairType::Xdh);
    }

    #[test]
    fn missing_file_names_path() {
        let m = manager(ScriptedDialog::cancelling());
        let err = inspect(&m, Path::new("/nonexistent/vault.lock"), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().starts_with("/nonexistent/vault.lock:"));
    }

    #[test]
    fn matrix_for_one_family() {
        let mut out = Vec::new();
        kdf_matrix(Some(KeyPairType::Frodo), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("KEM"));
        assert!(text.trim_end().ends_with("NONE"));
    }

    #[test]
    fn local_handshake_prints_key() {
        let mut out = Vec::new();
        handshake(&SeededEnv::new(3), AgreementType::Unified, KdfType::Sha256Kdf, true, &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("XDH/UNIFIED/SHA256KDF+confirm: "));
        assert_eq!(text.trim_end().rsplit(' ').next().unwrap().len(), 64);
    }
}
