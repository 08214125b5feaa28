//! Sealwright command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Create a password-locked keyset
//! sealwright new-key-set vault.lock
//!
//! # Encrypt and decrypt files with it
//! sealwright encrypt vault.lock notes.txt notes.sealed
//! sealwright decrypt vault.lock notes.sealed notes.txt
//!
//! # Which KDFs may XDH keys use?
//! sealwright kdf-matrix --key-pair-type XDH
//! ```

use std::{
    io::{self, Write},
    num::NonZeroU32,
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use sealwright_agree::{AgreementType, KdfType};
use sealwright_cli::{TerminalDialog, commands};
use sealwright_crypto::{KeyPairType, KeySetSpec, SymKeyType, SystemEnv};
use sealwright_lock::{
    LockFactory, PasswordLockSpec, PasswordManager, PasswordManagerConfig, RetryPolicy,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sealwright password locks and key agreement
#[derive(Parser, Debug)]
#[command(name = "sealwright")]
#[command(about = "Password-locked keysets, keypairs and key agreement")]
#[command(version)]
struct Args {
    /// PBKDF2 work factor for new locks, in units of 1024 iterations
    #[arg(short = 'k', long, default_value_t = PasswordLockSpec::DEFAULT_K_ITERATIONS)]
    k_iterations: u8,

    /// Cipher for the keyset that wraps new locks
    #[arg(long, default_value = "xchacha20poly1305")]
    wrap_cipher: SymKeyType,

    /// Cascade steps for the keyset that wraps new locks
    #[arg(long, default_value_t = 1)]
    wrap_steps: u8,

    /// Give up after this many wrong passwords (unlimited if omitted)
    #[arg(long)]
    max_attempts: Option<NonZeroU32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a keyset and lock it under a new password
    NewKeySet {
        /// Where to write the lock
        lock: PathBuf,

        /// Keyset cipher
        #[arg(long, default_value = "xchacha20poly1305")]
        cipher: SymKeyType,

        /// Keyset cascade steps
        #[arg(long, default_value_t = KeySetSpec::DEFAULT_CIPHER_STEPS)]
        steps: u8,
    },

    /// Generate an X25519 keypair locked with an existing lock's password
    NewKeyPair {
        /// Lock whose password to reuse
        reference: PathBuf,

        /// Where to write the new lock
        lock: PathBuf,
    },

    /// Show a lock's kind and parameters without opening it
    Inspect {
        /// Lock to describe
        lock: PathBuf,
    },

    /// Encrypt a file with a locked keyset
    Encrypt {
        /// Keyset lock
        lock: PathBuf,
        /// Plaintext file
        input: PathBuf,
        /// Ciphertext file
        output: PathBuf,
    },

    /// Decrypt a file with a locked keyset
    Decrypt {
        /// Keyset lock
        lock: PathBuf,
        /// Ciphertext file
        input: PathBuf,
        /// Plaintext file
        output: PathBuf,
    },

    /// List allowed KDFs per keypair family and agreement
    KdfMatrix {
        /// Restrict to one family
        #[arg(long)]
        key_pair_type: Option<KeyPairType>,
    },

    /// Run a local X25519 handshake and print the agreed key
    Handshake {
        /// Agreement scheme
        #[arg(long, default_value = "BASIC")]
        agreement: AgreementType,

        /// KDF applied to the shared secret
        #[arg(long, default_value = "SHA256HKDF")]
        kdf: KdfType,

        /// Finish with key confirmation
        #[arg(long)]
        confirm: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let lock_spec = PasswordLockSpec::new(
        args.k_iterations,
        commands::key_set_spec(args.wrap_cipher, args.wrap_steps)?,
    );
    lock_spec.validate()?;

    let retry = match args.max_attempts {
        Some(max) => RetryPolicy::with_max_attempts(max),
        None => RetryPolicy::unlimited(),
    };
    let config = PasswordManagerConfig { lock_spec, retry };

    let env = SystemEnv::new();
    let dialog = TerminalDialog::new(io::stdin().lock(), io::stderr());
    let mut manager = PasswordManager::with_factory(LockFactory::new(env.clone()), dialog, config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.command {
        Command::NewKeySet { lock, cipher, steps } => {
            let spec = commands::key_set_spec(cipher, steps)?;
            commands::new_key_set(&mut manager, spec, &lock, &mut out)?;
        },
        Command::NewKeyPair { reference, lock } => {
            commands::new_key_pair(&mut manager, &reference, &lock, &mut out)?;
        },
        Command::Inspect { lock } => commands::inspect(&manager, &lock, &mut out)?,
        Command::Encrypt { lock, input, output } => {
            commands::encrypt(&mut manager, &lock, &input, &output)?;
        },
        Command::Decrypt { lock, input, output } => {
            commands::decrypt(&mut manager, &lock, &input, &output)?;
        },
        Command::KdfMatrix { key_pair_type } => commands::kdf_matrix(key_pair_type, &mut out)?,
        Command::Handshake { agreement, kdf, confirm } => {
            commands::handshake(&env, agreement, kdf, confirm, &mut out)?;
        },
    }

    out.flush()?;
    Ok(())
}
