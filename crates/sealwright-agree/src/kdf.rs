//! Key derivation from a raw shared secret.
//!
//! - X9.63: `H(Z || counter || info)` blocks, counter from 1
//! - Concatenation (SP 800-56): `H(counter || Z || info)` blocks, counter
//!   from 1
//! - HKDF: extract with no salt, expand with `info`
//!
//! `NONE` hands back the raw secret, truncated to the requested length.

use hkdf::Hkdf;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use crate::{
    error::AgreementError,
    types::{KdfFamily, KdfType},
};

/// Derive `length` bytes of key material from `secret` and `info`.
///
/// # Errors
///
/// - `Kdf` if `length` is zero or larger than the KDF can produce
pub fn derive(
    kdf_type: KdfType,
    secret: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, AgreementError> {
    if length == 0 {
        return Err(AgreementError::Kdf { reason: "zero-length output requested".to_string() });
    }

    match kdf_type {
        KdfType::None => raw(secret, length),
        KdfType::Sha256Kdf | KdfType::Sha256Ckdf => {
            counter_kdf::<Sha256>(kdf_type.family(), secret, info, length)
        },
        KdfType::Sha512Kdf | KdfType::Sha512Ckdf => {
            counter_kdf::<Sha512>(kdf_type.family(), secret, info, length)
        },
        KdfType::Sha256Hkdf => {
            expand(length, |out| Hkdf::<Sha256>::new(None, secret).expand(info, out))
        },
        KdfType::Sha512Hkdf => {
            expand(length, |out| Hkdf::<Sha512>::new(None, secret).expand(info, out))
        },
    }
}

fn raw(secret: &[u8], length: usize) -> Result<Zeroizing<Vec<u8>>, AgreementError> {
    secret.get(..length).map(|bytes| Zeroizing::new(bytes.to_vec())).ok_or_else(|| {
        AgreementError::Kdf {
            reason: format!("raw secret has {} bytes, {length} requested", secret.len()),
        }
    })
}

fn counter_kdf<D: Digest>(
    family: KdfFamily,
    secret: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, AgreementError> {
    let block_len = <D as Digest>::output_size();
    let blocks = length.div_ceil(block_len);
    let Ok(last) = u32::try_from(blocks) else {
        return Err(AgreementError::Kdf { reason: format!("{length} bytes exceeds counter range") });
    };

    let mut output = Zeroizing::new(Vec::with_capacity(blocks * block_len));
    for counter in 1..=last {
        let mut hasher = D::new();
        if family == KdfFamily::Concat {
            hasher.update(counter.to_be_bytes());
            hasher.update(secret);
        } else {
            hasher.update(secret);
            hasher.update(counter.to_be_bytes());
        }
        hasher.update(info);
        output.extend_from_slice(&hasher.finalize());
    }

    output.truncate(length);
    Ok(output)
}

fn expand(
    length: usize,
    fill: impl FnOnce(&mut [u8]) -> Result<(), hkdf::InvalidLength>,
) -> Result<Zeroizing<Vec<u8>>, AgreementError> {
    let mut output = Zeroizing::new(vec![0u8; length]);
    fill(output.as_mut_slice())
        .map_err(|_| AgreementError::Kdf { reason: format!("{length} bytes exceeds HKDF limit") })?;
    Ok(output)
}
