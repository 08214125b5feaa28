//! Password lock parameters.

use std::fmt;

use sealwright_crypto::KeySetSpec;
use serde::{Deserialize, Serialize};

use crate::error::LockError;

/// Parameters of a password lock: PBKDF2 work factor plus the shape of the
/// keyset that wraps the payload.
///
/// # Invariants
///
/// Valid iff `k_iterations` is within
/// [`PasswordLockSpec::MIN_K_ITERATIONS`]..=[`PasswordLockSpec::MAX_K_ITERATIONS`]
/// and the keyset spec is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PasswordLockSpec {
    k_iterations: u8,
    key_set_spec: KeySetSpec,
}

impl PasswordLockSpec {
    /// PBKDF2 iterations per unit of `k_iterations`
    pub const ITERATIONS_PER_K: u32 = 1024;
    /// Smallest work factor
    pub const MIN_K_ITERATIONS: u8 = 1;
    /// Largest work factor
    pub const MAX_K_ITERATIONS: u8 = 64;
    /// Work factor used by [`PasswordLockSpec::default`]
    pub const DEFAULT_K_ITERATIONS: u8 = 16;

    /// Create a spec. The result may be invalid; check with
    /// [`PasswordLockSpec::is_valid`].
    pub fn new(k_iterations: u8, key_set_spec: KeySetSpec) -> Self {
        Self { k_iterations, key_set_spec }
    }

    /// Work factor in units of 1024 PBKDF2 iterations.
    pub fn k_iterations(&self) -> u8 {
        self.k_iterations
    }

    /// Actual PBKDF2 iteration count.
    pub fn iterations(&self) -> u32 {
        u32::from(self.k_iterations) * Self::ITERATIONS_PER_K
    }

    /// Shape of the wrapping keyset.
    pub fn key_set_spec(&self) -> KeySetSpec {
        self.key_set_spec
    }

    /// True if both the work factor and the keyset spec are in range.
    pub fn is_valid(&self) -> bool {
        (Self::MIN_K_ITERATIONS..=Self::MAX_K_ITERATIONS).contains(&self.k_iterations)
            && self.key_set_spec.is_valid()
    }

    /// Reject an invalid spec.
    pub fn validate(&self) -> Result<(), LockError> {
        if !(Self::MIN_K_ITERATIONS..=Self::MAX_K_ITERATIONS).contains(&self.k_iterations) {
            return Err(LockError::InvalidSpec {
                reason: format!(
                    "k_iterations {} outside {}..={}",
                    self.k_iterations,
                    Self::MIN_K_ITERATIONS,
                    Self::MAX_K_ITERATIONS
                ),
            });
        }

        self.key_set_spec
            .validate()
            .map_err(|err| LockError::InvalidSpec { reason: err.to_string() })
    }
}

impl Default for PasswordLockSpec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_K_ITERATIONS, KeySetSpec::default())
    }
}

impl fmt::Display for PasswordLockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pbkdf2x{}k/{}", self.k_iterations, self.key_set_spec)
    }
}
