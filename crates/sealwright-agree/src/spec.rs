//! Agreement parameters.

use std::fmt;

use sealwright_crypto::KeyPairType;

use crate::{
    error::AgreementError,
    matrix,
    types::{AgreementType, KdfType},
};

/// Everything both parties must agree on before a handshake.
///
/// Validity is computed once at construction: the KDF must be allowed by the
/// compatibility matrix, and key confirmation may only be requested for
/// schemes that support it (UNIFIED, MQV, SM2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgreementSpec {
    key_pair_type: KeyPairType,
    agreement_type: AgreementType,
    kdf_type: KdfType,
    with_confirm: bool,
    is_valid: bool,
}

impl AgreementSpec {
    /// Create a spec. The result may be invalid; check with
    /// [`AgreementSpec::is_valid`].
    pub fn new(
        key_pair_type: KeyPairType,
        agreement_type: AgreementType,
        kdf_type: KdfType,
        with_confirm: bool,
    ) -> Self {
        let is_valid = matrix::is_supported_kdf(key_pair_type, agreement_type, kdf_type)
            && (!with_confirm || agreement_type.allows_confirmation());

        Self { key_pair_type, agreement_type, kdf_type, with_confirm, is_valid }
    }

    /// Keypair family both parties use.
    pub fn key_pair_type(&self) -> KeyPairType {
        self.key_pair_type
    }

    /// Agreement scheme.
    pub fn agreement_type(&self) -> AgreementType {
        self.agreement_type
    }

    /// KDF applied to the shared secret.
    pub fn kdf_type(&self) -> KdfType {
        self.kdf_type
    }

    /// True if the handshake ends with key confirmation.
    pub fn with_confirm(&self) -> bool {
        self.with_confirm
    }

    /// True if the combination is legal.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Reject an invalid spec, naming the failed check.
    pub fn validate(&self) -> Result<(), AgreementError> {
        if !matrix::is_supported_kdf(self.key_pair_type, self.agreement_type, self.kdf_type) {
            return Err(AgreementError::UnsupportedSpec {
                reason: format!(
                    "{} not allowed for {}/{}",
                    self.kdf_type, self.key_pair_type, self.agreement_type
                ),
            });
        }

        if self.with_confirm && !self.agreement_type.allows_confirmation() {
            return Err(AgreementError::UnsupportedSpec {
                reason: format!("{} does not support key confirmation", self.agreement_type),
            });
        }

        Ok(())
    }
}

impl fmt::Display for AgreementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.key_pair_type, self.agreement_type, self.kdf_type)?;
        if self.with_confirm {
            f.write_str("+confirm")?;
        }
        Ok(())
    }
}
