//! CBOR helpers shared by persisted payloads.
//!
//! Payload records are CBOR because it is self-describing and needs no code
//! generation. Decoding never trusts input: every failure maps to
//! [`CryptoError::Encoding`]. Input must hold exactly one CBOR value, so each
//! value has a single byte representation.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::CryptoError;

/// Encode `value` as CBOR.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CryptoError> {
    let mut encoded = Vec::new();
    ciborium::ser::into_writer(value, &mut encoded)
        .map_err(|e| CryptoError::Encoding { reason: format!("CBOR encode failed: {e}") })?;
    Ok(encoded)
}

/// Decode a CBOR value, rejecting bytes left after it.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CryptoError> {
    let mut rest = bytes;
    let value = ciborium::de::from_reader(&mut rest)
        .map_err(|e| CryptoError::Encoding { reason: format!("CBOR decode failed: {e}") })?;

    if !rest.is_empty() {
        return Err(CryptoError::Encoding {
            reason: format!("{} trailing bytes after CBOR value", rest.len()),
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: i32,
        salt: [u8; 32],
        body: Vec<u8>,
    }

    #[test]
    fn roundtrip() {
        let original = Sample { id: -7, salt: [0xAB; 32], body: vec![1, 2, 3] };
        let decoded: Sample = decode(&encode(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn garbage_is_rejected() {
        let result = decode::<Sample>(&[0xFF, 0x00, 0x13]);
        assert!(matches!(result, Err(CryptoError::Encoding { .. })));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = encode(&Sample { id: 1, salt: [0; 32], body: vec![9] }).unwrap();
        encoded.extend_from_slice(b"garbage");

        let result = decode::<Sample>(&encoded);
        assert_eq!(
            result.unwrap_err(),
            CryptoError::Encoding { reason: "7 trailing bytes after CBOR value".to_string() }
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(decode::<Sample>(&[]).is_err());
    }
}
