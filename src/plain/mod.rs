//! Plain (non-PGP) public key management.
//!
//! Some callers authenticate with bare asymmetric keys instead of OpenPGP
//! certificates. This module parses PEM-encoded `PUBLIC KEY` blocks and
//! hands back a verifier; only ECDSA P-256 keys are supported.

mod ecdsa;

pub use ecdsa::EcdsaKey;

use crate::error::{Error, Result};

/// Creates a key from the PEM encoded data.
///
/// # Errors
///
/// Returns [`Error::InvalidPublicKeyPem`] when the data is not a PEM
/// `PUBLIC KEY` block and [`Error::UnsupportedKeyType`] when the block holds
/// anything other than an ECDSA P-256 key.
pub fn parse_key(data: &[u8]) -> Result<EcdsaKey> {
    let pem = std::str::from_utf8(data).map_err(|_| Error::InvalidPublicKeyPem)?;

    if !pem.contains("-----BEGIN PUBLIC KEY-----") {
        return Err(Error::InvalidPublicKeyPem);
    }

    EcdsaKey::from_pem(pem)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNATURE: &str =
        "yTEFDFIsNAoTD6TdcoJQtek1giToLxG/eRmcNWBgGp6CRDydj5WPh4Yeq/MSwrqPsWRFESa+3Lfegd1tJ2dN6g==";

    const PUBLIC_KEY: &str = "-----BEGIN PUBLIC KEY-----
MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAE8N0YkTeVTfD8xgJsjSMgvAmZquzv
LwfQb9Oa7fBNdyIiS2GPVzSFQtcIYbxBYBzvEY8RZjteEf7e/c/WWznGTQ==
-----END PUBLIC KEY-----";

    #[test]
    fn test_ecdsa_signature() {
        let key = parse_key(PUBLIC_KEY.as_bytes()).unwrap();

        key.verify(b"hi there", SIGNATURE.as_bytes()).unwrap();
    }

    #[test]
    fn test_ecdsa_signature_rejected() {
        let key = parse_key(PUBLIC_KEY.as_bytes()).unwrap();

        let err = key.verify(b"hi there!", SIGNATURE.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "missing valid signature");
    }

    #[test]
    fn test_not_pem() {
        let err = parse_key(b"garbage").unwrap_err();
        assert_eq!(err.to_string(), "failed to decode PEM block containing public key");
    }
}
