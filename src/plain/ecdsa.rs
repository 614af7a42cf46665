//! ECDSA P-256 signature verification.

use base64::Engine as _;
use p256::{
    ecdsa::{Signature, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint as _,
    pkcs8::DecodePublicKey,
};
use sha2::{Digest, Sha256};
use signature::Verifier as _;

use crate::{
    error::{Error, Result},
    message::SignatureVerifier,
};

/// A public ECDSA P-256 key.
#[derive(Debug, Clone)]
pub struct EcdsaKey {
    key: VerifyingKey,
    id: String,
}

impl EcdsaKey {
    pub(crate) fn from_pem(pem: &str) -> Result<Self> {
        let key = VerifyingKey::from_public_key_pem(pem).map_err(|_| Error::UnsupportedKeyType)?;

        // stable identifier: SHA-256 over the uncompressed SEC1 point
        let point = key.to_encoded_point(false);
        let digest = Sha256::digest(point.as_bytes());
        let id = base64::engine::general_purpose::URL_SAFE.encode(digest);

        Ok(Self { key, id })
    }

    /// Returns the fingerprint of the key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Verifies the signature of the given data using the public key.
    ///
    /// The signature is base64 and decodes to `r ‖ s`, two equally sized
    /// big-endian scalars; DER signatures are not accepted. Every failure
    /// is reported as `missing valid signature`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let sig_bytes = base64::engine::general_purpose::STANDARD
            .decode(signature)
            .map_err(|_| Error::MissingValidSignature)?;

        if sig_bytes.is_empty() || sig_bytes.len() % 2 != 0 {
            return Err(Error::MissingValidSignature);
        }

        let half = sig_bytes.len() / 2;

        let r = normalize_scalar(&sig_bytes[..half]).ok_or(Error::MissingValidSignature)?;
        let s = normalize_scalar(&sig_bytes[half..]).ok_or(Error::MissingValidSignature)?;

        let signature = Signature::from_scalars(r, s).map_err(|_| Error::MissingValidSignature)?;

        self.key
            .verify(data, &signature)
            .map_err(|_| Error::MissingValidSignature)
    }
}

impl SignatureVerifier for EcdsaKey {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        EcdsaKey::verify(self, data, signature)
    }
}

/// Left-pads (or strips leading zeros from) a big-endian scalar to the
/// 32 bytes P-256 expects.
fn normalize_scalar(bytes: &[u8]) -> Option<[u8; 32]> {
    let stripped: &[u8] = {
        let mut rest = bytes;
        while let Some((&0, tail)) = rest.split_first() {
            rest = tail;
        }
        rest
    };

    if stripped.len() > 32 {
        return None;
    }

    let mut out = [0u8; 32];
    out[32 - stripped.len()..].copy_from_slice(stripped);

    Some(out)
}
