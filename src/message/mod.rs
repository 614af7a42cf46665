//! Signing wire format.
//!
//! Outbound messages carry their identity in three metadata headers: a Unix
//! timestamp, a canonical payload (RPC binding only), and a signature token
//! of the form `siderov1 <identity> <fingerprint> <base64-signature>`. Two
//! transport bindings share the grammar:
//!
//! - [`rpc`]: metadata-framed RPC messages. The signature covers a JSON
//!   payload built from a fixed list of metadata headers plus the fully
//!   qualified method name.
//! - [`http`]: plain HTTP requests. The signature covers
//!   `METHOD\nREQUEST-URI\nTIMESTAMP\nHEX(SHA256(body))`; there is no
//!   payload header.
//!
//! Replay protection is purely timestamp-window based: signer and verifier
//! agree on a ±5 minute skew.

pub mod http;
pub mod payload;
pub mod rpc;

pub use http::HttpMessage;
pub use payload::RpcPayload;
pub use rpc::RpcMessage;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine as _;

use crate::error::{Error, Result};

/// Header name for the signature.
pub const SIGNATURE_HEADER_KEY: &str = "x-sidero-signature";

/// Header name for the timestamp.
pub const TIMESTAMP_HEADER_KEY: &str = "x-sidero-timestamp";

/// Header name for the signed payload.
pub const PAYLOAD_HEADER_KEY: &str = "x-sidero-payload";

/// `authorization` header name.
pub const AUTHORIZATION_HEADER_KEY: &str = "authorization";

/// Prefix for the `authorization` header value.
pub const BEARER_PREFIX: &str = "Bearer ";

/// The sole supported signature version.
pub const SIGNATURE_VERSION_V1: &str = "siderov1";

/// Well-known metadata keys which are part of the signed payload.
pub const NODES_HEADER_KEY: &str = "nodes";
/// See [`NODES_HEADER_KEY`].
pub const SELECTORS_HEADER_KEY: &str = "selectors";
/// See [`NODES_HEADER_KEY`].
pub const FIELD_SELECTORS_HEADER_KEY: &str = "fieldSelectors";
/// See [`NODES_HEADER_KEY`].
pub const RUNTIME_HEADER_KEY: &str = "runtime";
/// See [`NODES_HEADER_KEY`].
pub const CONTEXT_HEADER_KEY: &str = "context";
/// See [`NODES_HEADER_KEY`].
pub const CLUSTER_HEADER_KEY: &str = "cluster";
/// See [`NODES_HEADER_KEY`].
pub const NAMESPACE_HEADER_KEY: &str = "namespace";
/// See [`NODES_HEADER_KEY`].
pub const UID_HEADER_KEY: &str = "uid";

/// Metadata headers whose values are covered by the RPC signature, in
/// canonical order. Headers absent from the message are signed as empty
/// value lists.
pub const INCLUDED_HEADERS: &[&str] = &[
    TIMESTAMP_HEADER_KEY,
    NODES_HEADER_KEY,
    SELECTORS_HEADER_KEY,
    FIELD_SELECTORS_HEADER_KEY,
    RUNTIME_HEADER_KEY,
    CONTEXT_HEADER_KEY,
    CLUSTER_HEADER_KEY,
    NAMESPACE_HEADER_KEY,
    UID_HEADER_KEY,
    AUTHORIZATION_HEADER_KEY,
];

pub(crate) const TIMESTAMP_ALLOWED_SKEW: Duration = Duration::from_secs(5 * 60);

/// A signer of an outbound message, e.g. a PGP private key.
pub trait Signer: Send + Sync {
    /// Stable identifier of the verifying key.
    fn fingerprint(&self) -> String;

    /// Produces a detached signature over the given data.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// A verifier of a message signature, e.g. a PGP public key.
pub trait SignatureVerifier: Send + Sync {
    /// Verifies a detached signature over the given data.
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()>;
}

/// A parsed signature header.
#[derive(Debug, Clone)]
pub struct Signature {
    /// Identity of the signer, an email-shaped string.
    pub identity: String,
    /// Fingerprint of the key that produced the signature.
    pub key_fingerprint: String,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

/// Parses a signature header value.
///
/// An empty value is reported as [`Error::NotFound`] so that callers can
/// distinguish "no signature provided" from "malformed signature".
pub(crate) fn parse_signature(value: &str) -> Result<Signature> {
    if value.is_empty() {
        return Err(Error::NotFound(SIGNATURE_HEADER_KEY.to_owned()));
    }

    let parts: Vec<&str> = value.split(' ').collect();
    if parts.len() != 4 {
        return Err(Error::MalformedSignatureHeader(value.to_owned()));
    }

    if parts[0] != SIGNATURE_VERSION_V1 {
        return Err(Error::UnsupportedSignatureVersion(parts[0].to_owned()));
    }

    let signature = base64::engine::general_purpose::STANDARD.decode(parts[3])?;

    Ok(Signature {
        identity: parts[1].to_owned(),
        key_fingerprint: parts[2].to_owned(),
        signature,
    })
}

/// Renders the signature header value for the given signer.
pub(crate) fn signature_header_value(identity: &str, signer: &dyn Signer, signature: &[u8]) -> String {
    format!(
        "{SIGNATURE_VERSION_V1} {identity} {} {}",
        signer.fingerprint(),
        base64::engine::general_purpose::STANDARD.encode(signature),
    )
}

/// Parses a timestamp header value into Unix seconds.
pub(crate) fn parse_timestamp(value: &str) -> Result<i64> {
    if value.is_empty() {
        return Err(Error::NotFound(TIMESTAMP_HEADER_KEY.to_owned()));
    }

    Ok(value.parse::<i64>()?)
}

/// Checks that the timestamp lies within the allowed skew of the local
/// clock, in either direction.
pub(crate) fn verify_timestamp(timestamp: i64) -> Result<()> {
    let now = unix_now();
    let skew = TIMESTAMP_ALLOWED_SKEW.as_secs() as i64;

    if timestamp > now + skew || timestamp < now - skew {
        return Err(Error::TimestampOutsideSkew(timestamp));
    }

    Ok(())
}

/// Current time as Unix seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
pub(crate) mod mock {
    use sha2::{Digest, Sha256};

    use super::*;

    /// Deterministic signer/verifier pair used by the binding tests:
    /// "signs" by hex-encoding a SHA-256 of the data.
    pub(crate) struct MockSignerVerifier;

    impl Signer for MockSignerVerifier {
        fn fingerprint(&self) -> String {
            "mock-fingerprint".to_owned()
        }

        fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
            Ok(hex::encode(Sha256::digest(data)).into_bytes())
        }
    }

    impl SignatureVerifier for MockSignerVerifier {
        fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
            let expected = self.sign(data)?;

            if expected != signature {
                return Err(Error::MissingValidSignature);
            }

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signature() {
        let value = format!("siderov1 test@example.com aabbcc {}", {
            base64::engine::general_purpose::STANDARD.encode(b"sig-bytes")
        });

        let signature = parse_signature(&value).unwrap();

        assert_eq!(signature.identity, "test@example.com");
        assert_eq!(signature.key_fingerprint, "aabbcc");
        assert_eq!(signature.signature, b"sig-bytes");
    }

    #[test]
    fn test_parse_signature_empty() {
        let err = parse_signature("").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_signature_wrong_version() {
        let err = parse_signature("siderov2 a b c").unwrap_err();
        assert_eq!(err.to_string(), "unsupported signature version: siderov2");
    }

    #[test]
    fn test_parse_signature_malformed() {
        let err = parse_signature("siderov1 too few").unwrap_err();
        assert_eq!(err.to_string(), "invalid signature header: siderov1 too few");
    }

    #[test]
    fn test_timestamp_window() {
        verify_timestamp(unix_now()).unwrap();
        verify_timestamp(unix_now() + 4 * 60).unwrap();
        verify_timestamp(unix_now() - 4 * 60).unwrap();

        assert!(verify_timestamp(unix_now() + 6 * 60).is_err());
        assert!(verify_timestamp(unix_now() - 6 * 60).is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1700000000").unwrap(), 1_700_000_000);
        assert!(parse_timestamp("").unwrap_err().is_not_found());
        assert!(parse_timestamp("not-a-number").is_err());
    }
}
