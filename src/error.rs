//! Error types for message signing and key management.
//!
//! All errors implement the standard [`std::error::Error`] trait via
//! [`thiserror::Error`]. The message texts of the wire-format and
//! key-validation variants are part of the library contract: verifiers and
//! test suites match on them.

use std::{io, sync::Arc};

use thiserror::Error;

/// Result type alias for signing operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while signing, verifying, or managing keys.
///
/// # Error Categories
///
/// - **Not found** ([`Error::NotFound`]): a required header or key is absent.
///   Callers use this to distinguish "no signature provided" from "malformed
///   signature".
/// - **Invalid signature** ([`Error::MalformedSignatureHeader`],
///   [`Error::UnsupportedSignatureVersion`], [`Error::MissingValidSignature`]):
///   grammar or cryptographic failures.
/// - **Invalid timestamp** ([`Error::TimestampOutsideSkew`]): outside the
///   allowed clock-skew window.
/// - **Payload mismatch** ([`Error::PayloadMethodMismatch`],
///   [`Error::PayloadHeaderMismatch`]): the signed payload disagrees with the
///   transport message.
/// - **Key validation** ([`Error::KeyValidation`]): revoked, expired, bad
///   lifetime, or missing email identity.
/// - **Transport** ([`Error::Transport`]): surfaced by the underlying call;
///   the signing interceptor renews exactly once on `Unauthenticated`.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum Error {
    /// A required header or key is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The signature header does not have four space-separated fields.
    #[error("invalid signature header: {0}")]
    MalformedSignatureHeader(String),

    /// The signature header carries a version other than `siderov1`.
    #[error("unsupported signature version: {0}")]
    UnsupportedSignatureVersion(String),

    /// The signature failed to decode or to verify cryptographically.
    #[error("missing valid signature")]
    MissingValidSignature,

    /// The timestamp header is not a decimal Unix timestamp.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] std::num::ParseIntError),

    /// The timestamp is outside of the allowed clock-skew window.
    #[error("timestamp is outside of allowed skew: {0}")]
    TimestampOutsideSkew(i64),

    /// The method recorded in the signed payload disagrees with the
    /// transport method.
    #[error("payload method does not match: {payload} != {transport}")]
    PayloadMethodMismatch {
        /// Method recorded in the signed payload.
        payload: String,
        /// Method of the transport message being verified.
        transport: String,
    },

    /// A signed header value disagrees with the transport metadata.
    #[error("payload header does not match: {0}")]
    PayloadHeaderMismatch(String),

    /// The payload was built locally, not parsed from the wire, so there are
    /// no original bytes to verify against.
    #[error("no JSON was captured for the payload")]
    PayloadNotParsed,

    /// A metadata value is not representable on the wire.
    #[error("invalid metadata value for {0}")]
    InvalidMetadata(&'static str),

    /// The HTTP request body exceeds the verification size cap.
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// Key validation failed; see [`KeyValidationError`] for the reasons.
    #[error(transparent)]
    KeyValidation(#[from] KeyValidationError),

    /// The private key is passphrase-protected. The library never prompts.
    #[error("private key is locked")]
    KeyLocked,

    /// The data is not a PEM `PUBLIC KEY` block.
    #[error("failed to decode PEM block containing public key")]
    InvalidPublicKeyPem,

    /// The PEM block decoded to a key type the plain verifier does not
    /// support.
    #[error("unsupported key type")]
    UnsupportedKeyType,

    /// A service account string failed to decode.
    #[error("failed to decode service account key from {source_name}: {cause}")]
    ServiceAccountDecode {
        /// Where the string came from (`options` or the environment
        /// variable name).
        source_name: String,
        /// The underlying decode failure.
        cause: Box<Error>,
    },

    /// Neither the user key could be read nor a new one obtained.
    #[error("{get}; {renew}")]
    Renewal {
        /// Failure reading the existing key.
        get: Box<Error>,
        /// Failure of the renewal that was attempted as a fallback.
        renew: Box<Error>,
    },

    /// Interceptor initialization failed; the stored error is replayed to
    /// every subsequent caller.
    #[error("{0}")]
    InitFailed(Arc<Error>),

    /// Signing the outbound message failed.
    #[error("failed to sign message: {0}")]
    Sign(Box<Error>),

    /// The user's data directory could not be determined.
    #[error("could not determine the user data directory")]
    NoDataDir,

    /// The key provider was not configured but a default hook needed it.
    #[error("no key provider is configured")]
    NoKeyProvider,

    /// The awaited public-key confirmation did not arrive in time.
    #[error("login confirmation timed out")]
    LoginTimeout,

    /// An OpenPGP operation failed.
    #[error("openpgp: {0}")]
    Pgp(anyhow::Error),

    /// The underlying RPC reported an error status.
    #[error(transparent)]
    Transport(#[from] tonic::Status),

    /// Filesystem access failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Payload or service-account JSON failed to (de)serialize.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A base64 field failed to decode.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}

impl Error {
    /// Whether this error means the requested item does not exist.
    ///
    /// The renewal flow treats a missing on-disk key as benign.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
            || matches!(self, Error::Io(err) if err.kind() == io::ErrorKind::NotFound)
    }

    /// Whether this error is an `Unauthenticated` response from the
    /// underlying transport.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Error::Transport(status) if status.code() == tonic::Code::Unauthenticated)
    }
}

/// Reasons a PGP key fails validation.
///
/// The message texts are verbatim contract; see
/// [`crate::pgp::Key::validate`].
#[derive(Debug, Error)]
pub enum KeyValidationError {
    /// The key is revoked.
    #[error("key is revoked")]
    Revoked,

    /// The input did not contain a usable OpenPGP certificate.
    #[error("key does not contain an entity")]
    NoEntity,

    /// The certificate has no user ID.
    #[error("key does not contain a primary identity")]
    NoPrimaryIdentity,

    /// The key is expired on both edges of the clock-skew window.
    #[error("key expired")]
    Expired,

    /// The primary identity does not carry a parseable email address.
    #[error("key does not contain a valid email address: {0}")]
    InvalidEmail(String),

    /// The key has no lifetime, or a zero one.
    #[error("key does not contain a valid key lifetime")]
    InvalidLifetime,

    /// The key expires later than the maximum allowed lifetime permits.
    #[error("key lifetime is too long: {0}")]
    LifetimeTooLong(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_messages() {
        let err = Error::NotFound("x-sidero-timestamp".to_owned());
        assert_eq!(err.to_string(), "not found: x-sidero-timestamp");

        let err = Error::UnsupportedSignatureVersion("siderov2".to_owned());
        assert_eq!(err.to_string(), "unsupported signature version: siderov2");

        assert_eq!(Error::MissingValidSignature.to_string(), "missing valid signature");
    }

    #[test]
    fn test_key_validation_messages() {
        let err = Error::from(KeyValidationError::LifetimeTooLong("9h0m0s".to_owned()));
        assert_eq!(err.to_string(), "key lifetime is too long: 9h0m0s");

        let err = Error::from(KeyValidationError::Expired);
        assert_eq!(err.to_string(), "key expired");
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(Error::NotFound("x".to_owned()).is_not_found());
        assert!(Error::Io(io::Error::from(io::ErrorKind::NotFound)).is_not_found());
        assert!(!Error::MissingValidSignature.is_not_found());
    }

    #[test]
    fn test_unauthenticated_predicate() {
        let err = Error::Transport(tonic::Status::unauthenticated("bad signature"));
        assert!(err.is_unauthenticated());

        let err = Error::Transport(tonic::Status::internal("boom"));
        assert!(!err.is_unauthenticated());
    }
}
