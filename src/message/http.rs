//! HTTP transport binding.
//!
//! Unlike the RPC binding there is no payload header: the canonical payload
//! is rebuilt from the request itself as
//! `METHOD\nREQUEST-URI\nTIMESTAMP\nHEX(SHA256(body))`, so any change to the
//! method, URI, timestamp, or body invalidates the signature.

use http::{HeaderValue, Request};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::error::{Error, Result};

use super::{
    parse_signature, parse_timestamp, signature_header_value, unix_now, verify_timestamp,
    Signature, SignatureVerifier, Signer, SIGNATURE_HEADER_KEY, TIMESTAMP_HEADER_KEY,
};

/// Maximum body size accepted on the verification side; larger requests are
/// rejected when the message is constructed, before any crypto runs.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Policy hook consulted when a request carries no signature: returning
/// `false` keeps the "not found" report, returning `true` (the default when
/// no hook is installed) upgrades it to an invalid signature.
pub type SignatureRequiredCheck = Box<dyn Fn() -> Result<bool> + Send + Sync>;

/// An HTTP message.
///
/// The body is read once at construction and cached; the request handed
/// back by [`HttpMessage::into_request`] is unchanged apart from the
/// headers added by [`HttpMessage::sign`], so downstream handlers still see
/// the body.
pub struct HttpMessage<B> {
    request: Request<B>,
    body: Vec<u8>,
    signature_required_check: Option<SignatureRequiredCheck>,
}

impl<B: std::fmt::Debug> std::fmt::Debug for HttpMessage<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMessage")
            .field("request", &self.request)
            .field("body", &self.body)
            .field(
                "signature_required_check",
                &self.signature_required_check.is_some(),
            )
            .finish()
    }
}

impl<B: AsRef<[u8]>> HttpMessage<B> {
    /// Creates a message from the given request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyTooLarge`] when the body exceeds
    /// [`MAX_BODY_SIZE`].
    pub fn new(request: Request<B>) -> Result<Self> {
        let body = request.body().as_ref();

        if body.len() > MAX_BODY_SIZE {
            return Err(Error::BodyTooLarge(MAX_BODY_SIZE));
        }

        let body = body.to_vec();

        Ok(Self {
            request,
            body,
            signature_required_check: None,
        })
    }

    /// Installs a [`SignatureRequiredCheck`].
    #[must_use]
    pub fn with_signature_required_check(mut self, check: SignatureRequiredCheck) -> Self {
        self.signature_required_check = Some(check);
        self
    }

    /// Signs the message with the given signer.
    ///
    /// Sets the timestamp and signature headers; the HTTP binding carries
    /// no payload header.
    #[instrument(skip_all, fields(method = %self.request.method(), identity = %identity))]
    pub fn sign(&mut self, identity: &str, signer: &dyn Signer) -> Result<()> {
        self.set_header(TIMESTAMP_HEADER_KEY, &unix_now().to_string())?;

        let payload = self.payload()?;
        let signature = signer.sign(&payload)?;

        self.set_header(
            SIGNATURE_HEADER_KEY,
            &signature_header_value(identity, signer, &signature),
        )?;

        Ok(())
    }

    /// Verifies the signature of the message.
    ///
    /// This includes the timestamp-skew check. The canonical payload is
    /// recomputed from the current method, URI, and body, so any of them
    /// having changed since signing fails the verification.
    #[instrument(skip_all, fields(method = %self.request.method()))]
    pub fn verify_signature(&self, verifier: &dyn SignatureVerifier) -> Result<()> {
        let timestamp = parse_timestamp(self.header(TIMESTAMP_HEADER_KEY))?;
        verify_timestamp(timestamp)?;

        let signature = self.signature()?;
        let payload = self.payload()?;

        verifier.verify(&payload, &signature.signature)
    }

    /// Returns the parsed signature header.
    ///
    /// An absent signature is reported as invalid unless an installed
    /// [`SignatureRequiredCheck`] says a signature is not required for this
    /// request, in which case the "not found" report is kept.
    pub fn signature(&self) -> Result<Signature> {
        match parse_signature(self.header(SIGNATURE_HEADER_KEY)) {
            Err(err) if err.is_not_found() => {
                let required = match &self.signature_required_check {
                    Some(check) => check()?,
                    None => true,
                };

                if required {
                    Err(Error::MissingValidSignature)
                } else {
                    Err(err)
                }
            }
            result => result,
        }
    }

    /// Returns the underlying request, body intact.
    pub fn into_request(self) -> Request<B> {
        self.request
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let timestamp = parse_timestamp(self.header(TIMESTAMP_HEADER_KEY))?;

        let uri = self.request.uri();
        let request_uri = uri
            .path_and_query()
            .map_or_else(|| uri.path(), |path_and_query| path_and_query.as_str());

        let body_sha256 = hex::encode(Sha256::digest(&self.body));

        let payload = [
            self.request.method().as_str(),
            request_uri,
            &timestamp.to_string(),
            &body_sha256,
        ]
        .join("\n");

        Ok(payload.into_bytes())
    }

    fn header(&self, name: &str) -> &str {
        self.request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }

    fn set_header(&mut self, name: &'static str, value: &str) -> Result<()> {
        let value = HeaderValue::from_str(value).map_err(|_| Error::InvalidMetadata(name))?;

        self.request.headers_mut().insert(name, value);

        Ok(())
    }
}
