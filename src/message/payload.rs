//! Canonical payload for the RPC binding.
//!
//! The payload is a JSON object `{headers, method}` attached to the message
//! in the payload header. On verification the signature is checked against
//! the payload header bytes exactly as received: JSON object-key order is
//! not a canonical form, so re-serializing before the signature check would
//! reject valid messages signed by implementations with a different key
//! order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tonic::metadata::MetadataMap;

use crate::error::{Error, Result};

use super::INCLUDED_HEADERS;

/// The payload covered by the RPC signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPayload {
    /// Values of the [`INCLUDED_HEADERS`], keyed by header name. Headers
    /// absent from the message appear with empty value lists.
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,

    /// Fully qualified RPC method name.
    pub method: String,

    #[serde(skip)]
    original_json: Option<Vec<u8>>,
}

impl RpcPayload {
    /// Builds the payload from the request metadata.
    ///
    /// This is the signing-flow entry point.
    pub fn build(metadata: &MetadataMap, method: &str) -> Self {
        let headers = INCLUDED_HEADERS
            .iter()
            .map(|&name| {
                let values = metadata
                    .get_all(name)
                    .iter()
                    .filter_map(|value| value.to_str().ok())
                    .map(str::to_owned)
                    .collect();

                (name.to_owned(), values)
            })
            .collect();

        Self {
            headers,
            method: method.to_owned(),
            original_json: None,
        }
    }

    /// Parses a payload header value, retaining the original bytes for
    /// signature verification.
    ///
    /// This is the verification-flow entry point.
    pub fn parse(payload_json: &[u8]) -> Result<Self> {
        let mut payload: Self = serde_json::from_slice(payload_json)?;
        payload.original_json = Some(payload_json.to_vec());

        Ok(payload)
    }

    /// Serializes the payload to JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Returns the original JSON this payload was parsed from.
    ///
    /// Only valid after [`RpcPayload::parse`]; a locally built payload has
    /// no wire representation yet.
    pub fn original_json(&self) -> Result<&[u8]> {
        self.original_json
            .as_deref()
            .ok_or(Error::PayloadNotParsed)
    }

    /// Values recorded for the given header, empty if absent.
    pub(crate) fn header_values(&self, name: &str) -> &[String] {
        self.headers.get(name).map_or(&[], Vec::as_slice)
    }
}
