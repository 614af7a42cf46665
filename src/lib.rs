//! Message signing and signature verification for Sidero APIs.
//!
//! This library attaches cryptographic identity to outbound API requests
//! and verifies identity on inbound requests. Requests are signed with
//! ephemeral OpenPGP keys bound to a (context, identity) pair; a rejected
//! signature triggers a single interactive re-authentication and retry.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                caller's RPC / HTTP stack             │
//! └────────┬─────────────────────────────────────────────┘
//!          │ outbound call
//! ┌────────▼─────────────────────────────────────────────┐
//! │  client::Interceptor                                 │
//! │    resolve signer (service account / user key)       │
//! │    sign metadata ──► message::RpcMessage             │
//! │    on Unauthenticated: renew once ──► client::flow   │
//! └────────┬─────────────────────────────────────────────┘
//!          │ x-sidero-timestamp / -payload / -signature
//! ┌────────▼─────────────────────────────────────────────┐
//! │  verifier side: message::{RpcMessage, HttpMessage}   │
//! │    timestamp skew ► payload equality ► signature     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Signing an RPC message
//!
//! ```
//! use std::time::Duration;
//!
//! use api_signature::{message::RpcMessage, pgp};
//! use tonic::metadata::MetadataMap;
//!
//! # fn example() -> api_signature::Result<()> {
//! let key = pgp::Key::generate(
//!     "my-client v1.0.0",
//!     "linux/amd64",
//!     "user@example.com",
//!     Duration::from_secs(4 * 60 * 60),
//! )?;
//!
//! let mut message = RpcMessage::new(MetadataMap::new(), "auth.AuthService/ConfirmPublicKey");
//! message.sign("user@example.com", &key)?;
//!
//! // the verifier recomputes everything from the metadata
//! message.verify_signature(&key)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Intercepting outbound calls
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use api_signature::client::{Interceptor, KeyProvider, Options};
//! use tonic::metadata::MetadataMap;
//!
//! # async fn example() -> api_signature::Result<()> {
//! let channel = tonic::transport::Channel::from_static("http://api.example.com")
//!     .connect_lazy();
//!
//! let interceptor = Interceptor::new(
//!     channel,
//!     Options {
//!         context_name: "default".to_owned(),
//!         identity: "user@example.com".to_owned(),
//!         client_name: "my-client v1.0.0".to_owned(),
//!         key_provider: Some(Arc::new(KeyProvider::new("my-client/keys"))),
//!         ..Default::default()
//!     },
//! );
//!
//! let response: String = interceptor
//!     .intercept("/some.Service/Method", MetadataMap::new(), |metadata| async move {
//!         // hand the signed metadata to the transport here
//!         # let _ = metadata;
//!         Ok("response".to_owned())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`message`]: the signing wire format, with RPC and HTTP bindings
//! - [`pgp`]: OpenPGP key generation, validation, and detached signatures
//! - [`plain`]: verifier for bare ECDSA P-256 public keys
//! - [`serviceaccount`]: long-lived keys packaged into one env variable
//! - [`client`]: key storage, the auth API client, the signing interceptor,
//!   and the registration/login flow
//! - [`jwt`]: the claims/verifier interface JWT consumers plug into
//! - [`error`]: the error taxonomy

#![warn(missing_docs)]

pub mod client;
pub mod error;
mod fsutil;
pub mod jwt;
pub mod message;
pub mod pgp;
pub mod plain;
pub mod serviceaccount;

pub use error::{Error, KeyValidationError, Result};
