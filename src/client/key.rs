//! Client key: a PGP key bound to a user profile.

use std::ops::Deref;

use crate::{error::Result, message, pgp};

/// An OpenPGP client key pair associated with a context and an identity.
///
/// It is stored on the filesystem by the
/// [`KeyProvider`](crate::client::KeyProvider), one file per
/// (context, identity) pair.
#[derive(Debug, Clone)]
pub struct ClientKey {
    key: pgp::Key,
    context: String,
    identity: String,
}

impl ClientKey {
    pub(crate) fn new(key: pgp::Key, context: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            key,
            context: context.into(),
            identity: identity.into(),
        }
    }

    /// The wrapped PGP key.
    pub fn key(&self) -> &pgp::Key {
        &self.key
    }

    /// Name of the user profile this key belongs to.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Email-shaped identity of the signer.
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl Deref for ClientKey {
    type Target = pgp::Key;

    fn deref(&self) -> &Self::Target {
        &self.key
    }
}

impl message::Signer for ClientKey {
    fn fingerprint(&self) -> String {
        self.key.fingerprint()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.key.sign(data)
    }
}
