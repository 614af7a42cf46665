//! Client for the authentication API.
//!
//! Three unary RPCs over a connection the caller already holds: register a
//! freshly generated public key, confirm it (requires a JWT minted
//! elsewhere), and await its confirmation.

use tonic::transport::Channel;

use crate::error::{Error, Result};

use super::authpb::{
    auth_service_client::AuthServiceClient, AwaitPublicKeyConfirmationRequest,
    ConfirmPublicKeyRequest, Identity, PublicKey, RegisterPublicKeyRequest,
};

/// Options for [`Client::register_pgp_public_key`].
///
/// Options are additive; setting the same option twice keeps the last
/// value.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    role: Option<String>,
    skip_user_role: bool,
    scopes: Option<Vec<String>>,
    skip_user_scopes: bool,
}

impl RegisterOptions {
    /// Sets the role to request for the key.
    ///
    /// Only effective together with [`RegisterOptions::with_skip_user_role`].
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Requests that the server not derive the role from the user.
    #[must_use]
    pub fn with_skip_user_role(mut self, skip_user_role: bool) -> Self {
        self.skip_user_role = skip_user_role;
        self
    }

    /// Sets the scopes to request for the key.
    ///
    /// Only effective together with
    /// [`RegisterOptions::with_skip_user_scopes`].
    #[must_use]
    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Requests that the server not derive the scopes from the user.
    #[must_use]
    pub fn with_skip_user_scopes(mut self, skip_user_scopes: bool) -> Self {
        self.skip_user_scopes = skip_user_scopes;
        self
    }
}

/// Client for the authentication API.
#[derive(Debug, Clone)]
pub struct Client {
    inner: AuthServiceClient<Channel>,
}

impl Client {
    /// Builds a client out of an existing connection.
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: AuthServiceClient::new(channel),
        }
    }

    /// Registers a PGP public key for the given identity and returns the
    /// login URL.
    ///
    /// The registered key needs to be confirmed before it can be used for
    /// signing.
    pub async fn register_pgp_public_key(
        &mut self,
        email: &str,
        public_key: &[u8],
        options: RegisterOptions,
    ) -> Result<String> {
        let request = RegisterPublicKeyRequest {
            identity: Some(Identity {
                email: email.to_owned(),
            }),
            public_key: Some(PublicKey {
                pgp_data: public_key.to_vec(),
            }),
            role: options.role.unwrap_or_default(),
            skip_user_role: options.skip_user_role,
            scopes: options.scopes.unwrap_or_default(),
            skip_user_scopes: options.skip_user_scopes,
        };

        let response = self.inner.register_public_key(request).await?;

        Ok(response.into_inner().login_url)
    }

    /// Confirms a public key for the current identity.
    ///
    /// This endpoint requires a valid JWT on the connection; this library
    /// does not mint one.
    pub async fn confirm_public_key(&mut self, public_key_id: &str) -> Result<()> {
        self.inner
            .confirm_public_key(ConfirmPublicKeyRequest {
                public_key_id: public_key_id.to_owned(),
            })
            .await?;

        Ok(())
    }

    /// Waits for the public key with the given identifier to be confirmed.
    ///
    /// A deadline exceeded on the call surfaces as
    /// [`Error::LoginTimeout`].
    pub async fn await_public_key_confirmation(&mut self, public_key_id: &str) -> Result<()> {
        self.inner
            .await_public_key_confirmation(AwaitPublicKeyConfirmationRequest {
                public_key_id: public_key_id.to_owned(),
            })
            .await
            .map_err(|status| match status.code() {
                tonic::Code::DeadlineExceeded => Error::LoginTimeout,
                _ => Error::Transport(status),
            })?;

        Ok(())
    }
}
