//! Wire types for the `auth.AuthService` RPC service.
//!
//! The message and client definitions follow the upstream protobuf contract;
//! they are written out by hand since this crate only consumes three unary
//! RPCs.

/// An identity a public key is registered for.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Identity {
    /// Email address naming the signer.
    #[prost(string, tag = "1")]
    pub email: String,
}

/// Public key material submitted for registration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublicKey {
    /// Armored OpenPGP public key.
    #[prost(bytes = "vec", tag = "1")]
    pub pgp_data: Vec<u8>,
}

/// Request to associate a freshly generated public key with an identity.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterPublicKeyRequest {
    /// Identity to register the key for.
    #[prost(message, optional, tag = "1")]
    pub identity: Option<Identity>,

    /// The key being registered.
    #[prost(message, optional, tag = "2")]
    pub public_key: Option<PublicKey>,

    /// Role to assign; only effective when `skip_user_role` is set.
    #[prost(string, tag = "3")]
    pub role: String,

    /// Skip deriving the role from the user.
    #[prost(bool, tag = "4")]
    pub skip_user_role: bool,

    /// Scopes to assign; only effective when `skip_user_scopes` is set.
    #[prost(string, repeated, tag = "5")]
    pub scopes: Vec<String>,

    /// Skip deriving the scopes from the user.
    #[prost(bool, tag = "6")]
    pub skip_user_scopes: bool,
}

/// Response to [`RegisterPublicKeyRequest`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterPublicKeyResponse {
    /// URL the user must visit to confirm the key.
    #[prost(string, tag = "1")]
    pub login_url: String,

    /// Identifier of the registered key.
    #[prost(string, tag = "2")]
    pub public_key_id: String,
}

/// Request to confirm a registered public key. Requires a valid JWT on the
/// connection.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfirmPublicKeyRequest {
    /// Identifier of the key being confirmed.
    #[prost(string, tag = "1")]
    pub public_key_id: String,
}

/// Response to [`ConfirmPublicKeyRequest`].
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ConfirmPublicKeyResponse {}

/// Request to block until a registered public key is confirmed.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AwaitPublicKeyConfirmationRequest {
    /// Identifier of the key being awaited.
    #[prost(string, tag = "1")]
    pub public_key_id: String,
}

/// Response to [`AwaitPublicKeyConfirmationRequest`].
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct AwaitPublicKeyConfirmationResponse {}

/// Client for the `auth.AuthService` service.
pub mod auth_service_client {
    #![allow(clippy::wildcard_imports)]

    use tonic::codegen::http::uri::PathAndQuery;
    use tonic::codegen::*;

    /// RPC client for registering and confirming public keys.
    #[derive(Debug, Clone)]
    pub struct AuthServiceClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl<T> AuthServiceClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        /// Wraps the given transport.
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        /// Registers a public key and returns the login URL to confirm it.
        pub async fn register_public_key(
            &mut self,
            request: impl tonic::IntoRequest<super::RegisterPublicKeyRequest>,
        ) -> std::result::Result<tonic::Response<super::RegisterPublicKeyResponse>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                let err: StdError = e.into();
                tonic::Status::unknown(format!("Service was not ready: {err}"))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/auth.AuthService/RegisterPublicKey");
            self.inner.unary(request.into_request(), path, codec).await
        }

        /// Confirms a public key. Requires a valid JWT on the connection.
        pub async fn confirm_public_key(
            &mut self,
            request: impl tonic::IntoRequest<super::ConfirmPublicKeyRequest>,
        ) -> std::result::Result<tonic::Response<super::ConfirmPublicKeyResponse>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                let err: StdError = e.into();
                tonic::Status::unknown(format!("Service was not ready: {err}"))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/auth.AuthService/ConfirmPublicKey");
            self.inner.unary(request.into_request(), path, codec).await
        }

        /// Blocks server-side until the key is confirmed or the deadline
        /// expires.
        pub async fn await_public_key_confirmation(
            &mut self,
            request: impl tonic::IntoRequest<super::AwaitPublicKeyConfirmationRequest>,
        ) -> std::result::Result<
            tonic::Response<super::AwaitPublicKeyConfirmationResponse>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                let err: StdError = e.into();
                tonic::Status::unknown(format!("Service was not ready: {err}"))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/auth.AuthService/AwaitPublicKeyConfirmation");
            self.inner.unary(request.into_request(), path, codec).await
        }
    }
}
