//! Client-side signing: key storage, the authentication API client, and
//! the signing interceptor with its registration/login flow.

pub mod auth;
pub mod authpb;
mod browser;
mod flow;
pub mod interceptor;
mod key;
mod provider;

pub use interceptor::{
    with_signing_skipped, AuthEnabledFn, InfoWriter, Interceptor, Options, Profile, SignerRef,
    UserKeyFn,
};
pub use key::ClientKey;
pub use provider::KeyProvider;
