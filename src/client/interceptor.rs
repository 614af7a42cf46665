//! Signing interceptor.
//!
//! Signs every outbound RPC and recovers from a stale user key exactly
//! once. The interceptor is shared across concurrent requests on one
//! connection:
//!
//! - Initialization runs once behind a one-shot latch; its result, success
//!   or error, is memoized for the life of the interceptor.
//! - The user-signer slot is guarded by a mutex held across the
//!   fetch-or-initialize, so concurrent first callers serialize through the
//!   initial key fetch and proceed independently afterwards.
//! - The retry loop is bounded at one renewal: the remedy for a rejected
//!   signature is interactive re-authentication, not transient-error
//!   recovery, so there is no backoff and no second attempt.
//!
//! Calls made from within [`with_signing_skipped`] pass through unsigned;
//! the renewal flow uses this to keep its own registration RPCs from being
//! signed recursively.

use std::{
    future::Future,
    io,
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tonic::{metadata::MetadataMap, transport::Channel};
use tracing::{debug, instrument};

use crate::{
    error::{Error, Result},
    message::{RpcMessage, Signer},
    serviceaccount,
};

use super::{flow, KeyProvider};

tokio::task_local! {
    // the sentinel is crate-private, so callers outside the crate cannot
    // forge the marker; they go through with_signing_skipped
    static SKIP_SIGNING: ();
}

/// Runs the given future with signing disabled for every interceptor call
/// made from it.
///
/// The renewal flow runs under this scope so that its registration and
/// confirmation RPCs are not themselves signed.
pub async fn with_signing_skipped<F: Future>(fut: F) -> F::Output {
    SKIP_SIGNING.scope((), fut).await
}

fn signing_skipped() -> bool {
    SKIP_SIGNING.try_with(|()| ()).is_ok()
}

/// Shared handle to a message signer.
pub type SignerRef = Arc<dyn Signer>;

/// Sink for user-facing informational lines (defaults to stderr).
///
/// These lines are product output of the login flow, not diagnostics;
/// diagnostics go through `tracing`.
pub type InfoWriter = Arc<Mutex<dyn io::Write + Send>>;

/// Called once, on the first request, to determine if auth is enabled.
///
/// If the result is `false` the interceptor passes all requests through
/// unsigned. An error fails initialization.
pub type AuthEnabledFn = Box<dyn Fn(Channel) -> BoxFuture<'static, Result<bool>> + Send + Sync>;

/// Called to read the initial user key, or to renew it.
pub type UserKeyFn =
    Box<dyn Fn(Channel, Profile) -> BoxFuture<'static, Result<SignerRef>> + Send + Sync>;

/// The user profile an interceptor signs for, handed to the
/// [`UserKeyFn`] hooks.
#[derive(Clone)]
pub struct Profile {
    /// Named user profile the key belongs to.
    pub context_name: String,
    /// Email-shaped identity of the signer.
    pub identity: String,
    /// Client name (with version) recorded in generated keys.
    pub client_name: String,
    /// Provider for on-disk keys; required by the default hooks.
    pub key_provider: Option<Arc<KeyProvider>>,
    /// Sink for the login flow's informational lines.
    pub info_writer: InfoWriter,
}

impl Profile {
    pub(crate) fn key_provider(&self) -> Result<&KeyProvider> {
        self.key_provider.as_deref().ok_or(Error::NoKeyProvider)
    }

    pub(crate) fn info(&self, line: std::fmt::Arguments<'_>) {
        if let Ok(mut writer) = self.info_writer.lock() {
            let _ = writer.write_fmt(line);
        }
    }
}

/// Options for [`Interceptor::new`].
#[derive(Default)]
pub struct Options {
    /// Named user profile the key belongs to.
    pub context_name: String,
    /// Email-shaped identity of the signer.
    pub identity: String,
    /// Client name (with version) recorded in generated keys.
    pub client_name: String,
    /// Provider for on-disk keys; required unless both key hooks are
    /// replaced.
    pub key_provider: Option<Arc<KeyProvider>>,
    /// Sink for the login flow's informational lines (default: stderr).
    pub info_writer: Option<InfoWriter>,
    /// A static service account key in base64 format.
    ///
    /// When present (or found in the environment), `context_name` and
    /// `identity` are ignored and renewal is never attempted.
    pub service_account_base64: Option<String>,

    /// Hook deciding whether auth is enabled (default: always).
    pub auth_enabled: Option<AuthEnabledFn>,
    /// Hook reading the initial user key (default: the key provider).
    pub get_user_key: Option<UserKeyFn>,
    /// Hook renewing the user key (default: the registration/login flow).
    pub renew_user_key: Option<UserKeyFn>,
}

impl Options {
    /// Replaces the auth-enabled check (default: always enabled).
    #[must_use]
    pub fn with_auth_enabled_func<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Channel) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        self.auth_enabled = Some(Box::new(move |channel| Box::pin(f(channel))));
        self
    }

    /// Replaces the hook reading the initial user key (default: read from
    /// the key provider).
    #[must_use]
    pub fn with_get_user_key_func<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Channel, Profile) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SignerRef>> + Send + 'static,
    {
        self.get_user_key = Some(Box::new(move |channel, profile| Box::pin(f(channel, profile))));
        self
    }

    /// Replaces the hook renewing the user key (default: the interactive
    /// registration/login flow).
    #[must_use]
    pub fn with_renew_user_key_func<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Channel, Profile) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SignerRef>> + Send + 'static,
    {
        self.renew_user_key = Some(Box::new(move |channel, profile| Box::pin(f(channel, profile))));
        self
    }
}

#[derive(Clone)]
enum Mode {
    /// Auth is disabled; requests pass through unsigned.
    Disabled,
    /// Sign as a service account. Never renewed.
    ServiceAccount { name: String, signer: SignerRef },
    /// Sign with the cached user key, renewing once on rejection.
    User,
}

/// An RPC client interceptor which signs requests.
pub struct Interceptor {
    channel: Channel,
    profile: Profile,
    service_account_base64: Option<String>,
    auth_enabled: AuthEnabledFn,
    get_user_key: UserKeyFn,
    renew_user_key: UserKeyFn,
    init: OnceCell<std::result::Result<Mode, Arc<Error>>>,
    user_signer: tokio::sync::Mutex<Option<SignerRef>>,
}

impl Interceptor {
    /// Creates a new client interceptor over the given connection.
    pub fn new(channel: Channel, options: Options) -> Self {
        let info_writer: InfoWriter = options
            .info_writer
            .unwrap_or_else(|| Arc::new(Mutex::new(io::stderr())));

        let profile = Profile {
            context_name: options.context_name,
            identity: options.identity,
            client_name: options.client_name,
            key_provider: options.key_provider,
            info_writer,
        };

        Self {
            channel,
            profile,
            service_account_base64: options.service_account_base64,
            auth_enabled: options
                .auth_enabled
                .unwrap_or_else(|| Box::new(default_auth_enabled)),
            get_user_key: options
                .get_user_key
                .unwrap_or_else(|| Box::new(default_get_user_key)),
            renew_user_key: options
                .renew_user_key
                .unwrap_or_else(|| Box::new(default_renew_user_key)),
            init: OnceCell::new(),
            user_signer: tokio::sync::Mutex::new(None),
        }
    }

    /// Signs the metadata and invokes the call, renewing the user key and
    /// retrying exactly once when the response is `Unauthenticated`.
    ///
    /// Streaming calls pass their stream opener as `invoke`: the opener's
    /// return code drives the retry; a stream failing mid-flight does not.
    #[instrument(skip_all, fields(method = %method))]
    pub async fn intercept<T, F, Fut>(
        &self,
        method: &str,
        metadata: MetadataMap,
        invoke: F,
    ) -> Result<T>
    where
        F: Fn(MetadataMap) -> Fut,
        Fut: Future<Output = std::result::Result<T, tonic::Status>>,
    {
        if signing_skipped() {
            return invoke(metadata).await.map_err(Error::from);
        }

        with_signing_skipped(self.intercept_signed(method, metadata, invoke)).await
    }

    async fn intercept_signed<T, F, Fut>(
        &self,
        method: &str,
        metadata: MetadataMap,
        invoke: F,
    ) -> Result<T>
    where
        F: Fn(MetadataMap) -> Fut,
        Fut: Future<Output = std::result::Result<T, tonic::Status>>,
    {
        let mode = self.initialize_once().await?;

        if let Mode::Disabled = mode {
            return invoke(metadata).await.map_err(Error::from);
        }

        // service accounts never retry: the remedy for a rejected signature
        // is interactive re-auth, which a service account cannot do
        let mut retryable = matches!(mode, Mode::User);

        loop {
            let (identity, signer) = match &mode {
                Mode::ServiceAccount { name, signer } => (name.clone(), signer.clone()),
                _ => (self.profile.identity.clone(), self.user_signer().await?),
            };

            // sign a fresh copy of the caller's metadata on every attempt
            let mut message = RpcMessage::new(metadata.clone(), method);
            message
                .sign(&identity, signer.as_ref())
                .map_err(|err| Error::Sign(Box::new(err)))?;

            match invoke(message.metadata).await {
                Ok(response) => return Ok(response),
                Err(status) => {
                    let err = Error::from(status);

                    if !retryable || !err.is_unauthenticated() {
                        return Err(err);
                    }

                    self.profile
                        .info(format_args!("Could not authenticate: {err}\n"));

                    self.renew_user().await?;
                    retryable = false;
                }
            }
        }
    }

    async fn initialize_once(&self) -> Result<Mode> {
        let outcome = self
            .init
            .get_or_init(|| async { self.initialize().await.map_err(Arc::new) })
            .await;

        match outcome {
            Ok(mode) => Ok(mode.clone()),
            Err(err) => Err(Error::InitFailed(err.clone())),
        }
    }

    async fn initialize(&self) -> Result<Mode> {
        let auth_enabled = (self.auth_enabled)(self.channel.clone()).await?;
        if !auth_enabled {
            debug!("authentication is disabled, passing requests through unsigned");

            return Ok(Mode::Disabled);
        }

        if let Some(service_account) = self.decode_service_account()? {
            debug!(name = %service_account.name, "using service account signer");

            return Ok(Mode::ServiceAccount {
                name: service_account.name,
                signer: Arc::new(service_account.key),
            });
        }

        if let Err(get_err) = self.user_signer().await {
            self.profile
                .info(format_args!("Could not authenticate: {get_err}\n"));

            let renewed = (self.renew_user_key)(self.channel.clone(), self.profile.clone())
                .await
                .map_err(|renew_err| Error::Renewal {
                    get: Box::new(get_err),
                    renew: Box::new(renew_err),
                })?;

            *self.user_signer.lock().await = Some(renewed);
        }

        Ok(Mode::User)
    }

    /// Decodes a service account, the explicit option winning over the
    /// environment. Returns `None` when neither is present.
    fn decode_service_account(&self) -> Result<Option<serviceaccount::ServiceAccount>> {
        if let Some(value) = &self.service_account_base64 {
            let account =
                serviceaccount::decode(value).map_err(|err| Error::ServiceAccountDecode {
                    source_name: "options".to_owned(),
                    cause: Box::new(err),
                })?;

            return Ok(Some(account));
        }

        if let Some((env_key, value)) = serviceaccount::get_from_env() {
            let account =
                serviceaccount::decode(&value).map_err(|err| Error::ServiceAccountDecode {
                    source_name: format!("env var {env_key:?}"),
                    cause: Box::new(err),
                })?;

            return Ok(Some(account));
        }

        Ok(None)
    }

    async fn user_signer(&self) -> Result<SignerRef> {
        // the lock is held across the fetch on purpose: a second caller
        // arriving during the initial read (or a login flow) waits for the
        // first outcome instead of racing its own
        let mut slot = self.user_signer.lock().await;

        if let Some(signer) = &*slot {
            return Ok(signer.clone());
        }

        let signer = (self.get_user_key)(self.channel.clone(), self.profile.clone()).await?;
        *slot = Some(signer.clone());

        Ok(signer)
    }

    async fn renew_user(&self) -> Result<SignerRef> {
        let signer = (self.renew_user_key)(self.channel.clone(), self.profile.clone()).await?;

        *self.user_signer.lock().await = Some(signer.clone());

        Ok(signer)
    }
}

fn default_auth_enabled(_channel: Channel) -> BoxFuture<'static, Result<bool>> {
    Box::pin(async { Ok(true) })
}

fn default_get_user_key(_channel: Channel, profile: Profile) -> BoxFuture<'static, Result<SignerRef>> {
    Box::pin(async move {
        let key = profile
            .key_provider()?
            .read_valid_key(&profile.context_name, &profile.identity)?;

        Ok(Arc::new(key) as SignerRef)
    })
}

fn default_renew_user_key(channel: Channel, profile: Profile) -> BoxFuture<'static, Result<SignerRef>> {
    Box::pin(flow::renew_user_key_via_auth_flow(channel, profile))
}
