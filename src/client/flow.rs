//! Registration/login flow.
//!
//! The default key renewal: generate a fresh ephemeral key, register its
//! public half, send the user to the login URL, and wait for the
//! confirmation. All RPCs made here run with signing skipped so that the
//! interceptor does not recursively sign its own registration calls.

use std::sync::Arc;

use tonic::transport::Channel;
use tracing::debug;

use crate::error::Result;

use super::{
    auth,
    browser,
    interceptor::{with_signing_skipped, Profile, SignerRef},
};

pub(crate) async fn renew_user_key_via_auth_flow(
    channel: Channel,
    profile: Profile,
) -> Result<SignerRef> {
    with_signing_skipped(async move {
        let provider = profile.key_provider()?;

        // a leftover key is expected to be stale at this point
        match provider.delete_key(&profile.context_name, &profile.identity) {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let key =
            provider.generate_key(&profile.context_name, &profile.identity, &profile.client_name)?;

        debug!(fingerprint = %key.fingerprint(), "generated new client key");

        let public_key = key.armor_public()?;

        let mut auth_client = auth::Client::new(channel);

        let login_url = auth_client
            .register_pgp_public_key(
                &profile.identity,
                public_key.as_bytes(),
                auth::RegisterOptions::default(),
            )
            .await?;

        let save_path = provider.write_key(&key)?;

        let print_login_dialog =
            || eprintln!("Please visit this page to authenticate: {login_url}");

        // BROWSER=echo suppresses browser opening; opening is best-effort
        // and falls back to printing the URL
        if std::env::var("BROWSER").as_deref() == Ok("echo") {
            print_login_dialog();
        } else {
            eprintln!("Attempting to open URL: {login_url}");

            if browser::open_url(&login_url).is_err() {
                print_login_dialog();
            }
        }

        let public_key_id = key.fingerprint();

        auth_client.await_public_key_confirmation(&public_key_id).await?;

        profile.info(format_args!(
            "Public key {public_key_id} is now registered for user {}\n",
            profile.identity,
        ));
        profile.info(format_args!("PGP key saved to {}\n", save_path.display()));

        Ok(Arc::new(key) as SignerRef)
    })
    .await
}
