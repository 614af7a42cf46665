//! Service account packaging.
//!
//! A service account is a long-lived (name, PGP key) pair for
//! non-interactive use, packaged as the base64 of a small JSON document so
//! it fits into a single environment variable.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    pgp,
};

/// Environment variable that may contain the base64-encoded service account
/// key JSON. Checked first.
pub const SIDERO_SERVICE_ACCOUNT_KEY_ENV_VAR: &str = "SIDERO_SERVICE_ACCOUNT_KEY";

/// Environment variable that may contain the base64-encoded service account
/// key JSON. Checked second.
pub const OMNI_SERVICE_ACCOUNT_KEY_ENV_VAR: &str = "OMNI_SERVICE_ACCOUNT_KEY";

/// JSON representation of a service account.
#[derive(Debug, Serialize, Deserialize)]
struct ServiceAccountJson {
    /// Name (identity) of the service account.
    name: String,

    /// Armored PGP private key of the service account.
    pgp_key: String,
}

/// A service account with an identity and a PGP key.
///
/// Read-only after decoding.
#[derive(Debug, Clone)]
pub struct ServiceAccount {
    /// Name (identity) of the service account.
    pub name: String,

    /// The service account's PGP key.
    pub key: pgp::Key,
}

/// Encodes the given service account name and PGP key into a base64 encoded
/// JSON string.
pub fn encode(name: &str, key: &pgp::Key) -> Result<String> {
    let json = serde_json::to_vec(&ServiceAccountJson {
        name: name.to_owned(),
        pgp_key: key.armor_private()?,
    })?;

    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Parses and decodes a service account from a base64 encoded JSON string.
pub fn decode(value_base64: &str) -> Result<ServiceAccount> {
    let json = base64::engine::general_purpose::STANDARD.decode(value_base64)?;

    let sa: ServiceAccountJson = serde_json::from_slice(&json)?;

    let key = pgp::Key::import_armored(sa.pgp_key.as_bytes())?;

    Ok(ServiceAccount { name: sa.name, key })
}

/// Checks if a service account is available in the environment.
///
/// The known variables are probed in a fixed order —
/// [`SIDERO_SERVICE_ACCOUNT_KEY_ENV_VAR`], then
/// [`OMNI_SERVICE_ACCOUNT_KEY_ENV_VAR`] — and the first one found wins.
/// Returns the variable name alongside its raw value, or `None` when
/// neither is set.
pub fn get_from_env() -> Option<(&'static str, String)> {
    [SIDERO_SERVICE_ACCOUNT_KEY_ENV_VAR, OMNI_SERVICE_ACCOUNT_KEY_ENV_VAR]
        .into_iter()
        .find_map(|name| std::env::var(name).ok().map(|value| (name, value)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::testutil::ENV_LOCK;

    use super::*;

    fn generate(name: &str, email: &str) -> pgp::Key {
        pgp::Key::generate(name, "test-comment", email, Duration::from_secs(24 * 60 * 60))
            .unwrap()
    }

    #[test]
    fn test_encode_decode() {
        let key = generate("test-name-1", "test-1@sa.example.org");

        let encoded = encode("bla", &key).unwrap();
        let decoded = decode(&encoded).unwrap();

        assert_eq!(decoded.name, "bla");
        assert_eq!(decoded.key.fingerprint(), key.fingerprint());
        assert!(decoded.key.is_private());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode("???").is_err());

        let not_json = base64::engine::general_purpose::STANDARD.encode("not json");
        assert!(decode(&not_json).is_err());
    }

    #[test]
    fn test_env_precedence() {
        let _guard = ENV_LOCK.lock().unwrap();

        let key1_encoded = encode("bla1", &generate("test-name-1", "test-1@sa.example.org"))
            .unwrap();
        let key2_encoded = encode("bla2", &generate("test-name-2", "test-2@sa.example.org"))
            .unwrap();

        std::env::set_var(SIDERO_SERVICE_ACCOUNT_KEY_ENV_VAR, &key1_encoded);
        std::env::set_var(OMNI_SERVICE_ACCOUNT_KEY_ENV_VAR, &key2_encoded);

        // both env vars are set, the sidero one takes precedence
        let (env_key, value_base64) = get_from_env().unwrap();
        assert_eq!(env_key, SIDERO_SERVICE_ACCOUNT_KEY_ENV_VAR);
        assert_eq!(value_base64, key1_encoded);

        std::env::remove_var(SIDERO_SERVICE_ACCOUNT_KEY_ENV_VAR);

        // only the omni one is set
        let (env_key, value_base64) = get_from_env().unwrap();
        assert_eq!(env_key, OMNI_SERVICE_ACCOUNT_KEY_ENV_VAR);
        assert_eq!(value_base64, key2_encoded);

        std::env::remove_var(OMNI_SERVICE_ACCOUNT_KEY_ENV_VAR);

        // no env vars are set
        assert!(get_from_env().is_none());
    }
}
