//! PGP key validation policy.
//!
//! Validation is what makes ephemeral keys safe to accept: a key must carry
//! a finite lifetime below the server cap, must not be revoked, must not be
//! expired (with tolerance for client clock skew in either direction), and
//! its primary identity must name the signer by email address.

use std::time::{Duration, SystemTime};

use lettre::Address;
use sequoia_openpgp as openpgp;

use openpgp::{packet::UserID, policy::StandardPolicy, types::RevocationStatus};

use super::Key;
use crate::error::{KeyValidationError, Result};

/// Default maximum accepted key lifetime.
pub const DEFAULT_MAX_ALLOWED_LIFETIME: Duration = Duration::from_secs(8 * 60 * 60);

/// Default clock-skew tolerance for the expiration check.
pub const DEFAULT_ALLOWED_CLOCK_SKEW: Duration = Duration::from_secs(5 * 60);

/// Options for [`Key::validate_with`].
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Maximum accepted key lifetime (default: 8 h).
    pub max_allowed_lifetime: Duration,
    /// Clock-skew tolerance for the expiration check (default: 5 min).
    pub allowed_clock_skew: Duration,
    /// Require the primary identity to carry a valid email address
    /// (default: true). The library uses the identity slot to carry the
    /// signer's email.
    pub valid_email_as_name: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            max_allowed_lifetime: DEFAULT_MAX_ALLOWED_LIFETIME,
            allowed_clock_skew: DEFAULT_ALLOWED_CLOCK_SKEW,
            valid_email_as_name: true,
        }
    }
}

impl ValidationOptions {
    /// Customizes the maximum allowed key lifetime.
    #[must_use]
    pub fn with_max_allowed_lifetime(mut self, max_allowed_lifetime: Duration) -> Self {
        self.max_allowed_lifetime = max_allowed_lifetime;
        self
    }

    /// Customizes the allowed clock skew.
    #[must_use]
    pub fn with_allowed_clock_skew(mut self, allowed_clock_skew: Duration) -> Self {
        self.allowed_clock_skew = allowed_clock_skew;
        self
    }

    /// Sets whether the primary identity must parse as an email address.
    #[must_use]
    pub fn with_valid_email_as_name(mut self, valid_email_as_name: bool) -> Self {
        self.valid_email_as_name = valid_email_as_name;
        self
    }
}

impl Key {
    /// Validates the key with the default [`ValidationOptions`].
    pub fn validate(&self) -> Result<()> {
        self.validate_with(&ValidationOptions::default())
    }

    /// Validates the key.
    ///
    /// # Errors
    ///
    /// Reports the first failing check, with these verbatim messages:
    /// `key is revoked`, `key does not contain a primary identity`,
    /// `key expired`, `key does not contain a valid email address: …`,
    /// `key does not contain a valid key lifetime`,
    /// `key lifetime is too long: <duration>`.
    pub fn validate_with(&self, options: &ValidationOptions) -> Result<()> {
        let policy = StandardPolicy::new();

        if let RevocationStatus::Revoked(_) = self.cert().revocation_status(&policy, None) {
            return Err(KeyValidationError::Revoked.into());
        }

        let Some(userid) = self.cert().userids().next() else {
            return Err(KeyValidationError::NoPrimaryIdentity.into());
        };

        let lifetime = self.validity_period()?;

        // A key whose whole lifetime fits inside the skew window would never
        // leave it; shrink the tolerance for those.
        let mut skew = options.allowed_clock_skew;
        if let Some(lifetime) = lifetime {
            if lifetime < skew {
                skew = lifetime / 2;
            }
        }

        // Expired only when both edges of the skew window agree: a key that
        // is live at either `now + skew` or `now - skew` is accepted. A key
        // created after the probe time counts as expired at that time.
        let now = SystemTime::now();
        if self.expired_at(&policy, now + skew) && self.expired_at(&policy, now - skew) {
            return Err(KeyValidationError::Expired.into());
        }

        if options.valid_email_as_name {
            check_email(userid.userid()).map_err(KeyValidationError::InvalidEmail)?;
        }

        let Some(lifetime) = lifetime.filter(|lifetime| !lifetime.is_zero()) else {
            return Err(KeyValidationError::InvalidLifetime.into());
        };

        // We don't care when the key was created, only that it expires no
        // later than now + max + 1 min; the extra minute absorbs rounding.
        let cap = now + options.max_allowed_lifetime + Duration::from_secs(60);
        if !self.expired_at(&policy, cap) {
            return Err(KeyValidationError::LifetimeTooLong(format_duration(lifetime)).into());
        }

        Ok(())
    }

    /// Lifetime recorded on the primary key, read at the key's own birth
    /// time so that it stays readable after the self-signature expires.
    pub(crate) fn validity_period(&self) -> Result<Option<Duration>> {
        let policy = StandardPolicy::new();
        let creation = self.cert().primary_key().key().creation_time();

        let valid_cert = self
            .cert()
            .with_policy(&policy, creation + Duration::from_secs(1))
            .map_err(crate::error::Error::Pgp)?;

        match valid_cert.primary_key().key_expiration_time() {
            Some(expiration) => {
                Ok(Some(expiration.duration_since(creation).unwrap_or_default()))
            }
            None => Ok(None),
        }
    }

    /// Whether the key is unusable at time `t`: expired, or not yet created.
    pub(crate) fn expired_at(&self, policy: &StandardPolicy, t: SystemTime) -> bool {
        self.cert()
            .with_policy(policy, t)
            .and_then(|valid_cert| valid_cert.alive())
            .is_err()
    }
}

fn check_email(userid: &UserID) -> std::result::Result<(), String> {
    let raw = String::from_utf8_lossy(userid.value()).into_owned();

    // conventional form is "Name (Comment) <addr>"; a bare address is also
    // accepted
    let addr = match (raw.find('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => &raw[start + 1..end],
        _ => raw.as_str(),
    };

    match addr.trim().parse::<Address>() {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("{err}: {raw}")),
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    let hours = secs / 3600;
    let minutes = secs % 3600 / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
